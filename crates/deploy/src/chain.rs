//! Capability surface consumed from the chain.
//!
//! The orchestrator never talks to a node directly. It resolves contract
//! factories, submits transactions and waits for their confirmation through the
//! [`ChainClient`] trait, so any backend (a JSON-RPC node, an in-memory test
//! double) can drive a deployment.

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash};
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

use crate::abi::{ContractCall, Token};

/// Identifier of a compiled contract, e.g. `TL_Evidence_Vault`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Deref, Display, From,
)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for ContractId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A deployable contract: its identifier and creation bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    pub contract: ContractId,
    pub bytecode: Bytes,
}

/// A construction transaction that was accepted by the node but is not yet
/// confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    pub contract: ContractId,
    pub tx_hash: TxHash,
}

/// A contract whose construction transaction is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedInstance {
    pub contract: ContractId,
    pub address: Address,
    pub receipt: Receipt,
}

impl DeployedInstance {
    /// The on-chain address of the deployed contract.
    pub fn address(&self) -> Address {
        self.address
    }
}

/// A method call transaction that was accepted by the node but is not yet
/// confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub target: Address,
    pub method: String,
    pub tx_hash: TxHash,
}

/// Receipt of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Address of the created contract for construction transactions.
    pub contract_address: Option<Address>,
}

/// Failure reported by the chain for a single transaction.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The transaction never entered the chain (malformed call, insufficient
    /// funds, nonce conflict, unknown artifact...).
    #[error("transaction submission rejected: {reason}")]
    Submission { reason: String },

    /// The transaction entered the chain but reverted or did not reach the
    /// required confirmation depth.
    #[error("transaction {tx_hash} not confirmed: {reason}")]
    Confirmation { tx_hash: TxHash, reason: String },
}

impl ChainError {
    pub fn submission(reason: impl Into<String>) -> Self {
        Self::Submission {
            reason: reason.into(),
        }
    }

    pub fn confirmation(tx_hash: TxHash, reason: impl Into<String>) -> Self {
        Self::Confirmation {
            tx_hash,
            reason: reason.into(),
        }
    }
}

/// Chain capabilities needed to deploy and link contracts.
///
/// Submission and confirmation are separate calls so that a rejected
/// submission and a failed confirmation can be told apart. Each method resolves
/// exactly once: implementations never resubmit a transaction on their own.
pub trait ChainClient: Send + Sync {
    /// Resolve a contract identifier to a deployable factory.
    fn factory(
        &self,
        contract: &ContractId,
    ) -> impl Future<Output = Result<Factory, ChainError>> + Send;

    /// Submit the construction transaction for `factory` with the given
    /// constructor arguments.
    fn deploy(
        &self,
        factory: &Factory,
        args: &[Token],
    ) -> impl Future<Output = Result<PendingDeployment, ChainError>> + Send;

    /// Wait until a construction transaction is confirmed.
    fn wait_for_deployment(
        &self,
        pending: PendingDeployment,
    ) -> impl Future<Output = Result<DeployedInstance, ChainError>> + Send;

    /// Submit a method call on the contract at `target`.
    fn call(
        &self,
        target: Address,
        call: &ContractCall,
    ) -> impl Future<Output = Result<PendingTransaction, ChainError>> + Send;

    /// Wait until a method call transaction is confirmed.
    fn wait(
        &self,
        pending: PendingTransaction,
    ) -> impl Future<Output = Result<Receipt, ChainError>> + Send;
}
