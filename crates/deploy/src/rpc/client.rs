//! Chain client backed by an Ethereum JSON-RPC node.
//!
//! Transactions are sent with `eth_sendTransaction` from an account the node
//! holds unlocked (a Hardhat or Anvil dev account, or a node-managed signer).
//! Confirmation is detected by polling `eth_getTransactionReceipt`.

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, TxHash};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use url::Url;

use crate::{
    ChainClient, ChainConfig, ChainError, ContractId, DeployedInstance, Factory,
    PendingDeployment, PendingTransaction, Receipt,
    abi::{self, ContractCall, Token},
    artifact::ArtifactStore,
    rpc,
};

/// Receipt fields as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: Option<String>,
    status: Option<String>,
    contract_address: Option<Address>,
}

/// Outcome of a receipt poll that did not yield a confirmed receipt.
#[derive(Debug)]
enum ReceiptPoll {
    /// Not mined, or not buried deep enough yet.
    Pending(String),
    /// Mined and reverted.
    Reverted { block_number: u64 },
    /// Mined, but the receipt cannot be interpreted.
    Invalid(String),
}

/// A [`ChainClient`] talking to a JSON-RPC node.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    http: reqwest::Client,
    url: Url,
    sender: Address,
    artifacts: ArtifactStore,
    confirmations: u64,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl RpcChainClient {
    /// Connect to the node described by `config`.
    ///
    /// Checks the chain ID when one is configured and resolves the sending
    /// account (the configured one, or the node's first account).
    pub async fn connect(config: &ChainConfig, artifacts: ArtifactStore) -> anyhow::Result<Self> {
        let http = rpc::create_client(config.request_timeout())?;
        let url = config.rpc_url.clone();

        if let Some(expected) = config.chain_id {
            let chain_id: String = rpc::json_rpc_call(&http, url.as_str(), "eth_chainId", vec![])
                .await
                .with_context(|| format!("Failed to query chain ID from {}", url))?;
            let actual = rpc::parse_hex_u64(&chain_id)?;
            if actual != expected {
                anyhow::bail!(
                    "Node at {} is on chain {} but chain.chain_id is {}",
                    url,
                    actual,
                    expected
                );
            }
        }

        let sender = match config.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&http, url.as_str(), "eth_accounts", vec![])
                        .await
                        .with_context(|| format!("Failed to list accounts of {}", url))?;
                accounts
                    .first()
                    .copied()
                    .context("The node exposes no unlocked accounts, set chain.from")?
            }
        };

        tracing::info!(
            rpc_url = %url,
            sender = %sender,
            confirmations = config.confirmations,
            "Connected to chain"
        );

        Ok(Self {
            http,
            url,
            sender,
            artifacts,
            confirmations: config.confirmations,
            poll_interval: config.poll_interval(),
            confirmation_timeout: config.confirmation_timeout(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        rpc::json_rpc_call(&self.http, self.url.as_str(), method, params).await
    }

    async fn send_transaction(
        &self,
        to: Option<Address>,
        data: &Bytes,
    ) -> Result<TxHash, ChainError> {
        let mut tx = json!({
            "from": self.sender,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }

        self.request("eth_sendTransaction", vec![tx])
            .await
            .map_err(|e| ChainError::submission(format!("{e:#}")))
    }

    async fn poll_receipt(&self, tx_hash: TxHash) -> Result<Receipt, ReceiptPoll> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await
            .map_err(|e| ReceiptPoll::Pending(format!("{e:#}")))?;

        let Some(receipt) = receipt else {
            return Err(ReceiptPoll::Pending("transaction not mined yet".to_string()));
        };

        let head = if self.confirmations > 1 {
            let block: String = self
                .request("eth_blockNumber", vec![])
                .await
                .map_err(|e| ReceiptPoll::Pending(format!("{e:#}")))?;
            Some(rpc::parse_hex_u64(&block).map_err(|e| ReceiptPoll::Pending(format!("{e:#}")))?)
        } else {
            None
        };

        classify_receipt(receipt, head, self.confirmations)
    }

    /// Poll until the transaction is confirmed, reverted, or the confirmation
    /// timeout elapses. The transaction itself is never resubmitted.
    async fn await_receipt(&self, tx_hash: TxHash) -> Result<Receipt, ChainError> {
        let poll_ms = self.poll_interval.as_millis().max(1);
        let max_polls = (self.confirmation_timeout.as_millis() / poll_ms).max(1) as usize;

        (|| self.poll_receipt(tx_hash))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(max_polls),
            )
            .when(|poll: &ReceiptPoll| matches!(poll, ReceiptPoll::Pending(_)))
            .notify(|poll: &ReceiptPoll, delay: Duration| {
                tracing::trace!(tx_hash = %tx_hash, ?poll, ?delay, "Transaction not confirmed yet, polling again...");
            })
            .await
            .map_err(|poll| match poll {
                ReceiptPoll::Pending(last) => ChainError::confirmation(
                    tx_hash,
                    format!(
                        "not confirmed within {}s (last status: {})",
                        self.confirmation_timeout.as_secs(),
                        last
                    ),
                ),
                ReceiptPoll::Reverted { block_number } => {
                    ChainError::confirmation(tx_hash, format!("reverted in block {}", block_number))
                }
                ReceiptPoll::Invalid(reason) => {
                    ChainError::confirmation(tx_hash, format!("invalid receipt: {}", reason))
                }
            })
    }
}

/// Turn a mined receipt into a confirmed one, or explain why it is not.
fn classify_receipt(
    receipt: RpcReceipt,
    head: Option<u64>,
    confirmations: u64,
) -> Result<Receipt, ReceiptPoll> {
    let Some(block_hex) = receipt.block_number else {
        return Err(ReceiptPoll::Pending("receipt has no block number yet".to_string()));
    };
    let block_number =
        rpc::parse_hex_u64(&block_hex).map_err(|e| ReceiptPoll::Pending(format!("{e:#}")))?;

    // Pre-Byzantium receipts carry no status field.
    if let Some(status) = receipt.status.as_deref() {
        match rpc::parse_hex_u64(status) {
            Ok(0) => return Err(ReceiptPoll::Reverted { block_number }),
            Ok(_) => {}
            Err(_) => {
                return Err(ReceiptPoll::Invalid(format!(
                    "unrecognized status '{}'",
                    status
                )));
            }
        }
    }

    if let Some(head) = head {
        let depth = head.saturating_sub(block_number) + 1;
        if depth < confirmations {
            return Err(ReceiptPoll::Pending(format!(
                "{}/{} confirmations",
                depth, confirmations
            )));
        }
    }

    Ok(Receipt {
        tx_hash: receipt.transaction_hash,
        block_number,
        contract_address: receipt.contract_address,
    })
}

impl ChainClient for RpcChainClient {
    async fn factory(&self, contract: &ContractId) -> Result<Factory, ChainError> {
        self.artifacts
            .load(contract)
            .map_err(|e| ChainError::submission(format!("{e:#}")))
    }

    async fn deploy(
        &self,
        factory: &Factory,
        args: &[Token],
    ) -> Result<PendingDeployment, ChainError> {
        let data = abi::creation_data(&factory.bytecode, args);
        let tx_hash = self.send_transaction(None, &data).await?;

        tracing::debug!(
            contract = %factory.contract,
            tx_hash = %tx_hash,
            "Construction transaction submitted"
        );

        Ok(PendingDeployment {
            contract: factory.contract.clone(),
            tx_hash,
        })
    }

    async fn wait_for_deployment(
        &self,
        pending: PendingDeployment,
    ) -> Result<DeployedInstance, ChainError> {
        let receipt = self.await_receipt(pending.tx_hash).await?;
        let address = receipt.contract_address.ok_or_else(|| {
            ChainError::confirmation(pending.tx_hash, "receipt carries no contract address")
        })?;

        Ok(DeployedInstance {
            contract: pending.contract,
            address,
            receipt,
        })
    }

    async fn call(
        &self,
        target: Address,
        call: &ContractCall,
    ) -> Result<PendingTransaction, ChainError> {
        let tx_hash = self.send_transaction(Some(target), &call.calldata()).await?;
        let method = call.signature();

        tracing::debug!(
            target = %target,
            method = %method,
            tx_hash = %tx_hash,
            "Call transaction submitted"
        );

        Ok(PendingTransaction {
            target,
            method,
            tx_hash,
        })
    }

    async fn wait(&self, pending: PendingTransaction) -> Result<Receipt, ChainError> {
        self.await_receipt(pending.tx_hash).await
    }
}
