//! Deployment stage markers for type-state sequencing.
//!
//! The deployment order is fixed: Vault -> Core -> Link.
//! A [`Confirmed`] value can only be produced by the orchestrator once a stage's
//! transaction is confirmed on chain, and later stages take it as input, so a
//! stage cannot be started with an address that was never confirmed.

use std::marker::PhantomData;

use alloy_core::primitives::Address;

use crate::{ContractId, Receipt};

/// Runtime tag for the three deployment stages.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// Deploy the storage contract.
    Vault,
    /// Deploy the logic contract, parameterized by the vault address.
    Core,
    /// Authorize the core contract on the vault.
    Link,
}

impl Stage {
    /// The stage that runs after this one, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Vault => Some(Stage::Core),
            Stage::Core => Some(Stage::Link),
            Stage::Link => None,
        }
    }
}

/// Marker for the vault deployment stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultStage;

/// Marker for the core deployment stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreStage;

/// Marker for the linking stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStage;

/// Sealed trait for deployment stages.
mod sealed {
    pub trait Sealed {}
    impl Sealed for super::VaultStage {}
    impl Sealed for super::CoreStage {}
    impl Sealed for super::LinkStage {}
}

/// Marker trait for valid deployment stages.
pub trait DeploymentStage:
    sealed::Sealed + std::fmt::Debug + Clone + Send + Sync + 'static
{
    /// The runtime tag of this stage.
    const STAGE: Stage;
}

impl DeploymentStage for VaultStage {
    const STAGE: Stage = Stage::Vault;
}

impl DeploymentStage for CoreStage {
    const STAGE: Stage = Stage::Core;
}

impl DeploymentStage for LinkStage {
    const STAGE: Stage = Stage::Link;
}

/// Proof that the contract of stage `S` is deployed and confirmed.
#[derive(Debug, Clone)]
pub struct Confirmed<S: DeploymentStage> {
    contract: ContractId,
    address: Address,
    receipt: Receipt,
    _stage: PhantomData<S>,
}

impl<S: DeploymentStage> Confirmed<S> {
    pub(crate) fn new(contract: ContractId, address: Address, receipt: Receipt) -> Self {
        Self {
            contract,
            address,
            receipt,
            _stage: PhantomData,
        }
    }

    /// The contract that was deployed.
    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    /// The confirmed on-chain address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Receipt of the construction transaction.
    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }
}
