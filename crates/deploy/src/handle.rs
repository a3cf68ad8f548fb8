//! Records of the transactions a deployment run submits.

use alloy_core::primitives::Address;

use crate::{
    ContractId, DeployedInstance, Receipt,
    abi::{ContractCall, Token},
    error::SequencingViolation,
    stages::{Confirmed, CoreStage, DeploymentStage, VaultStage},
};

/// Confirmation status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

/// A pending or completed contract deployment.
#[derive(Debug, Clone)]
pub struct DeploymentHandle {
    pub contract: ContractId,
    pub args: Vec<Token>,
    address: Option<Address>,
    receipt: Option<Receipt>,
    status: TxStatus,
}

impl DeploymentHandle {
    pub fn new(contract: ContractId, args: Vec<Token>) -> Self {
        Self {
            contract,
            args,
            address: None,
            receipt: None,
            status: TxStatus::Pending,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// The deployed address, only known once confirmed.
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub(crate) fn confirm(&mut self, instance: DeployedInstance) {
        self.address = Some(instance.address());
        self.receipt = Some(instance.receipt);
        self.status = TxStatus::Confirmed;
    }

    pub(crate) fn fail(&mut self) {
        self.status = TxStatus::Failed;
    }

    /// Consume the handle into a stage proof. Fails unless the handle is
    /// confirmed with an address.
    pub(crate) fn into_confirmed<S: DeploymentStage>(
        self,
    ) -> Result<Confirmed<S>, SequencingViolation> {
        match (self.status, self.address, self.receipt) {
            (TxStatus::Confirmed, Some(address), Some(receipt)) => {
                Ok(Confirmed::new(self.contract, address, receipt))
            }
            (status, ..) => Err(SequencingViolation(format!(
                "{} handle for {} is {} without a confirmed address",
                S::STAGE,
                self.contract,
                status
            ))),
        }
    }
}

/// The administrative call that authorizes the core contract on the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTransaction {
    /// The vault address.
    pub target: Address,
    pub method: String,
    /// The core address.
    pub argument: Address,
    receipt: Option<Receipt>,
    status: TxStatus,
}

impl LinkTransaction {
    /// Both sides must be confirmed before a link can even be described.
    pub fn new(
        vault: &Confirmed<VaultStage>,
        core: &Confirmed<CoreStage>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            target: vault.address(),
            method: method.into(),
            argument: core.address(),
            receipt: None,
            status: TxStatus::Pending,
        }
    }

    pub fn call(&self) -> ContractCall {
        ContractCall::new(self.method.clone(), vec![Token::Address(self.argument)])
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    pub(crate) fn confirm(&mut self, receipt: Receipt) {
        self.receipt = Some(receipt);
        self.status = TxStatus::Confirmed;
    }

    pub(crate) fn fail(&mut self) {
        self.status = TxStatus::Failed;
    }
}
