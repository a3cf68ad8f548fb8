//! ledgerlink-deploy - Deployment library for the evidence vault and ledger core contracts.
//!
//! This crate deploys the storage contract (vault), deploys the logic contract
//! (core) against it, and authorizes the core to write into the vault.

mod abi;
pub use abi::{ContractCall, Token, creation_data, encode, selector};

mod artifact;
pub use artifact::ArtifactStore;

mod chain;
pub use chain::{
    ChainClient, ChainError, ContractId, DeployedInstance, Factory, PendingDeployment,
    PendingTransaction, Receipt,
};

mod config;
pub use config::{
    ChainConfig, ContractsConfig, DEFAULT_CORE_CONTRACT, DEFAULT_LINK_METHOD, DEFAULT_RPC_URL,
    DEFAULT_VAULT_CONTRACT, DeployConfig, ENV_PREFIX, LEDGERLINK_CONFIG_FILENAME,
};

mod error;
pub use error::{DeployError, DeployFailure, ErrorKind, SequencingViolation};

mod handle;
pub use handle::{DeploymentHandle, LinkTransaction, TxStatus};

mod ingest;
pub use ingest::{EvidenceRecord, VALIDATE_METHOD, ingest_record};

mod orchestrator;
pub use orchestrator::{
    DeployedContract, DeploymentReport, DeploymentState, FailedStep, Orchestrator,
};

pub mod rpc;
pub use rpc::RpcChainClient;

pub mod stages;
pub use stages::{Confirmed, CoreStage, DeploymentStage, LinkStage, Stage, VaultStage};

pub use alloy_core::primitives::{Address, B256, Bytes, TxHash};
