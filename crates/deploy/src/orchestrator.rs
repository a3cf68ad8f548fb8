//! Deploys the vault and core contracts and links them.
//!
//! The run is a fixed three-step sequence, each step waiting for on-chain
//! confirmation before the next one can be parameterized:
//!
//! 1. deploy the vault,
//! 2. deploy the core with the vault address as constructor argument,
//! 3. call the link method on the vault with the core address.
//!
//! Any failure is terminal. Nothing is retried or rolled back: contracts that
//! were confirmed before the failure stay on chain.

use alloy_core::primitives::Address;

use crate::{
    ChainClient, ChainError, ContractId, DeployedInstance, Receipt,
    abi::Token,
    artifact::ArtifactStore,
    config::{ContractsConfig, DeployConfig},
    error::{DeployError, DeployFailure, SequencingViolation},
    handle::{DeploymentHandle, LinkTransaction},
    rpc::RpcChainClient,
    stages::{Confirmed, CoreStage, DeploymentStage, LinkStage, Stage, VaultStage},
};

/// Where a deployment run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentState {
    Start,
    AwaitingVaultConfirmation,
    VaultReady,
    AwaitingCoreConfirmation,
    CoreReady,
    AwaitingLinkConfirmation,
    Complete,
    Failed(Stage),
}

impl DeploymentState {
    fn awaiting(stage: Stage) -> Self {
        match stage {
            Stage::Vault => Self::AwaitingVaultConfirmation,
            Stage::Core => Self::AwaitingCoreConfirmation,
            Stage::Link => Self::AwaitingLinkConfirmation,
        }
    }

    fn ready(stage: Stage) -> Self {
        match stage {
            Stage::Vault => Self::VaultReady,
            Stage::Core => Self::CoreReady,
            Stage::Link => Self::Complete,
        }
    }

    /// The state a stage must start from.
    fn before(stage: Stage) -> Self {
        match stage {
            Stage::Vault => Self::Start,
            Stage::Core => Self::VaultReady,
            Stage::Link => Self::CoreReady,
        }
    }

    /// Whether the run has reached an end state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

/// A contract deployed by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub contract: ContractId,
    pub address: Address,
    pub receipt: Receipt,
}

impl<S: DeploymentStage> From<&Confirmed<S>> for DeployedContract {
    fn from(confirmed: &Confirmed<S>) -> Self {
        Self {
            contract: confirmed.contract().clone(),
            address: confirmed.address(),
            receipt: confirmed.receipt().clone(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub vault: DeployedContract,
    pub core: DeployedContract,
    /// The confirmed link call.
    pub link: LinkTransaction,
}

/// Record of the step a run aborted on.
#[derive(Debug, Clone)]
pub enum FailedStep {
    Deployment(DeploymentHandle),
    Link(LinkTransaction),
}

/// Runs the vault -> core -> link sequence against a [`ChainClient`].
pub struct Orchestrator<C> {
    contracts: ContractsConfig,
    client: C,
    state: DeploymentState,
    failed: Option<FailedStep>,
}

impl Orchestrator<RpcChainClient> {
    /// Connect to the configured node and build an orchestrator for it.
    pub async fn connect(config: DeployConfig) -> anyhow::Result<Self> {
        let artifacts = ArtifactStore::new(config.contracts.artifacts_dir.clone());
        let client = RpcChainClient::connect(&config.chain, artifacts).await?;
        Ok(Self::new(config.contracts, client))
    }
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(contracts: ContractsConfig, client: C) -> Self {
        Self {
            contracts,
            client,
            state: DeploymentState::Start,
            failed: None,
        }
    }

    pub fn state(&self) -> DeploymentState {
        self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The transaction record of the step that failed, if a chain call failed.
    pub fn failed_step(&self) -> Option<&FailedStep> {
        self.failed.as_ref()
    }

    /// Execute the full sequence and return the deployed addresses.
    pub async fn run(&mut self) -> Result<DeploymentReport, DeployError> {
        tracing::info!(
            vault = %self.contracts.vault,
            core = %self.contracts.core,
            "Starting deployment..."
        );

        let vault = self.deploy_vault().await?;
        let core = self.deploy_core(&vault).await?;
        let link = self.link(&vault, &core).await?;

        let report = DeploymentReport {
            vault: DeployedContract::from(&vault),
            core: DeployedContract::from(&core),
            link,
        };

        tracing::info!("Deployment complete");
        Ok(report)
    }

    /// Step 1: deploy the vault. Must be the first step of the run.
    pub async fn deploy_vault(&mut self) -> Result<Confirmed<VaultStage>, DeployError> {
        self.expect_state(VaultStage::STAGE)?;
        let contract = self.contracts.vault.clone();
        self.deploy_contract(DeploymentHandle::new(contract, Vec::new()))
            .await
    }

    /// Step 2: deploy the core, passing the confirmed vault address to its
    /// constructor.
    pub async fn deploy_core(
        &mut self,
        vault: &Confirmed<VaultStage>,
    ) -> Result<Confirmed<CoreStage>, DeployError> {
        self.expect_state(CoreStage::STAGE)?;
        let contract = self.contracts.core.clone();
        let args = vec![Token::Address(vault.address())];
        self.deploy_contract(DeploymentHandle::new(contract, args))
            .await
    }

    /// Step 3: authorize the core on the vault.
    pub async fn link(
        &mut self,
        vault: &Confirmed<VaultStage>,
        core: &Confirmed<CoreStage>,
    ) -> Result<LinkTransaction, DeployError> {
        let stage = LinkStage::STAGE;
        self.expect_state(stage)?;

        let mut link = LinkTransaction::new(vault, core, self.contracts.link_method.as_str());
        let call = link.call();
        self.state = DeploymentState::awaiting(stage);

        tracing::info!(
            vault = %link.target,
            core = %link.argument,
            method = %call.signature(),
            "Linking core to vault..."
        );

        let client = &self.client;
        let outcome: Result<Receipt, ChainError> = async {
            let pending = client.call(link.target, &call).await?;
            client.wait(pending).await
        }
        .await;

        match outcome {
            Ok(receipt) => {
                tracing::info!(
                    vault = %link.target,
                    core = %link.argument,
                    tx_hash = %receipt.tx_hash,
                    block = receipt.block_number,
                    "Vault linked, core authorized to write evidence"
                );
                link.confirm(receipt);
                self.state = DeploymentState::ready(stage);
                Ok(link)
            }
            Err(err) => {
                link.fail();
                self.failed = Some(FailedStep::Link(link));
                Err(self.fail(stage, err))
            }
        }
    }

    /// Submit a construction transaction and wait for it to confirm.
    async fn deploy_contract<S: DeploymentStage>(
        &mut self,
        mut handle: DeploymentHandle,
    ) -> Result<Confirmed<S>, DeployError> {
        let stage = S::STAGE;
        self.state = DeploymentState::awaiting(stage);

        tracing::info!(stage = %stage, contract = %handle.contract, "Deploying contract...");

        let client = &self.client;
        let outcome: Result<DeployedInstance, ChainError> = async {
            let factory = client.factory(&handle.contract).await?;
            let pending = client.deploy(&factory, &handle.args).await?;
            client.wait_for_deployment(pending).await
        }
        .await;

        let instance = match outcome {
            Ok(instance) => instance,
            Err(err) => {
                handle.fail();
                self.failed = Some(FailedStep::Deployment(handle));
                return Err(self.fail(stage, err));
            }
        };

        handle.confirm(instance);
        let confirmed = handle
            .into_confirmed::<S>()
            .map_err(|violation| self.fail(stage, violation))?;

        self.state = DeploymentState::ready(stage);

        tracing::info!(
            stage = %stage,
            tx_hash = %confirmed.receipt().tx_hash,
            block = confirmed.receipt().block_number,
            next = ?stage.next(),
            "{} deployed to: {}",
            confirmed.contract(),
            confirmed.address()
        );

        Ok(confirmed)
    }

    /// Refuse to start `stage` unless the previous one just completed.
    fn expect_state(&mut self, stage: Stage) -> Result<(), DeployError> {
        let expected = DeploymentState::before(stage);
        if self.state != expected {
            let violation = SequencingViolation(format!(
                "{} stage started in state {:?}, expected {:?}",
                stage, self.state, expected
            ));
            return Err(self.fail(stage, violation));
        }
        Ok(())
    }

    /// Mark the run as failed at `stage`.
    fn fail(&mut self, stage: Stage, failure: impl Into<DeployFailure>) -> DeployError {
        self.state = DeploymentState::Failed(stage);
        tracing::warn!(stage = %stage, "Deployment aborted, no further steps will run");
        DeployError::new(stage, failure)
    }
}
