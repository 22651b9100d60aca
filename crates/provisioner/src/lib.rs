//! Deploys and configures the contract set on a development chain: deploys
//! the contracts in dependency order, initializes them, grants roles,
//! authorizes the delegate account, seeds balances and airdrops assets.
//! Repeated runs against the same chain are no-ops apart from read calls
//! and idempotent role and approval transactions.

pub mod arguments;
pub mod chain;
pub mod distributor;
pub mod onchain;
pub mod orchestrator;
pub mod pipeline;

use {
    alloy::providers::Provider,
    anyhow::Context,
    contracts::{AddressBook, Artifacts, ContractRegistry, Generation, registry::RegistryError},
    distributor::Amounts,
    ethrpc::{
        AlloyProvider,
        accounts::{Accounts, Roster},
    },
    onchain::Onchain,
    pipeline::{Pipeline, PipelineError, Report},
    std::sync::Arc,
};

/// Provisions the standard contract set with the given accounts. Every
/// call deploys what changed since the previous one and tags the result
/// with the given generation.
pub struct Provisioner {
    chain: Arc<dyn chain::Chain>,
    registry: ContractRegistry,
    accounts: Accounts,
    amounts: Amounts,
}

impl Provisioner {
    /// `provider` must sign for the deployer and the delegatee.
    pub fn new(
        provider: AlloyProvider,
        accounts: Accounts,
        artifacts: Artifacts,
        address_book: AddressBook,
        amounts: Amounts,
    ) -> Result<Self, RegistryError> {
        let chain = Onchain::new(
            provider,
            accounts.deployer.address,
            artifacts,
            address_book,
        );
        Ok(Self {
            chain: Arc::new(chain),
            registry: ContractRegistry::standard()?,
            accounts,
            amounts,
        })
    }

    pub async fn provision(&self, generation: Generation) -> Result<Report, PipelineError> {
        Pipeline::new(
            self.chain.clone(),
            self.registry.clone(),
            self.accounts.clone(),
            self.amounts,
            generation,
        )
        .run()
        .await
    }
}

pub async fn run(args: arguments::Arguments) -> anyhow::Result<()> {
    let roster = Roster::from_mnemonic(&args.mnemonic)?;
    let provider = ethrpc::alloy::provider_with_wallet(&args.node_url, roster.wallet());
    let chain_id = provider
        .get_chain_id()
        .await
        .context("could not connect to the node")?;
    tracing::info!(chain_id, network = %args.network, "connected to node");

    let provisioner = Provisioner::new(
        provider,
        roster.accounts().clone(),
        Artifacts::new(&args.provisioning.artifacts),
        AddressBook::new(&args.deployments, &args.network),
        args.provisioning.amounts(),
    )?;
    // A standalone run starts the first generation, the watcher counts
    // further ones.
    let report = provisioner.provision(Generation::default()).await?;
    tracing::info!(steps = report.steps.len(), "provisioning finished");
    Ok(())
}
