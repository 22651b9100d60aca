use {
    crate::{
        chain::Chain,
        pipeline::{PipelineError, Progress, Step, StepOutcome},
    },
    alloy::primitives::Address,
    anyhow::Context,
    contracts::{ContractKind, ContractRegistry, ContractSpec, DeployedContract, Generation},
    ethrpc::alloy::errors::Outcome,
    std::{collections::BTreeMap, sync::Arc},
};

/// The contracts of one generation, keyed by the part they play.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deployed {
    contracts: BTreeMap<ContractKind, DeployedContract>,
}

impl Deployed {
    pub fn insert(&mut self, contract: DeployedContract) {
        self.contracts.insert(contract.kind, contract);
    }

    pub fn get(&self, kind: ContractKind) -> Option<&DeployedContract> {
        self.contracts.get(&kind)
    }

    pub fn address(&self, kind: ContractKind) -> anyhow::Result<Address> {
        self.get(kind)
            .map(|contract| contract.address)
            .with_context(|| format!("no {kind} contract was deployed"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeployedContract> {
        self.contracts.values()
    }
}

/// Deploys the registry's contracts in dependency order, reusing earlier
/// deployments, and runs their initializers.
pub struct Orchestrator {
    chain: Arc<dyn Chain>,
    generation: Generation,
}

impl Orchestrator {
    pub fn new(chain: Arc<dyn Chain>, generation: Generation) -> Self {
        Self { chain, generation }
    }

    pub async fn deploy_all(
        &self,
        registry: &ContractRegistry,
        progress: &mut Progress,
    ) -> Result<Deployed, PipelineError> {
        let mut deployed = Deployed::default();
        for spec in registry.deploy_order()? {
            let address = self.deploy(spec, &deployed, progress).await?;
            if spec.initializer {
                self.initialize(spec, address, progress).await?;
            }
            deployed.insert(DeployedContract {
                name: spec.name.clone(),
                kind: spec.kind,
                address,
                generation: self.generation,
            });
        }
        Ok(deployed)
    }

    async fn deploy(
        &self,
        spec: &ContractSpec,
        deployed: &Deployed,
        progress: &mut Progress,
    ) -> Result<Address, PipelineError> {
        let step = Step::Deploy(spec.kind);
        let args = spec
            .dependencies()
            .map(|kind| deployed.address(kind))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|err| PipelineError::at(step)(err.into()))?;
        if let Some(address) = self
            .chain
            .deployment(&spec.name, args.clone())
            .await
            .map_err(PipelineError::at(step))?
        {
            tracing::info!(name = %spec.name, ?address, "reusing deployment");
            progress.record(step, StepOutcome::Reused);
            return Ok(address);
        }

        let address = self
            .chain
            .deploy(&spec.name, args)
            .await
            .map_err(PipelineError::at(step))?;
        tracing::info!(name = %spec.name, ?address, generation = %self.generation, "deployed");
        progress.record(step, StepOutcome::Done);
        Ok(address)
    }

    async fn initialize(
        &self,
        spec: &ContractSpec,
        address: Address,
        progress: &mut Progress,
    ) -> Result<(), PipelineError> {
        let step = Step::Initialize(spec.kind);
        match Outcome::from(self.chain.initialize(address).await) {
            Outcome::Ok(tx) => {
                tracing::info!(name = %spec.name, ?tx, "initialized");
                progress.record(step, StepOutcome::Done);
            }
            Outcome::AlreadyDone(reason) => {
                tracing::info!(name = %spec.name, %reason, "initializer already ran");
                progress.record(step, StepOutcome::AlreadyDone);
            }
            Outcome::Fatal(source) => return Err(PipelineError::Halted { step, source }),
        }
        Ok(())
    }
}
