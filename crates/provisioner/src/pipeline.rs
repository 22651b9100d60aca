//! The provisioning run as an ordered list of steps. Each step either
//! completes, is found to be done already, or halts the run.

use {
    crate::{
        chain::Chain,
        distributor::{Amounts, Distributor, TOKEN_ID_BASE, TOKENS_PER_USER, build_airdrop_records},
        orchestrator::{Deployed, Orchestrator},
    },
    contracts::{ContractKind, ContractRegistry, Generation, registry::RegistryError},
    ethrpc::{accounts::Accounts, alloy::errors::ChainError},
    std::{fmt, sync::Arc},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Deploy(ContractKind),
    Initialize(ContractKind),
    GrantRoles,
    AuthorizeDelegate,
    SeedBalances,
    Airdrop,
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy(kind) => write!(f, "DEPLOY_{kind}"),
            Self::Initialize(kind) => write!(f, "INIT_{kind}"),
            Self::GrantRoles => f.write_str("GRANT_ROLES"),
            Self::AuthorizeDelegate => f.write_str("AUTHORIZE_DELEGATE"),
            Self::SeedBalances => f.write_str("SEED_BALANCES"),
            Self::Airdrop => f.write_str("AIRDROP"),
            Self::Done => f.write_str("DONE"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's effect was applied by this run.
    Done,
    /// An earlier deployment was found and reused.
    Reused,
    /// The chain reported the effect as already in place.
    AlreadyDone,
    /// A read showed the effect is in place, nothing was sent.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid contract registry")]
    Registry(#[from] RegistryError),
    #[error("provisioning halted at {step}")]
    Halted {
        step: Step,
        #[source]
        source: ChainError,
    },
}

impl PipelineError {
    pub fn at(step: Step) -> impl Fn(ChainError) -> Self {
        move |source| Self::Halted { step, source }
    }
}

#[derive(Debug, Default)]
pub struct Progress {
    steps: Vec<(Step, StepOutcome)>,
}

impl Progress {
    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        tracing::info!(%step, ?outcome, "step finished");
        self.steps.push((step, outcome));
    }

    pub fn steps(&self) -> &[(Step, StepOutcome)] {
        &self.steps
    }
}

#[derive(Debug)]
pub struct Report {
    pub deployed: Deployed,
    pub steps: Vec<(Step, StepOutcome)>,
}

impl Report {
    pub fn outcome(&self, step: Step) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|(recorded, _)| *recorded == step)
            .map(|(_, outcome)| *outcome)
    }
}

pub struct Pipeline {
    chain: Arc<dyn Chain>,
    registry: ContractRegistry,
    accounts: Accounts,
    amounts: Amounts,
    generation: Generation,
}

impl Pipeline {
    pub fn new(
        chain: Arc<dyn Chain>,
        registry: ContractRegistry,
        accounts: Accounts,
        amounts: Amounts,
        generation: Generation,
    ) -> Self {
        Self {
            chain,
            registry,
            accounts,
            amounts,
            generation,
        }
    }

    /// Runs every step in order. Safe to repeat against the same chain: a
    /// second run reuses the deployments, tolerates the initializers having
    /// run and issues no further balances or assets.
    pub async fn run(&self) -> Result<Report, PipelineError> {
        let mut progress = Progress::default();
        let deployed = Orchestrator::new(self.chain.clone(), self.generation)
            .deploy_all(&self.registry, &mut progress)
            .await?;

        let distributor = Distributor::new(self.chain.clone(), self.accounts.clone(), self.amounts);
        let step = Step::GrantRoles;
        let grants = distributor
            .role_grants(&deployed)
            .map_err(|err| PipelineError::at(step)(err.into()))?;
        for grant in grants {
            distributor
                .grant_role(grant)
                .await
                .map_err(PipelineError::at(step))?;
        }
        progress.record(step, StepOutcome::Done);

        let step = Step::AuthorizeDelegate;
        distributor
            .authorize_delegate(&self.accounts.delegatee, &self.accounts.admin, &deployed)
            .await
            .map_err(PipelineError::at(step))?;
        progress.record(step, StepOutcome::Done);

        let seeded = distributor
            .already_seeded(&deployed)
            .await
            .map_err(PipelineError::at(Step::SeedBalances))?;
        if seeded {
            tracing::info!("assets were issued by an earlier run, skipping seeding and airdrop");
            progress.record(Step::SeedBalances, StepOutcome::Skipped);
            progress.record(Step::Airdrop, StepOutcome::Skipped);
        } else {
            distributor
                .seed_balances(&self.accounts.users, self.amounts.seed, &deployed)
                .await
                .map_err(PipelineError::at(Step::SeedBalances))?;
            progress.record(Step::SeedBalances, StepOutcome::Done);

            let records = build_airdrop_records(
                &self.accounts.user_addresses(),
                TOKEN_ID_BASE,
                TOKENS_PER_USER,
            )
            .map_err(|err| PipelineError::at(Step::Airdrop)(err.into()))?;
            distributor
                .batch_distribute(&deployed, records)
                .await
                .map_err(PipelineError::at(Step::Airdrop))?;
            progress.record(Step::Airdrop, StepOutcome::Done);
        }
        progress.record(Step::Done, StepOutcome::Done);

        let report = Report {
            deployed,
            steps: progress.steps,
        };
        log_summary(&report, &self.accounts);
        Ok(report)
    }
}

fn lowercase(address: alloy::primitives::Address) -> String {
    address.to_string().to_lowercase()
}

fn log_summary(report: &Report, accounts: &Accounts) {
    for contract in report.deployed.iter() {
        tracing::info!(
            name = %contract.name,
            kind = %contract.kind,
            address = %lowercase(contract.address),
            generation = %contract.generation,
            "contract"
        );
    }
    tracing::info!(
        deployer = %lowercase(accounts.deployer.address),
        delegatee = %lowercase(accounts.delegatee.address),
        admin = %lowercase(accounts.admin.address),
        users = ?accounts.users.iter().map(|user| lowercase(user.address)).collect::<Vec<_>>(),
        "accounts"
    );
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::chain::MockChain,
        alloy::primitives::{Address, TxHash, U256},
        mockall::predicate::eq,
    };

    fn address_of(name: &str) -> Address {
        match name {
            "SomeNFT" => Address::with_last_byte(0xa1),
            "SomeCoin" => Address::with_last_byte(0xa2),
            "SomeToken" => Address::with_last_byte(0xa3),
            "Airdrop" => Address::with_last_byte(0xa4),
            _ => Address::ZERO,
        }
    }

    fn accounts() -> Accounts {
        let addresses: Vec<_> = (0..19).map(Address::with_last_byte).collect();
        Accounts::from_addresses(&addresses).unwrap()
    }

    fn pipeline(chain: MockChain) -> Pipeline {
        Pipeline::new(
            Arc::new(chain),
            ContractRegistry::standard().unwrap(),
            accounts(),
            Amounts::default(),
            Generation::default(),
        )
    }

    /// Expectations shared by fresh and repeated runs.
    fn expect_configuration(chain: &mut MockChain) {
        chain
            .expect_grant_role()
            .times(3)
            .returning(|_, _, _| Ok(TxHash::ZERO));
        chain
            .expect_set_approval_for_all()
            .with(
                eq(address_of("SomeNFT")),
                eq(Address::with_last_byte(17)),
                eq(Address::with_last_byte(18)),
            )
            .times(1)
            .returning(|_, _, _| Ok(TxHash::ZERO));
        chain
            .expect_approve()
            .times(2)
            .returning(|_, _, _, _| Ok(TxHash::ZERO));
    }

    #[tokio::test]
    async fn fresh_chain_runs_every_step() {
        observe::tracing::initialize_reentrant("provisioner=debug");
        let mut chain = MockChain::new();
        chain.expect_deployment().times(4).returning(|_, _| Ok(None));
        chain
            .expect_deploy()
            .times(4)
            .returning(|name, _| Ok(address_of(name)));
        chain
            .expect_initialize()
            .times(3)
            .returning(|_| Ok(TxHash::ZERO));
        expect_configuration(&mut chain);
        chain
            .expect_owner_of()
            .with(eq(address_of("SomeNFT")), eq(U256::from(1000)))
            .times(1)
            .returning(|_, _| Ok(None));
        // The delegatee plus every user.
        chain
            .expect_mint()
            .times(16)
            .returning(|_, _, _| Ok(TxHash::ZERO));
        chain
            .expect_transfer()
            .times(15)
            .returning(|_, _, _| Ok(TxHash::ZERO));
        chain
            .expect_batch_mint()
            .withf(|contract, records| {
                *contract == address_of("Airdrop")
                    && records.len() == 150
                    && records[0].token_id == 1000
                    && records[0].recipient == Address::with_last_byte(1)
            })
            .times(1)
            .returning(|_, _| Ok(TxHash::ZERO));

        let report = pipeline(chain).run().await.unwrap();

        assert_eq!(report.outcome(Step::Deploy(ContractKind::Asset)), Some(StepOutcome::Done));
        assert_eq!(report.outcome(Step::Initialize(ContractKind::Token)), Some(StepOutcome::Done));
        assert_eq!(report.outcome(Step::SeedBalances), Some(StepOutcome::Done));
        assert_eq!(report.outcome(Step::Airdrop), Some(StepOutcome::Done));
        assert_eq!(report.steps.last(), Some(&(Step::Done, StepOutcome::Done)));
        assert_eq!(report.deployed.iter().count(), 4);
    }

    #[tokio::test]
    async fn repeated_run_changes_nothing() {
        let mut chain = MockChain::new();
        chain
            .expect_deployment()
            .times(4)
            .returning(|name, _| Ok(Some(address_of(name))));
        chain.expect_deploy().never();
        chain
            .expect_initialize()
            .times(3)
            .returning(|_| Err(ChainError::AlreadyInitialized));
        expect_configuration(&mut chain);
        chain
            .expect_owner_of()
            .times(1)
            .returning(|_, _| Ok(Some(Address::with_last_byte(1))));
        chain.expect_mint().never();
        chain.expect_transfer().never();
        chain.expect_batch_mint().never();

        let report = pipeline(chain).run().await.unwrap();

        for kind in [ContractKind::Asset, ContractKind::Coin, ContractKind::Token, ContractKind::Distributor] {
            assert_eq!(report.outcome(Step::Deploy(kind)), Some(StepOutcome::Reused));
        }
        assert_eq!(
            report.outcome(Step::Initialize(ContractKind::Asset)),
            Some(StepOutcome::AlreadyDone)
        );
        assert_eq!(report.outcome(Step::SeedBalances), Some(StepOutcome::Skipped));
        assert_eq!(report.outcome(Step::Airdrop), Some(StepOutcome::Skipped));
        assert_eq!(
            report.deployed.address(ContractKind::Coin).unwrap(),
            address_of("SomeCoin")
        );
    }

    #[tokio::test]
    async fn failed_role_grant_halts_before_distribution() {
        let mut chain = MockChain::new();
        chain.expect_deployment().returning(|_, _| Ok(None));
        chain
            .expect_deploy()
            .returning(|name, _| Ok(address_of(name)));
        chain.expect_initialize().returning(|_| Ok(TxHash::ZERO));
        chain
            .expect_grant_role()
            .times(1)
            .returning(|_, _, _| Err(ChainError::Reverted("AccessControl: sender is missing role".into())));
        chain.expect_set_approval_for_all().never();
        chain.expect_approve().never();
        chain.expect_owner_of().never();
        chain.expect_mint().never();
        chain.expect_batch_mint().never();

        let err = pipeline(chain).run().await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Halted {
                step: Step::GrantRoles,
                source: ChainError::Reverted(_),
            }
        ));
        assert_eq!(err.to_string(), "provisioning halted at GRANT_ROLES");
    }

    #[tokio::test]
    async fn failed_seeding_halts_before_airdrop() {
        let mut chain = MockChain::new();
        chain.expect_deployment().returning(|_, _| Ok(None));
        chain
            .expect_deploy()
            .returning(|name, _| Ok(address_of(name)));
        chain.expect_initialize().returning(|_| Ok(TxHash::ZERO));
        expect_configuration(&mut chain);
        chain.expect_owner_of().returning(|_, _| Ok(None));
        chain
            .expect_mint()
            .returning(|_, _, _| Err(ChainError::Failed(TxHash::ZERO)));
        chain.expect_batch_mint().never();

        let err = pipeline(chain).run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Halted {
                step: Step::SeedBalances,
                ..
            }
        ));
    }

    #[test]
    fn steps_display_like_the_run_log() {
        assert_eq!(Step::Deploy(ContractKind::Asset).to_string(), "DEPLOY_ASSET");
        assert_eq!(Step::Initialize(ContractKind::Coin).to_string(), "INIT_COIN");
        assert_eq!(Step::AuthorizeDelegate.to_string(), "AUTHORIZE_DELEGATE");
    }
}
