use {
    crate::distributor::Amounts,
    alloy::primitives::U256,
    clap::Parser,
    ethrpc::accounts::DEV_MNEMONIC,
    std::{fmt, path::PathBuf},
    url::Url,
};

observe::logging_args_with_default_filter!(LoggingArguments, "warn,provisioner=debug,ethrpc=debug");

#[derive(Parser)]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    #[clap(flatten)]
    pub provisioning: ProvisioningArguments,

    /// The Ethereum node URL to connect to.
    #[clap(long, env, default_value = "http://localhost:8545")]
    pub node_url: Url,

    /// Name of the network the deployments are recorded under.
    #[clap(long, env, default_value = "localhost")]
    pub network: String,

    /// Mnemonic the account roster is derived from.
    #[clap(long, env, default_value = DEV_MNEMONIC)]
    pub mnemonic: String,

    /// Root of the per-network address book.
    #[clap(long, env, default_value = "deployments")]
    pub deployments: PathBuf,
}

/// Arguments of a provisioning run, shared by every binary that provisions.
#[derive(Parser)]
pub struct ProvisioningArguments {
    /// Directory holding the toolchain's compiled contract artifacts.
    #[clap(long, env, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Whole coins minted, and whole tokens transferred, to every seeded
    /// account.
    #[clap(long, env, default_value = "10000")]
    pub seed_amount: u64,

    /// Whole coins and tokens the admin may move on behalf of the delegatee.
    #[clap(long, env, default_value = "100000000000000")]
    pub allowance: u64,
}

impl ProvisioningArguments {
    pub fn amounts(&self) -> Amounts {
        Amounts {
            seed: whole_tokens(self.seed_amount),
            allowance: whole_tokens(self.allowance),
        }
    }
}

/// Converts an amount of whole tokens to base units, all provisioned tokens
/// use 18 decimals.
pub fn whole_tokens(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18u64))
}

impl fmt::Display for ProvisioningArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            artifacts,
            seed_amount,
            allowance,
        } = self;

        writeln!(f, "artifacts: {}", artifacts.display())?;
        writeln!(f, "seed_amount: {}", seed_amount)?;
        writeln!(f, "allowance: {}", allowance)?;
        Ok(())
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            provisioning,
            node_url,
            network,
            mnemonic: _,
            deployments,
        } = self;

        write!(f, "{}", logging)?;
        write!(f, "{}", provisioning)?;
        writeln!(f, "node_url: {}", node_url)?;
        writeln!(f, "network: {}", network)?;
        writeln!(f, "mnemonic: SECRET")?;
        writeln!(f, "deployments: {}", deployments.display())?;
        Ok(())
    }
}
