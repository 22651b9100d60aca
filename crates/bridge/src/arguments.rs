use {
    crate::forwarder::{self, Routes},
    alloy::primitives::Address,
    clap::Parser,
    ethrpc::accounts::DEV_MNEMONIC,
    provisioner::arguments::ProvisioningArguments,
    std::{fmt, path::PathBuf, time::Duration},
    url::Url,
};

observe::logging_args_with_default_filter!(LoggingArguments, "warn,bridge=debug");

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

    /// Mnemonic the deployer and the delegated account are derived from.
    #[clap(long, env, default_value = DEV_MNEMONIC)]
    pub mnemonic: String,

    /// Delegated account whose transfers are forwarded. Overrides the
    /// account derived from the mnemonic.
    #[clap(long, env)]
    pub delegatee: Option<Address>,

    /// Directory the build command runs in.
    #[clap(long, env, default_value = ".")]
    pub project_dir: PathBuf,

    /// Contract sources to watch for changes.
    #[clap(long, env, default_value = "contracts")]
    pub contracts_dir: PathBuf,

    /// Root of the per-network address book.
    #[clap(long, env, default_value = "deployments")]
    pub deployments: PathBuf,

    /// Command compiling the contracts into the artifacts directory.
    #[clap(long, env, default_value = "yarn compile")]
    pub build_command: String,

    /// Quiet period after a source change before rebuilding.
    #[clap(long, env, default_value = "200ms", value_parser = humantime::parse_duration)]
    pub debounce: Duration,

    /// How often the node is polled for new transfer logs.
    #[clap(long, env, default_value = "1s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Base URL of the webhook sink.
    #[clap(long, env, default_value = "http://127.0.0.1:8080")]
    pub webhook_url: Url,

    /// Value of the Authorization header sent to the webhook sink.
    #[clap(long, env, default_value = "xxxx")]
    pub webhook_token: String,

    /// Route non-fungible transfers are posted to.
    #[clap(long, env, default_value = "delegatee-nfttxn-mock")]
    pub nft_route: String,

    /// Route fungible transfers are posted to.
    #[clap(long, env, default_value = "delegatee-tokentxn-mock")]
    pub token_route: String,

    /// Timeout of a single webhook request.
    #[clap(long, env, default_value = "5s", value_parser = humantime::parse_duration)]
    pub webhook_timeout: Duration,

    /// Retries after a failed webhook request.
    #[clap(long, env, default_value = "3")]
    pub webhook_retries: u32,

    /// Delay before the first retry, doubled for each further one.
    #[clap(long, env, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub webhook_backoff: Duration,

    /// Upper bound of the retry delay.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub webhook_max_backoff: Duration,

    /// Payloads waiting for delivery before further ones are dropped.
    #[clap(long, env, default_value = "1024")]
    pub queue_capacity: usize,

    /// Undeliverable payloads kept for inspection.
    #[clap(long, env, default_value = "100")]
    pub dead_letter_capacity: usize,
}

impl Arguments {
    pub fn forwarder_config(&self) -> forwarder::Config {
        forwarder::Config {
            routes: Routes {
                nft: self.nft_route.clone(),
                token: self.token_route.clone(),
            },
            queue_capacity: self.queue_capacity,
            timeout: self.webhook_timeout,
            retries: self.webhook_retries,
            backoff: self.webhook_backoff,
            max_backoff: self.webhook_max_backoff,
            dead_letter_capacity: self.dead_letter_capacity,
        }
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
            delegatee,
            project_dir,
            contracts_dir,
            deployments,
            build_command,
            debounce,
            poll_interval,
            webhook_url,
            webhook_token: _,
            nft_route,
            token_route,
            webhook_timeout,
            webhook_retries,
            webhook_backoff,
            webhook_max_backoff,
            queue_capacity,
            dead_letter_capacity,
        } = self;

        write!(f, "{}", logging)?;
        write!(f, "{}", provisioning)?;
        writeln!(f, "node_url: {}", node_url)?;
        writeln!(f, "network: {}", network)?;
        writeln!(f, "mnemonic: SECRET")?;
        writeln!(f, "delegatee: {:?}", delegatee)?;
        writeln!(f, "project_dir: {}", project_dir.display())?;
        writeln!(f, "contracts_dir: {}", contracts_dir.display())?;
        writeln!(f, "deployments: {}", deployments.display())?;
        writeln!(f, "build_command: {}", build_command)?;
        writeln!(f, "debounce: {:?}", debounce)?;
        writeln!(f, "poll_interval: {:?}", poll_interval)?;
        writeln!(f, "webhook_url: {}", webhook_url)?;
        writeln!(f, "webhook_token: SECRET")?;
        writeln!(f, "nft_route: {}", nft_route)?;
        writeln!(f, "token_route: {}", token_route)?;
        writeln!(f, "webhook_timeout: {:?}", webhook_timeout)?;
        writeln!(f, "webhook_retries: {}", webhook_retries)?;
        writeln!(f, "webhook_backoff: {:?}", webhook_backoff)?;
        writeln!(f, "webhook_max_backoff: {:?}", webhook_max_backoff)?;
        writeln!(f, "queue_capacity: {}", queue_capacity)?;
        writeln!(f, "dead_letter_capacity: {}", dead_letter_capacity)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_forwarder_defaults() {
        let args = Arguments::try_parse_from(["watcher"]).unwrap();
        let config = args.forwarder_config();
        let defaults = forwarder::Config::default();

        assert_eq!(config.routes, defaults.routes);
        assert_eq!(config.queue_capacity, defaults.queue_capacity);
        assert_eq!(config.timeout, defaults.timeout);
        assert_eq!(config.backoff, defaults.backoff);
        assert_eq!(args.debounce, Duration::from_millis(200));
        assert_eq!(args.build_command, "yarn compile");
    }

    #[test]
    fn display_masks_secrets() {
        let args = Arguments::try_parse_from([
            "watcher",
            "--webhook-token",
            "super-secret-token",
            "--delegatee",
            "0xbda5747bfd65f08deb54cb465eb87d40e51b197e",
        ])
        .unwrap();
        let shown = args.to_string();
        assert!(!shown.contains("super-secret-token"));
        assert!(shown.contains("webhook_token: SECRET"));
        assert!(args.delegatee.is_some());
    }
}
