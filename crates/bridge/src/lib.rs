//! Mirrors transfers involving the delegated account to a webhook sink and
//! follows the contracts through rebuilds: source changes trigger the build
//! toolchain, the changed contracts are provisioned again and the bridge
//! moves to the freshly deployed ones.

pub mod arguments;
pub mod bridge;
pub mod event;
pub mod feed;
pub mod forwarder;
pub mod lifecycle;
pub mod payload;
pub mod shutdown;
pub mod toolchain;
pub mod watcher;

use {
    anyhow::{Context, Result},
    bridge::{EventBridge, Relevance},
    contracts::{AddressBook, Artifacts, ContractRegistry},
    ethrpc::accounts::Roster,
    feed::LogFeed,
    provisioner::Provisioner,
    forwarder::{Forwarder, Webhook},
    lifecycle::LifecycleManager,
    shutdown::Shutdown,
    std::sync::Arc,
    tokio::sync::mpsc,
    toolchain::Toolchain,
    watcher::ChangeWatcher,
};

pub async fn run(args: arguments::Arguments) -> Result<()> {
    let roster = Roster::from_mnemonic(&args.mnemonic)?;
    let delegatee = args
        .delegatee
        .unwrap_or(roster.accounts().delegatee.address);
    tracing::info!(?delegatee, "forwarding transfers of the delegated account");
    let mut shutdown = Shutdown::install().context("failed to install signal handlers")?;

    let webhook = Webhook::new(
        reqwest::Client::new(),
        args.webhook_url.clone(),
        args.webhook_token.clone(),
    )?;
    let (forwarder, worker) = Forwarder::spawn(Arc::new(webhook), args.forwarder_config());
    let forwarder = Arc::new(forwarder);

    let (events, receiver) = mpsc::unbounded_channel();
    let bridge = Arc::new(EventBridge::default());
    let dispatcher = tokio::spawn(bridge.clone().dispatch(receiver));
    let feed = LogFeed::new(ethrpc::alloy::provider(&args.node_url), args.poll_interval);
    let manager = LifecycleManager::new(
        bridge,
        Arc::new(feed),
        events,
        forwarder.clone(),
        Relevance::new(delegatee),
    );

    let address_book = AddressBook::new(&args.deployments, &args.network);
    match lifecycle::resolve_targets(&ContractRegistry::standard()?, &address_book) {
        Ok(targets) => {
            manager.rebind(&targets);
        }
        Err(err) => {
            tracing::warn!(?err, "no complete deployment recorded, waiting for the first build")
        }
    }

    let provisioner = Provisioner::new(
        ethrpc::alloy::provider_with_wallet(&args.node_url, roster.wallet()),
        roster.accounts().clone(),
        Artifacts::new(&args.provisioning.artifacts),
        address_book,
        args.provisioning.amounts(),
    )?;
    let toolchain = Toolchain::new(&args.build_command, &args.project_dir)?;
    let (changes, mut changed) = mpsc::unbounded_channel();
    let _watcher = ChangeWatcher::new(&args.contracts_dir, changes)?;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            batch = watcher::next_batch(&mut changed, args.debounce) => {
                let Some(paths) = batch else {
                    tracing::error!("file watcher stopped");
                    break;
                };
                tracing::info!(?paths, "contract sources changed");
                tokio::select! {
                    _ = shutdown.recv() => break,
                    generation = manager.rebuild(&toolchain, &provisioner) => {
                        if let Some(generation) = generation {
                            tracing::info!(%generation, "bridge follows the new deployment");
                        }
                    }
                }
            }
        }
    }

    manager.shutdown();
    forwarder.close();
    if let Err(err) = worker.await {
        tracing::error!(?err, "delivery worker failed");
    }
    let dead_letters = forwarder.dead_letters().snapshot().len();
    if dead_letters > 0 {
        tracing::warn!(dead_letters, "some transfers could not be delivered");
    }
    dispatcher.abort();
    Ok(())
}
