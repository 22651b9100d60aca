//! Binding the bridge to a deployment and moving it to the next one after
//! every successful rebuild.

use {
    crate::{
        bridge::{EventBridge, Relevance},
        event::TransferEvent,
        feed::{EventFeed, Subscription},
        forwarder::Forward,
        toolchain::{BuildFailure, Rebuild},
    },
    alloy::primitives::Address,
    anyhow::Result,
    contracts::{AddressBook, ContractRegistry, Generation, TokenStandard},
    provisioner::{Provisioner, orchestrator::Deployed},
    std::sync::{Arc, Mutex},
    tokio::sync::mpsc,
};

/// A deployed contract whose transfers are observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub address: Address,
    pub standard: TokenStandard,
}

/// The observed contracts of the registry at the addresses the address book
/// records. Fails if one of them is not deployed.
pub fn resolve_targets(registry: &ContractRegistry, address_book: &AddressBook) -> Result<Vec<Target>> {
    let addresses = address_book.resolve(registry)?;
    Ok(registry
        .specs()
        .iter()
        .zip(addresses)
        .filter_map(|(spec, (name, address))| {
            Some(Target {
                name,
                address,
                standard: spec.kind.standard()?,
            })
        })
        .collect())
}

/// The observed contracts of a fresh deployment.
pub fn deployed_targets(deployed: &Deployed) -> Vec<Target> {
    deployed
        .iter()
        .filter_map(|contract| {
            Some(Target {
                name: contract.name.clone(),
                address: contract.address,
                standard: contract.kind.standard()?,
            })
        })
        .collect()
}

/// Deploys what a rebuild changed.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Redeploy: Send + Sync {
    /// Runs the deployment pipeline, tagging its contracts with
    /// `generation`.
    async fn redeploy(&self, generation: Generation) -> Result<Deployed>;
}

#[async_trait::async_trait]
impl Redeploy for Provisioner {
    async fn redeploy(&self, generation: Generation) -> Result<Deployed> {
        Ok(self.provision(generation).await?.deployed)
    }
}

pub struct LifecycleManager {
    bridge: Arc<EventBridge>,
    feed: Arc<dyn EventFeed>,
    events: mpsc::UnboundedSender<TransferEvent>,
    forward: Arc<dyn Forward>,
    relevance: Relevance,
    current: Mutex<Option<Generation>>,
}

impl LifecycleManager {
    pub fn new(
        bridge: Arc<EventBridge>,
        feed: Arc<dyn EventFeed>,
        events: mpsc::UnboundedSender<TransferEvent>,
        forward: Arc<dyn Forward>,
        relevance: Relevance,
    ) -> Self {
        Self {
            bridge,
            feed,
            events,
            forward,
            relevance,
            current: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<Generation> {
        *self.current.lock().unwrap()
    }

    fn next_generation(&self) -> Generation {
        self.current().map(Generation::next).unwrap_or_default()
    }

    /// Moves the bridge to the next generation bound to `targets`.
    pub fn rebind(&self, targets: &[Target]) -> Generation {
        self.bind(self.next_generation(), targets)
    }

    /// Every listener of a generation before `generation` is retired before
    /// the new ones are registered.
    fn bind(&self, generation: Generation, targets: &[Target]) -> Generation {
        let mut current = self.current.lock().unwrap();
        self.bridge.retire_before(generation);
        for target in targets {
            let subscription = Subscription {
                generation,
                name: target.name.clone(),
                contract: target.address,
                standard: target.standard,
            };
            let feed = self.feed.start(subscription.clone(), self.events.clone());
            self.bridge
                .subscribe(subscription, self.relevance, self.forward.clone(), feed);
        }
        *current = Some(generation);
        tracing::info!(%generation, contracts = targets.len(), "bridge bound to deployment");
        generation
    }

    /// Compiles, deploys the next generation and binds to it. If either step
    /// fails the current generation stays bound.
    pub async fn rebuild(
        &self,
        toolchain: &dyn Rebuild,
        redeploy: &dyn Redeploy,
    ) -> Option<Generation> {
        if let Err(err) = toolchain.rebuild().await {
            match &err {
                BuildFailure::Exit { stderr, .. } => {
                    tracing::error!(?err, %stderr, current = ?self.current(), "build failed, keeping current deployment")
                }
                BuildFailure::Spawn { .. } => {
                    tracing::error!(?err, current = ?self.current(), "build failed, keeping current deployment")
                }
            }
            return None;
        }
        let generation = self.next_generation();
        match redeploy.redeploy(generation).await {
            Ok(deployed) => Some(self.bind(generation, &deployed_targets(&deployed))),
            Err(err) => {
                tracing::error!(?err, %generation, current = ?self.current(), "deployment failed, keeping current deployment");
                None
            }
        }
    }

    pub fn shutdown(&self) {
        let retired = self.bridge.retire_all();
        tracing::info!(retired, "unsubscribed all listeners");
    }
}
