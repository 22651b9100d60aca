//! Chain log feeds backing the bridge's subscriptions.

use {
    crate::event::TransferEvent,
    alloy::{
        primitives::Address,
        providers::Provider,
        rpc::types::Filter,
        sol_types::SolEvent,
    },
    contracts::{Generation, TokenStandard, alloy::IERC721},
    ethrpc::AlloyProvider,
    futures::StreamExt,
    std::time::Duration,
    tokio::{sync::mpsc, task::JoinHandle},
};

/// One observed contract of one generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub generation: Generation,
    pub name: String,
    pub contract: Address,
    pub standard: TokenStandard,
}

/// Owns a running feed task and stops it when dropped.
#[derive(Debug)]
pub struct FeedHandle(JoinHandle<()>);

impl FeedHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self(task)
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Source of the transfer events of a subscription.
#[cfg_attr(test, mockall::automock)]
pub trait EventFeed: Send + Sync {
    /// Starts streaming the subscription's transfers, tagged with its
    /// generation, into `events`.
    fn start(
        &self,
        subscription: Subscription,
        events: mpsc::UnboundedSender<TransferEvent>,
    ) -> FeedHandle;
}

/// Polls the node for `Transfer` logs of the subscribed contract.
pub struct LogFeed {
    provider: AlloyProvider,
    poll_interval: Duration,
}

impl LogFeed {
    pub fn new(provider: AlloyProvider, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
        }
    }
}

impl EventFeed for LogFeed {
    fn start(
        &self,
        subscription: Subscription,
        events: mpsc::UnboundedSender<TransferEvent>,
    ) -> FeedHandle {
        let provider = self.provider.clone();
        let poll_interval = self.poll_interval;
        FeedHandle::new(tokio::spawn(async move {
            poll(provider, poll_interval, subscription, events).await
        }))
    }
}

async fn poll(
    provider: AlloyProvider,
    poll_interval: Duration,
    subscription: Subscription,
    events: mpsc::UnboundedSender<TransferEvent>,
) {
    // ERC-721 and ERC-20 transfers share the topic.
    let filter = Filter::new()
        .address(subscription.contract)
        .event_signature(IERC721::Transfer::SIGNATURE_HASH);
    loop {
        let poller = match provider.watch_logs(&filter).await {
            Ok(poller) => poller,
            Err(err) => {
                tracing::warn!(?err, name = %subscription.name, "failed to install log filter, retrying");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        tracing::debug!(name = %subscription.name, contract = ?subscription.contract, generation = %subscription.generation, "watching transfers");

        let mut stream = poller.with_poll_interval(poll_interval).into_stream();
        while let Some(logs) = stream.next().await {
            for log in logs {
                match TransferEvent::decode(&log, subscription.standard, subscription.generation) {
                    Ok(event) => {
                        if events.send(event).is_err() {
                            tracing::debug!(name = %subscription.name, "bridge stopped, ending feed");
                            return;
                        }
                    }
                    Err(err) => tracing::warn!(?err, ?log, "skipping undecodable transfer log"),
                }
            }
        }
        // The poller ends when the node drops the filter, e.g. after a
        // restart of a development node.
        tracing::warn!(name = %subscription.name, "log filter expired, reinstalling");
        tokio::time::sleep(poll_interval).await;
    }
}
