//! Registry of the live transfer subscriptions and dispatch of events to
//! them.
//!
//! Subscriptions are keyed by generation so that all listeners of a replaced
//! deployment are retired in one step. An event only reaches listeners of
//! the generation it was observed under; events of retired generations are
//! discarded.

use {
    crate::{
        event::TransferEvent,
        feed::{FeedHandle, Subscription},
        forwarder::Forward,
        payload::Payload,
    },
    alloy::primitives::Address,
    chrono::Utc,
    contracts::Generation,
    std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    },
    tokio::sync::mpsc,
};

/// Decides which transfers are forwarded: those moving assets from or to the
/// delegated account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relevance {
    delegatee: Address,
}

impl Relevance {
    pub fn new(delegatee: Address) -> Self {
        Self { delegatee }
    }

    /// Compares parsed addresses, so the textual case of either side does not
    /// matter.
    pub fn matches(&self, event: &TransferEvent) -> bool {
        event.from == self.delegatee || event.to == self.delegatee
    }
}

struct Listener {
    subscription: Subscription,
    relevance: Relevance,
    forward: Arc<dyn Forward>,
    _feed: FeedHandle,
}

impl Listener {
    fn observes(&self, event: &TransferEvent) -> bool {
        self.subscription.contract == event.contract
            && self.subscription.standard == event.standard()
    }

    fn handle(&self, event: &TransferEvent) {
        tracing::info!(
            name = %self.subscription.name,
            from = ?event.from,
            to = ?event.to,
            moved = ?event.moved,
            tx = ?event.transaction_hash,
            "transfer"
        );
        if self.relevance.matches(event) {
            self.forward.forward(Payload::new(event, Utc::now()));
        }
    }
}

#[derive(Default)]
pub struct EventBridge {
    listeners: Mutex<BTreeMap<Generation, Vec<Listener>>>,
}

impl EventBridge {
    /// Registers a listener for the subscription's contract. The listener
    /// owns `feed` and stops it when retired.
    pub fn subscribe(
        &self,
        subscription: Subscription,
        relevance: Relevance,
        forward: Arc<dyn Forward>,
        feed: FeedHandle,
    ) {
        tracing::debug!(
            name = %subscription.name,
            contract = ?subscription.contract,
            generation = %subscription.generation,
            "subscribed"
        );
        let generation = subscription.generation;
        self.listeners
            .lock()
            .unwrap()
            .entry(generation)
            .or_default()
            .push(Listener {
                subscription,
                relevance,
                forward,
                _feed: feed,
            });
    }

    /// Retires every listener of a generation older than `generation` and
    /// returns how many were removed.
    pub fn retire_before(&self, generation: Generation) -> usize {
        let retired = {
            let mut listeners = self.listeners.lock().unwrap();
            let current = listeners.split_off(&generation);
            std::mem::replace(&mut *listeners, current)
        };
        let count = retired.values().map(Vec::len).sum();
        if count > 0 {
            tracing::info!(count, before = %generation, "retired stale listeners");
        }
        count
    }

    pub fn retire_all(&self) -> usize {
        let retired = std::mem::take(&mut *self.listeners.lock().unwrap());
        retired.values().map(Vec::len).sum()
    }

    pub fn live_generations(&self) -> Vec<Generation> {
        self.listeners.lock().unwrap().keys().copied().collect()
    }

    /// Hands the event to the matching listeners of its generation and
    /// returns how many handled it. Never fails.
    pub fn deliver(&self, event: &TransferEvent) -> usize {
        let listeners = self.listeners.lock().unwrap();
        let Some(listeners) = listeners.get(&event.generation) else {
            tracing::debug!(generation = %event.generation, tx = ?event.transaction_hash, "discarding event of a retired generation");
            return 0;
        };
        let mut handled = 0;
        for listener in listeners.iter().filter(|listener| listener.observes(event)) {
            listener.handle(event);
            handled += 1;
        }
        handled
    }

    /// Delivers events until every feed is gone.
    pub async fn dispatch(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransferEvent>) {
        while let Some(event) = events.recv().await {
            self.deliver(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            event::testing::transfer,
            forwarder::{self, Forwarder, MockForward, Webhook},
        },
        contracts::TokenStandard,
        std::time::Duration,
        url::Url,
    };

    const DELEGATEE: &str = "0xBDA5747BFD65F08DEB54CB465EB87D40E51B197E";

    fn delegatee() -> Address {
        DELEGATEE.parse().unwrap()
    }

    fn subscription(generation: Generation, contract: Address) -> Subscription {
        Subscription {
            generation,
            name: "SomeNFT".to_string(),
            contract,
            standard: TokenStandard::Erc721,
        }
    }

    fn idle_feed() -> FeedHandle {
        FeedHandle::new(tokio::spawn(std::future::pending()))
    }

    #[test]
    fn relevance_ignores_address_case() {
        let relevance = Relevance::new(delegatee());
        let lower: Address = DELEGATEE.to_lowercase().parse().unwrap();
        let other = Address::with_last_byte(1);
        let contract = Address::with_last_byte(0xa1);

        assert!(relevance.matches(&transfer(Generation(0), contract, lower, other)));
        assert!(relevance.matches(&transfer(Generation(0), contract, other, lower)));
        assert!(!relevance.matches(&transfer(Generation(0), contract, other, other)));
    }

    #[tokio::test]
    async fn only_relevant_transfers_are_forwarded() {
        let mut forward = MockForward::new();
        forward
            .expect_forward()
            .withf(|payload| payload.envelope().to_address == DELEGATEE.to_lowercase())
            .times(1)
            .return_const(());
        let bridge = EventBridge::default();
        let contract = Address::with_last_byte(0xa1);
        bridge.subscribe(
            subscription(Generation(0), contract),
            Relevance::new(delegatee()),
            Arc::new(forward),
            idle_feed(),
        );

        let other = Address::with_last_byte(1);
        assert_eq!(bridge.deliver(&transfer(Generation(0), contract, other, delegatee())), 1);
        assert_eq!(bridge.deliver(&transfer(Generation(0), contract, other, other)), 1);
    }

    #[tokio::test]
    async fn retired_generations_receive_nothing() {
        let mut forward = MockForward::new();
        forward.expect_forward().times(1).return_const(());
        let forward = Arc::new(forward);
        let bridge = EventBridge::default();
        let old = Address::with_last_byte(0xa1);
        let new = Address::with_last_byte(0xb1);

        bridge.subscribe(
            subscription(Generation(0), old),
            Relevance::new(delegatee()),
            forward.clone(),
            idle_feed(),
        );
        bridge.subscribe(
            subscription(Generation(1), new),
            Relevance::new(delegatee()),
            forward,
            idle_feed(),
        );
        assert_eq!(bridge.retire_before(Generation(1)), 1);
        assert_eq!(bridge.live_generations(), [Generation(1)]);

        let from = Address::with_last_byte(1);
        assert_eq!(bridge.deliver(&transfer(Generation(0), old, from, delegatee())), 0);
        assert_eq!(bridge.deliver(&transfer(Generation(1), new, from, delegatee())), 1);
        // A stale generation tag is discarded even for a live contract.
        assert_eq!(bridge.deliver(&transfer(Generation(0), new, from, delegatee())), 0);
    }

    #[tokio::test]
    async fn unreachable_sink_does_not_hold_up_later_transfers() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let webhook = Webhook::new(
            reqwest::Client::new(),
            Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            "token".to_string(),
        )
        .unwrap();
        let config = forwarder::Config {
            timeout: Duration::from_secs(1),
            retries: 1,
            backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
            ..Default::default()
        };
        let (forwarder, worker) = Forwarder::spawn(Arc::new(webhook), config);
        let forwarder = Arc::new(forwarder);

        let bridge = EventBridge::default();
        let contract = Address::with_last_byte(0xa1);
        bridge.subscribe(
            subscription(Generation(0), contract),
            Relevance::new(delegatee()),
            forwarder.clone(),
            idle_feed(),
        );

        let from = Address::with_last_byte(1);
        assert_eq!(bridge.deliver(&transfer(Generation(0), contract, from, delegatee())), 1);
        assert_eq!(bridge.deliver(&transfer(Generation(0), contract, delegatee(), from)), 1);

        forwarder.close();
        worker.await.unwrap();
        assert_eq!(forwarder.dead_letters().snapshot().len(), 2);
    }

    #[tokio::test]
    async fn retiring_stops_the_feed() {
        let bridge = EventBridge::default();
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        bridge.subscribe(
            subscription(Generation(0), Address::with_last_byte(0xa1)),
            Relevance::new(delegatee()),
            Arc::new(MockForward::new()),
            FeedHandle::new(task),
        );

        assert_eq!(bridge.retire_all(), 1);
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }
}
