//! Delivery of normalized transfer payloads to the webhook sink.
//!
//! The bridge hands payloads to a bounded queue and never waits on the sink.
//! A worker task drains the queue, retrying failed posts with exponential
//! backoff. Payloads that cannot be delivered end up in a dead-letter ring.

use {
    crate::payload::Payload,
    anyhow::{Context, Result},
    contracts::TokenStandard,
    reqwest::{Client, header::AUTHORIZATION},
    std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::{
        sync::mpsc::{self, error::TrySendError},
        task::JoinHandle,
    },
    url::Url,
};

/// Receiver of normalized payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn post(&self, route: &str, payload: &Payload) -> Result<()>;
}

/// Hands a payload over for delivery. Must not block and must not fail.
#[cfg_attr(test, mockall::automock)]
pub trait Forward: Send + Sync {
    fn forward(&self, payload: Payload);
}

/// HTTP sink posting JSON bodies to `<base>/<route>`.
pub struct Webhook {
    client: Client,
    base: Url,
    token: String,
}

impl Webhook {
    pub fn new(client: Client, mut base: Url, token: String) -> Result<Self> {
        anyhow::ensure!(!base.cannot_be_a_base(), "{base} cannot be used as a base url");
        // Without a trailing slash `join` would replace the last path segment.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self {
            client,
            base,
            token,
        })
    }
}

#[async_trait::async_trait]
impl Sink for Webhook {
    async fn post(&self, route: &str, payload: &Payload) -> Result<()> {
        let url = self.base.join(route).context("invalid route")?;
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, &self.token)
            .json(payload)
            .send()
            .await
            .context("send")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook responded {status}: {body}");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    pub nft: String,
    pub token: String,
}

impl Routes {
    fn for_standard(&self, standard: TokenStandard) -> &str {
        match standard {
            TokenStandard::Erc721 => &self.nft,
            TokenStandard::Erc20 => &self.token,
        }
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            nft: "delegatee-nfttxn-mock".to_string(),
            token: "delegatee-tokentxn-mock".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub routes: Routes,
    pub queue_capacity: usize,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub dead_letter_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routes: Routes::default(),
            queue_capacity: 1024,
            timeout: Duration::from_secs(5),
            retries: 3,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            dead_letter_capacity: 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeadLetter {
    pub payload: Payload,
    pub reason: String,
}

/// Most recent undeliverable payloads, oldest first.
#[derive(Clone, Debug)]
pub struct DeadLetters {
    inner: Arc<Mutex<VecDeque<DeadLetter>>>,
    capacity: usize,
}

impl DeadLetters {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn push(&self, payload: Payload, reason: String) {
        tracing::error!(?payload, %reason, "dropping undeliverable payload");
        if self.capacity == 0 {
            return;
        }
        let mut letters = self.inner.lock().unwrap();
        if letters.len() == self.capacity {
            letters.pop_front();
        }
        letters.push_back(DeadLetter { payload, reason });
    }

    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.inner.lock().unwrap().iter().cloned().collect()
    }
}

pub struct Forwarder {
    sender: Mutex<Option<mpsc::Sender<Payload>>>,
    dead_letters: DeadLetters,
}

impl Forwarder {
    /// Starts the delivery worker. The worker exits once the forwarder is
    /// closed and the queue is drained.
    pub fn spawn(sink: Arc<dyn Sink>, config: Config) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let dead_letters = DeadLetters::new(config.dead_letter_capacity);
        let worker = Worker {
            sink,
            config,
            dead_letters: dead_letters.clone(),
        };
        let handle = tokio::spawn(worker.run(receiver));
        let forwarder = Self {
            sender: Mutex::new(Some(sender)),
            dead_letters,
        };
        (forwarder, handle)
    }

    /// Stops accepting payloads. Already queued payloads are still delivered.
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    pub fn dead_letters(&self) -> &DeadLetters {
        &self.dead_letters
    }
}

impl Forward for Forwarder {
    fn forward(&self, payload: Payload) {
        let sender = self.sender.lock().unwrap();
        let Some(sender) = sender.as_ref() else {
            self.dead_letters
                .push(payload, "forwarder is closed".to_string());
            return;
        };
        match sender.try_send(payload) {
            Ok(()) => (),
            Err(TrySendError::Full(payload)) => {
                self.dead_letters
                    .push(payload, "delivery queue is full".to_string());
            }
            Err(TrySendError::Closed(payload)) => {
                self.dead_letters
                    .push(payload, "delivery worker stopped".to_string());
            }
        }
    }
}

struct Worker {
    sink: Arc<dyn Sink>,
    config: Config,
    dead_letters: DeadLetters,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<Payload>) {
        while let Some(payload) = receiver.recv().await {
            self.deliver(payload).await;
        }
        tracing::debug!("delivery queue closed");
    }

    async fn deliver(&self, payload: Payload) {
        let route = self.config.routes.for_standard(payload.standard());
        let mut backoff = self.config.backoff;
        let mut reason = String::new();
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.max_backoff);
            }
            match tokio::time::timeout(self.config.timeout, self.sink.post(route, &payload)).await {
                Ok(Ok(())) => {
                    tracing::debug!(route, attempt, tx = ?payload.envelope().transaction_hash, "delivered payload");
                    return;
                }
                Ok(Err(err)) => {
                    tracing::warn!(route, attempt, ?err, "webhook delivery failed");
                    reason = format!("{err:#}");
                }
                Err(_) => {
                    tracing::warn!(route, attempt, "webhook delivery timed out");
                    reason = "timed out".to_string();
                }
            }
        }
        self.dead_letters.push(payload, reason);
    }
}
