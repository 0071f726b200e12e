//! Recording stubs shared by the gateway, command and API tests.

use crate::gateway::Gateway;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wabot_core::{
    config::Config,
    context::Context,
    error::{GenerationError, WabotError},
    market::MarketSnapshot,
    message::{GroupInfo, InboundMessage, MessageContent},
    target::Target,
    traits::{GeneratedImage, Generator, MarketData, Transport},
};
use wabot_memory::MemoryStore;

pub const TEST_SECRET: &str = "test-secret";

/// Transport that records every send instead of talking to the network.
pub struct StubTransport {
    pub sent: Mutex<Vec<(String, String)>>,
    pub images: Mutex<Vec<(String, String)>>,
    /// Identifiers whose sends always fail.
    pub failing: Mutex<HashSet<String>>,
    pub groups: Mutex<Vec<GroupInfo>>,
    pub connected: AtomicBool,
    pub fail_images: AtomicBool,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            groups: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_images: AtomicBool::new(false),
        })
    }

    pub fn fail_for(&self, identifier: &str) {
        self.failing.lock().unwrap().insert(identifier.to_string());
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_groups(&self, groups: Vec<GroupInfo>) {
        *self.groups.lock().unwrap() = groups;
    }

    /// Texts sent so far, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _)| to.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn name(&self) -> &str {
        "stub"
    }

    async fn connect(&self) -> Result<mpsc::Receiver<InboundMessage>, WabotError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, target: &Target, text: &str) -> Result<String, WabotError> {
        if self.failing.lock().unwrap().contains(&target.identifier) {
            return Err(WabotError::Transport("stub send failure".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((target.identifier.clone(), text.to_string()));
        Ok(format!("msg-{}", sent.len()))
    }

    async fn send_image(
        &self,
        target: &Target,
        _image: &[u8],
        _mimetype: &str,
        caption: &str,
    ) -> Result<String, WabotError> {
        if self.fail_images.load(Ordering::SeqCst) {
            return Err(WabotError::Transport("stub upload failure".into()));
        }
        self.images
            .lock()
            .unwrap()
            .push((target.identifier.clone(), caption.to_string()));
        Ok("img-1".into())
    }

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, WabotError> {
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn disconnect(&self) -> Result<(), WabotError> {
        self.set_connected(false);
        Ok(())
    }
}

/// Generator with scripted results that records every context it sees.
pub struct StubGenerator {
    pub answer: Mutex<Result<String, GenerationError>>,
    pub image: Mutex<Result<GeneratedImage, GenerationError>>,
    pub contexts: Mutex<Vec<Context>>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(answer.to_string())),
            image: Mutex::new(Ok(GeneratedImage {
                bytes: vec![0x89, b'P', b'N', b'G'],
                mimetype: "image/png".into(),
            })),
            contexts: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: GenerationError) -> Arc<Self> {
        let stub = Self::answering("");
        *stub.answer.lock().unwrap() = Err(err.clone());
        *stub.image.lock().unwrap() = Err(err);
        stub
    }
}

#[async_trait]
impl Generator for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, context: &Context) -> Result<String, GenerationError> {
        self.contexts.lock().unwrap().push(context.clone());
        self.answer.lock().unwrap().clone()
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.image.lock().unwrap().clone()
    }
}

/// Market source returning a fixed snapshot, or an error when `None`.
pub struct StubMarket(pub Option<MarketSnapshot>);

impl StubMarket {
    pub fn sample() -> Arc<Self> {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap_or_default();
        let mut snapshot = MarketSnapshot::empty(date);
        snapshot.uma = vec!["BBCA".into()];
        snapshot.suspensions = vec!["GOTO".into()];
        Arc::new(Self(Some(snapshot)))
    }
}

#[async_trait]
impl MarketData for StubMarket {
    async fn snapshot(&self) -> Result<MarketSnapshot, WabotError> {
        self.0
            .clone()
            .ok_or_else(|| WabotError::MarketData("stub source down".into()))
    }
}

/// Defaults with instant retries, no pacing and a known API secret.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.api.secret = TEST_SECRET.into();
    config.delivery.backoff_ms = 0;
    config.delivery.bulk_pacing_ms = 0;
    config.delivery.webhook_pacing_ms = 0;
    config
}

/// A gateway over the given stubs with its memory in a temp dir.
pub async fn test_gateway_with(
    config: Config,
    transport: Arc<StubTransport>,
    generator: Arc<StubGenerator>,
    market: Arc<StubMarket>,
) -> (Arc<Gateway>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let memory = MemoryStore::open_at(dir.path().join("memory.json"), config.memory.cap)
        .await
        .unwrap();
    let gateway = Gateway::new(config, transport, Arc::new(memory), generator, market);
    (Arc::new(gateway), dir)
}

pub async fn test_gateway(
    transport: Arc<StubTransport>,
    generator: Arc<StubGenerator>,
) -> (Arc<Gateway>, tempfile::TempDir) {
    test_gateway_with(test_config(), transport, generator, StubMarket::sample()).await
}

/// An inbound text message from a private chat.
pub fn inbound(chat_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        id: "in-1".into(),
        chat_id: chat_id.into(),
        sender_id: chat_id.split('@').next().unwrap_or(chat_id).into(),
        sender_name: Some("Rina".into()),
        is_group: chat_id.ends_with("@g.us"),
        timestamp: Utc::now(),
        contents: vec![MessageContent::Text(text.into())],
    }
}
