//! Gateway: the inbound dispatch loop and the services shared with the HTTP API.
//!
//! Every inbound message is classified in arrival order; its handler runs in
//! its own task so a slow generation call never holds up the next message.


use crate::{api, commands};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wabot_channels::DeliveryEngine;
use wabot_core::{
    command::{Classifier, Command},
    config::Config,
    message::InboundMessage,
    target::TargetResolver,
    traits::{Generator, MarketData, Transport},
};
use wabot_memory::MemoryStore;

/// Long-lived services, built once at startup and shared by every flow.
pub struct Gateway {
    pub(crate) config: Config,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) delivery: DeliveryEngine,
    pub(crate) memory: Arc<MemoryStore>,
    pub(crate) generator: Arc<dyn Generator>,
    pub(crate) market: Arc<dyn MarketData>,
    pub(crate) resolver: TargetResolver,
    pub(crate) classifier: Classifier,
    pub(crate) uptime: Instant,
}

impl Gateway {
    /// Wire the services together.
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        memory: Arc<MemoryStore>,
        generator: Arc<dyn Generator>,
        market: Arc<dyn MarketData>,
    ) -> Self {
        let delivery = DeliveryEngine::new(Arc::clone(&transport), &config.delivery);
        let resolver = TargetResolver::new(&config.bot.country_code);
        let classifier = Classifier::new(&config.bot.prefixes, &config.persona_keywords());
        Self {
            config,
            transport,
            delivery,
            memory,
            generator,
            market,
            resolver,
            classifier,
            uptime: Instant::now(),
        }
    }

    pub(crate) fn bulk_pacing(&self) -> Duration {
        Duration::from_millis(self.config.delivery.bulk_pacing_ms)
    }

    pub(crate) fn webhook_pacing(&self) -> Duration {
        Duration::from_millis(self.config.delivery.webhook_pacing_ms)
    }

    /// Connect the transport, start the HTTP API and dispatch inbound
    /// messages until Ctrl-C or the inbound stream ends.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "{} gateway starting | transport: {} | generator: {} | personas: {}",
            self.config.bot.name,
            self.transport.name(),
            self.generator.name(),
            self.config.personas.len(),
        );
        if self.config.api.secret.is_empty() {
            warn!("no API secret configured: authenticated endpoints will answer 401");
        }

        let mut rx = self
            .transport
            .connect()
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect {}: {e}", self.transport.name()))?;

        if self.config.api.enabled {
            let gw = Arc::clone(&self);
            tokio::spawn(async move { api::serve(gw).await });
        }

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                incoming = rx.recv() => match incoming {
                    Some(msg) => {
                        self.dispatch(msg);
                    }
                    None => {
                        warn!("inbound stream closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&self) {
        if let Err(e) = self.transport.disconnect().await {
            warn!("transport disconnect failed: {e}");
        }
        if let Err(e) = self.memory.persist().await {
            error!("final memory flush failed: {e}");
        }
        info!("gateway stopped");
    }

    /// Classify one inbound message and spawn its handler. Muted chats,
    /// empty texts and unrecognized commands are dropped without a reply.
    pub(crate) fn dispatch(self: &Arc<Self>, msg: InboundMessage) -> Option<JoinHandle<()>> {
        if self.config.is_muted(&msg.chat_id) {
            debug!(chat = %msg.chat_id, "muted chat, ignoring");
            return None;
        }

        let text = msg.text();
        if text.trim().is_empty() {
            return None;
        }

        let classified = self.classifier.classify(&text);
        if classified.command == Command::Unrecognized {
            return None;
        }

        info!(
            chat = %msg.chat_id,
            sender = %msg.sender_id,
            command = ?classified.command,
            "command received"
        );

        let gw = Arc::clone(self);
        Some(tokio::spawn(async move {
            commands::handle(&gw, &msg, classified).await;
        }))
    }
}
