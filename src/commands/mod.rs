//! Chat command handlers. Each handler answers into the chat the command
//! came from; every reply goes through the delivery engine with the reply
//! retry budget and failures are only logged.

mod assist;
mod groups;
mod info;
mod market;


use crate::gateway::Gateway;
use tokio::task::JoinHandle;
use tracing::warn;
use wabot_core::{
    command::{Classified, Command},
    message::InboundMessage,
    target::Target,
};

/// Grouped context for command execution.
pub struct CommandContext<'a> {
    pub gateway: &'a Gateway,
    /// Where replies go.
    pub chat: Target,
    /// Raw chat id, used to key conversation memory.
    pub chat_id: &'a str,
    pub sender_name: Option<&'a str>,
    pub argument: &'a str,
}

impl CommandContext<'_> {
    /// Best-effort reply into the originating chat.
    pub async fn reply(&self, text: &str) {
        let attempts = self.gateway.config.delivery.reply_attempts;
        if let Err(e) = self
            .gateway
            .delivery
            .deliver_with_retry(&self.chat, text, attempts)
            .await
        {
            warn!(chat = %self.chat_id, "reply dropped: {e}");
        }
    }

    /// Send an acknowledgment on its own task. Await the handle before the
    /// final answer so the acknowledgment is always attempted first.
    pub fn spawn_ack(&self, text: &str) -> JoinHandle<()> {
        let delivery = self.gateway.delivery.clone();
        let chat = self.chat.clone();
        let text = text.to_string();
        let attempts = self.gateway.config.delivery.reply_attempts;
        tokio::spawn(async move {
            if let Err(e) = delivery.deliver_with_retry(&chat, &text, attempts).await {
                warn!(chat = %chat, "acknowledgment dropped: {e}");
            }
        })
    }
}

/// Wait for a spawned acknowledgment. A panicked ack task is logged, never
/// propagated.
pub(crate) async fn settle(ack: JoinHandle<()>) {
    if let Err(e) = ack.await {
        warn!("acknowledgment task failed: {e}");
    }
}

/// Run the handler for one classified message.
pub async fn handle(gateway: &Gateway, msg: &InboundMessage, classified: Classified) {
    let ctx = CommandContext {
        gateway,
        chat: Target::from_chat_id(&msg.chat_id),
        chat_id: &msg.chat_id,
        sender_name: msg.sender_name.as_deref(),
        argument: &classified.argument,
    };

    match classified.command {
        Command::Help => info::help(&ctx).await,
        Command::Greet => info::greet(&ctx).await,
        Command::Ping => info::ping(&ctx).await,
        Command::Status => info::status(&ctx).await,
        Command::Info => info::info(&ctx).await,
        Command::Test => info::test(&ctx).await,
        Command::Echo => info::echo(&ctx).await,
        Command::Groups => groups::groups(&ctx).await,
        Command::Ask { persona } => assist::ask(&ctx, &persona).await,
        Command::GenerateImage => assist::image(&ctx).await,
        Command::MarketData => market::idx(&ctx).await,
        Command::Unrecognized => {}
    }
}
