//! `idx`: today's stock-exchange bulletin.

use super::{settle, CommandContext};
use tracing::warn;

pub(super) async fn idx(ctx: &CommandContext<'_>) {
    if !ctx.gateway.config.market.enabled {
        ctx.reply("📊 Market data is disabled on this bot.").await;
        return;
    }

    let ack = ctx.spawn_ack("📊 Fetching IDX market data...");
    let result = ctx.gateway.market.snapshot().await;
    settle(ack).await;

    match result {
        Ok(snapshot) => ctx.reply(&snapshot.render()).await,
        Err(e) => {
            warn!(chat = %ctx.chat_id, "market snapshot failed: {e}");
            ctx.reply("❌ Could not fetch IDX market data. Please try again later.")
                .await;
        }
    }
}
