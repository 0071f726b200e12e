//! Instant-reply commands: help, hallo, ping, status, info, test, echo.

use super::CommandContext;
use chrono::Local;
use std::fmt::Write;

pub(super) async fn help(ctx: &CommandContext<'_>) {
    ctx.reply(&help_text(ctx)).await;
}

fn help_text(ctx: &CommandContext<'_>) -> String {
    let mut personas = String::new();
    for persona in &ctx.gateway.config.personas {
        let _ = writeln!(
            personas,
            "• !{} <question> - ask {}",
            persona.keyword, persona.name
        );
    }

    format!(
        "🤖 *{} Commands*\n\n\
         • !help - show this list\n\
         • !hallo - say hello\n\
         • !ping - check the bot is alive\n\
         • !status - connection and uptime\n\
         • !info - bot information\n\
         • !test - test reply\n\
         • !echo <text> - repeat your text\n\
         • !groups [search] - list joined groups\n\
         {personas}\
         • !img <description> - generate an image\n\
         • !idx - today's IDX market data\n\n\
         _Commands also work with / and in any letter case._",
        ctx.gateway.config.bot.name
    )
}

pub(super) async fn greet(ctx: &CommandContext<'_>) {
    let name = ctx
        .sender_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("friend");
    ctx.reply(&format!(
        "👋 Hello {name}!\n\nI'm {}. Type !help to see what I can do.",
        ctx.gateway.config.bot.name
    ))
    .await;
}

pub(super) async fn ping(ctx: &CommandContext<'_>) {
    ctx.reply("🏓 Pong!").await;
}

pub(super) async fn status(ctx: &CommandContext<'_>) {
    let gw = ctx.gateway;
    let elapsed = gw.uptime.elapsed();
    let hours = elapsed.as_secs() / 3600;
    let minutes = (elapsed.as_secs() % 3600) / 60;
    let secs = elapsed.as_secs() % 60;

    let connection = if gw.transport.is_connected() {
        "✅ Connected"
    } else {
        "❌ Disconnected"
    };
    let stats = gw.memory.stats().await;

    ctx.reply(&format!(
        "📊 *Bot Status*\n\n\
         🔌 Connection: {connection}\n\
         ⏱️ Uptime: {hours}h {minutes}m {secs}s\n\
         🧠 Memory: {} conversations, {} messages\n\
         🎭 Personas: {}\n\
         🕐 Time: {}",
        stats.keys,
        stats.entries,
        gw.config.personas.len(),
        Local::now().format("%Y-%m-%d %H:%M:%S"),
    ))
    .await;
}

pub(super) async fn info(ctx: &CommandContext<'_>) {
    ctx.reply(&format!(
        "ℹ️ *Bot Information*\n\n\
         🤖 Name: {}\n\
         📦 Version: {}\n\
         📱 Platform: WhatsApp\n\
         🧠 Assistant: {}",
        ctx.gateway.config.bot.name,
        env!("CARGO_PKG_VERSION"),
        ctx.gateway.generator.name(),
    ))
    .await;
}

pub(super) async fn test(ctx: &CommandContext<'_>) {
    ctx.reply("✅ Test successful! The bot is working.").await;
}

pub(super) async fn echo(ctx: &CommandContext<'_>) {
    if ctx.argument.is_empty() {
        ctx.reply("🔊 Usage: !echo <text>").await;
        return;
    }
    ctx.reply(&format!("🔊 *Echo Response:*\n\n{}", ctx.argument))
        .await;
}
