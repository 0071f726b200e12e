//! Generator-backed commands: persona questions and image generation.
//!
//! Both acknowledge first, then call the generator; the final answer is a
//! second message.

use super::{settle, CommandContext};
use tracing::{info, warn};
use wabot_channels::markup::to_whatsapp_markup;
use wabot_core::{
    context::{Context, ContextEntry},
    error::GenerationError,
};
use wabot_memory::ConversationKey;

fn apology(persona: &str, err: &GenerationError) -> String {
    match err {
        GenerationError::NotConfigured => {
            format!("❌ {persona} is not available: the AI service is not configured.")
        }
        GenerationError::RateLimited => format!(
            "⏳ {persona} has reached the AI usage quota. Please try again in a few minutes."
        ),
        GenerationError::Failed(_) => {
            format!("❌ Sorry, {persona} could not answer right now. Please try again later.")
        }
    }
}

fn keyword_for<'a>(ctx: &'a CommandContext<'_>, persona: &str) -> &'a str {
    ctx.gateway
        .config
        .personas
        .iter()
        .find(|p| p.name == persona)
        .map_or("ask", |p| p.keyword.as_str())
}

pub(super) async fn ask(ctx: &CommandContext<'_>, persona: &str) {
    let question = ctx.argument;
    if question.is_empty() {
        let keyword = keyword_for(ctx, persona);
        ctx.reply(&format!(
            "🤖 Usage: !{keyword} <question>\n\nExample: !{keyword} what is the capital of Japan?"
        ))
        .await;
        return;
    }

    let ack = ctx.spawn_ack(&format!("🤔 {persona} is thinking..."));

    let gw = ctx.gateway;
    let key = ConversationKey::new(ctx.chat_id, persona);
    let history: Vec<ContextEntry> = gw
        .memory
        .history(&key, gw.config.memory.history_turns)
        .await
        .into_iter()
        .map(ContextEntry::from)
        .collect();
    let context = Context::for_persona(persona, question).with_history(history);

    let result = gw.generator.generate(&context).await;
    settle(ack).await;

    match result {
        Ok(answer) => {
            if let Err(e) = gw.memory.append_exchange(&key, question, &answer).await {
                warn!(chat = %ctx.chat_id, "conversation memory not saved: {e}");
            }
            let answer = to_whatsapp_markup(&answer);
            ctx.reply(&format!("🤖 *{persona}:*\n\n{answer}")).await;
        }
        Err(e) => {
            warn!(chat = %ctx.chat_id, persona, "generation failed: {e}");
            ctx.reply(&apology(persona, &e)).await;
        }
    }
}

pub(super) async fn image(ctx: &CommandContext<'_>) {
    let prompt = ctx.argument;
    if prompt.is_empty() {
        ctx.reply("🎨 Usage: !img <description>\n\nExample: !img a red bicycle on a beach at sunset")
            .await;
        return;
    }

    let ack = ctx.spawn_ack("🎨 Generating your image, please wait...");
    let result = ctx.gateway.generator.generate_image(prompt).await;
    settle(ack).await;

    match result {
        Ok(image) => {
            match ctx
                .gateway
                .delivery
                .send_media(&ctx.chat, &image.bytes, &image.mimetype, prompt)
                .await
            {
                Ok(outcome) => info!(chat = %ctx.chat_id, ?outcome, "image delivered"),
                Err(e) => warn!(chat = %ctx.chat_id, "image delivery failed: {e}"),
            }
        }
        Err(GenerationError::RateLimited) => {
            ctx.reply("⏳ The image generation quota is used up. Please try again later.")
                .await;
        }
        Err(e) => {
            warn!(chat = %ctx.chat_id, "image generation failed: {e}");
            let text = match e {
                GenerationError::NotConfigured => {
                    "❌ Image generation is not configured.".to_string()
                }
                _ => "❌ Sorry, the image could not be generated. Please try another description."
                    .to_string(),
            };
            ctx.reply(&text).await;
        }
    }
}
