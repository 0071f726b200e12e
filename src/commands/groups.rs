//! `groups [search]`: list the groups the account participates in.

use super::CommandContext;
use std::fmt::Write;
use tracing::warn;
use wabot_core::message::GroupInfo;

/// Groups shown when no search term is given.
const MAX_LISTED: usize = 20;

pub(super) async fn groups(ctx: &CommandContext<'_>) {
    let transport = &ctx.gateway.transport;
    if !transport.is_connected() {
        ctx.reply("❌ WhatsApp is not connected right now.").await;
        return;
    }

    match transport.joined_groups().await {
        Ok(groups) => ctx.reply(&render_groups(&groups, ctx.argument)).await,
        Err(e) => {
            warn!("listing groups failed: {e}");
            ctx.reply("❌ Could not fetch the group list.").await;
        }
    }
}

/// Format the group list. With a query, every group whose name contains it
/// (case-insensitively) is listed; without one, the first [`MAX_LISTED`].
pub(crate) fn render_groups(groups: &[GroupInfo], query: &str) -> String {
    let query = query.trim().to_lowercase();
    let matching: Vec<&GroupInfo> = groups
        .iter()
        .filter(|g| query.is_empty() || g.name.to_lowercase().contains(&query))
        .collect();

    if matching.is_empty() {
        return if query.is_empty() {
            "📭 Not a member of any group.".to_string()
        } else {
            format!("🔍 No groups matching \"{query}\".")
        };
    }

    let shown: &[&GroupInfo] = if query.is_empty() {
        &matching[..matching.len().min(MAX_LISTED)]
    } else {
        &matching
    };

    let mut out = if query.is_empty() {
        format!("👥 *Groups ({})*\n\n", matching.len())
    } else {
        format!("🔍 *Groups matching \"{query}\" ({})*\n\n", matching.len())
    };
    for (i, group) in shown.iter().enumerate() {
        let name = match group.name.trim() {
            "" => "(unnamed)",
            name => name,
        };
        let _ = writeln!(out, "{}. {name}\n   {}", i + 1, group.id);
    }
    if shown.len() < matching.len() {
        let _ = write!(
            out,
            "\n_... and {} more. Use !groups <search> to narrow down._",
            matching.len() - shown.len()
        );
    }
    out.trim_end().to_string()
}
