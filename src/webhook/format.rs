//! Chat text for GitHub events. Pure functions of `(event, payload)`.

use super::payload::{Commit, WebhookPayload};
use std::fmt::Write;

/// Commits listed individually in a push summary.
const MAX_COMMITS_SHOWN: usize = 3;

/// Longest commit message shown before truncation.
const MAX_COMMIT_MESSAGE: usize = 80;

/// Render one event. Unknown event types get a generic summary.
pub fn format_event(event: &str, payload: &WebhookPayload) -> String {
    match event {
        "push" => format_push(payload),
        "issues" => format_issue(payload),
        "pull_request" => format_pull_request(payload),
        "release" => format_release(payload),
        _ => format!(
            "📢 *GitHub Event: {}*\n📁 *Repository:* {}\n👤 *User:* {}\n🔗 *Link:* {}",
            title_case(event),
            payload.repository_name(),
            payload.sender_login(),
            payload.repository_url(),
        ),
    }
}

fn format_push(payload: &WebhookPayload) -> String {
    let mut out = format!(
        "🔄 *Push Event*\n📁 *Repository:* {}\n👤 *Pusher:* {}\n🌿 *Branch:* {}\n",
        payload.repository_name(),
        payload.pusher_name(),
        payload.branch(),
    );

    if payload.commits.is_empty() {
        out.push_str("\n_No commits in this push_");
        return out;
    }

    let total = payload.commits.len();
    let _ = writeln!(out, "📝 *Commits:* {total}\n");
    for commit in payload.commits.iter().take(MAX_COMMITS_SHOWN) {
        let _ = writeln!(
            out,
            "🔹 `{}` {}{}",
            short_id(&commit.id),
            truncate_message(&commit.message),
            file_changes(commit),
        );
    }
    if total > MAX_COMMITS_SHOWN {
        let _ = writeln!(out, "_... and {} more commits_", total - MAX_COMMITS_SHOWN);
    }
    let _ = write!(out, "\n🔗 *View Repository:* {}", payload.repository_url());
    out
}

fn format_issue(payload: &WebhookPayload) -> String {
    let action = payload.action();
    let emoji = match action {
        "opened" => "🆕",
        "closed" => "✅",
        "reopened" => "🔄",
        _ => "🐛",
    };
    let issue = payload.issue.as_ref();
    format!(
        "{emoji} *Issue {}*\n📁 *Repository:* {}\n👤 *User:* {}\n📋 *Issue #{}:* {}\n🔗 *Link:* {}",
        title_case(action),
        payload.repository_name(),
        payload.sender_login(),
        issue.map_or(0, |i| i.number),
        issue.map_or("", |i| i.title.as_str()),
        issue.map_or("", |i| i.html_url.as_str()),
    )
}

fn format_pull_request(payload: &WebhookPayload) -> String {
    let pr = payload.pull_request.as_ref();
    let merged = pr.is_some_and(|p| p.merged);
    let (emoji, action) = match payload.action() {
        "opened" => ("🆕", "opened"),
        "closed" if merged => ("✅", "merged"),
        "closed" => ("❌", "closed"),
        "reopened" => ("🔄", "reopened"),
        other => ("🔀", other),
    };
    format!(
        "{emoji} *Pull Request {}*\n📁 *Repository:* {}\n👤 *User:* {}\n📋 *PR #{}:* {}\n🔗 *Link:* {}",
        title_case(action),
        payload.repository_name(),
        payload.sender_login(),
        pr.map_or(0, |p| p.number),
        pr.map_or("", |p| p.title.as_str()),
        pr.map_or("", |p| p.html_url.as_str()),
    )
}

fn format_release(payload: &WebhookPayload) -> String {
    let release = payload.release.as_ref();
    let mut out = format!(
        "🚀 *Release {}*\n📁 *Repository:* {}\n👤 *User:* {}\n",
        title_case(payload.action()),
        payload.repository_name(),
        payload.sender_login(),
    );
    if let Some(tag) = release.map(|r| r.tag_name.as_str()).filter(|t| !t.is_empty()) {
        let _ = writeln!(out, "🏷️ *Tag:* {tag}");
    }
    let link = release
        .map(|r| r.html_url.as_str())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| payload.repository_url());
    let _ = write!(out, "🔗 *Link:* {link}");
    out
}

fn short_id(id: &str) -> &str {
    id.char_indices().nth(7).map_or(id, |(end, _)| &id[..end])
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_COMMIT_MESSAGE {
        return message.to_string();
    }
    let kept: String = message.chars().take(MAX_COMMIT_MESSAGE - 3).collect();
    format!("{kept}...")
}

/// ` (➕ 2 added, 📝 1 modified, ➖ 1 removed)`, or empty when nothing changed.
fn file_changes(commit: &Commit) -> String {
    let mut parts = Vec::new();
    if !commit.added.is_empty() {
        parts.push(format!("➕ {} added", commit.added.len()));
    }
    if !commit.modified.is_empty() {
        parts.push(format!("📝 {} modified", commit.modified.len()));
    }
    if !commit.removed.is_empty() {
        parts.push(format!("➖ {} removed", commit.removed.len()));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

/// `pull_request` → `Pull Request`, `opened` → `Opened`.
fn title_case(word: &str) -> String {
    word.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> WebhookPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_push_without_commits() {
        let payload = parse(
            r#"{"ref":"refs/heads/main","repository":{"full_name":"acme/api","html_url":"https://github.com/acme/api"},
                "pusher":{"name":"rina"},"commits":[]}"#,
        );
        assert_eq!(
            format_event("push", &payload),
            "🔄 *Push Event*\n📁 *Repository:* acme/api\n👤 *Pusher:* rina\n🌿 *Branch:* main\n\n_No commits in this push_"
        );
    }

    #[test]
    fn test_push_lists_three_commits() {
        let long = "x".repeat(100);
        let payload = parse(&format!(
            r#"{{"ref":"refs/heads/dev","repository":{{"full_name":"acme/api","html_url":"https://github.com/acme/api"}},
                "sender":{{"login":"bot"}},
                "commits":[
                  {{"id":"0123456789abcdef","message":"fix parser","added":["a.rs","b.rs"],"modified":["c.rs"],"removed":[]}},
                  {{"id":"abcdef0123456789","message":"{long}"}},
                  {{"id":"1111111222222","message":"third"}},
                  {{"id":"3333333444444","message":"fourth"}},
                  {{"id":"5555555666666","message":"fifth"}}
                ]}}"#
        ));
        let text = format_event("push", &payload);
        assert!(text.contains("👤 *Pusher:* bot"));
        assert!(text.contains("🌿 *Branch:* dev"));
        assert!(text.contains("📝 *Commits:* 5\n\n"));
        assert!(text.contains("🔹 `0123456` fix parser (➕ 2 added, 📝 1 modified)\n"));
        assert!(text.contains(&format!("🔹 `abcdef0` {}...\n", "x".repeat(77))));
        assert!(text.contains("🔹 `1111111` third\n"));
        assert!(!text.contains("fourth"));
        assert!(text.contains("_... and 2 more commits_"));
        assert!(text.ends_with("\n🔗 *View Repository:* https://github.com/acme/api"));
    }

    #[test]
    fn test_pusher_name_fallbacks() {
        let payload = parse(r#"{"pusher":{"login":"octo"},"sender":{"login":"other"}}"#);
        assert_eq!(payload.pusher_name(), "octo");
        let payload = parse(r#"{"sender":{"login":"other"}}"#);
        assert_eq!(payload.pusher_name(), "other");
        assert_eq!(parse("{}").pusher_name(), "Unknown");
    }

    #[test]
    fn test_issue_events() {
        let payload = parse(
            r#"{"action":"opened","repository":{"full_name":"acme/api"},"sender":{"login":"rina"},
                "issue":{"number":42,"title":"Crash on start","html_url":"https://github.com/acme/api/issues/42"}}"#,
        );
        assert_eq!(
            format_event("issues", &payload),
            "🆕 *Issue Opened*\n📁 *Repository:* acme/api\n👤 *User:* rina\n📋 *Issue #42:* Crash on start\n🔗 *Link:* https://github.com/acme/api/issues/42"
        );

        let labeled = parse(r#"{"action":"labeled","issue":{"number":1}}"#);
        assert!(format_event("issues", &labeled).starts_with("🐛 *Issue Labeled*"));
    }

    #[test]
    fn test_pull_request_merged_and_closed() {
        let merged = parse(r#"{"action":"closed","pull_request":{"number":7,"title":"Add cache","merged":true}}"#);
        assert!(format_event("pull_request", &merged).starts_with("✅ *Pull Request Merged*"));

        let closed = parse(r#"{"action":"closed","pull_request":{"number":7,"merged":false}}"#);
        let text = format_event("pull_request", &closed);
        assert!(text.starts_with("❌ *Pull Request Closed*"));
        assert!(text.contains("📋 *PR #7:*"));

        let sync = parse(r#"{"action":"synchronize","pull_request":{"number":7}}"#);
        assert!(format_event("pull_request", &sync).starts_with("🔀 *Pull Request Synchronize*"));
    }

    #[test]
    fn test_release_event() {
        let payload = parse(
            r#"{"action":"published","repository":{"full_name":"acme/api","html_url":"https://github.com/acme/api"},
                "sender":{"login":"rina"},"release":{"tag_name":"v1.2.0","html_url":"https://github.com/acme/api/releases/v1.2.0"}}"#,
        );
        let text = format_event("release", &payload);
        assert!(text.starts_with("🚀 *Release Published*"));
        assert!(text.contains("🏷️ *Tag:* v1.2.0"));
        assert!(text.ends_with("🔗 *Link:* https://github.com/acme/api/releases/v1.2.0"));
    }

    #[test]
    fn test_unknown_event_is_generic() {
        let payload = parse(r#"{"repository":{"name":"api","html_url":"https://x"},"sender":{"login":"rina"}}"#);
        assert_eq!(
            format_event("workflow_run", &payload),
            "📢 *GitHub Event: Workflow Run*\n📁 *Repository:* api\n👤 *User:* rina\n🔗 *Link:* https://x"
        );
    }

    #[test]
    fn test_helpers_are_char_safe() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(truncate_message(&"é".repeat(81)).chars().count(), 80);
        assert_eq!(title_case("pull_request"), "Pull Request");
        assert_eq!(title_case(""), "");
    }
}
