//! The parts of GitHub webhook payloads the relay reads. Every field is
//! optional on the wire; absent values deserialize to their defaults.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub action: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub repository: Option<Repository>,
    pub sender: Option<Actor>,
    pub pusher: Option<Actor>,
    pub commits: Vec<Commit>,
    pub issue: Option<Issue>,
    pub pull_request: Option<PullRequest>,
    pub release: Option<Release>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
}

/// `sender` carries `login`; `pusher` carries `name` (and sometimes `email`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Actor {
    pub login: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub merged: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Release {
    pub tag_name: String,
    pub html_url: String,
}

impl WebhookPayload {
    /// Repository display name: full name, else short name, else "Unknown".
    pub fn repository_name(&self) -> &str {
        self.repository
            .as_ref()
            .map(|r| if r.full_name.is_empty() { &r.name } else { &r.full_name })
            .filter(|n| !n.is_empty())
            .map_or("Unknown", String::as_str)
    }

    pub fn repository_url(&self) -> &str {
        self.repository.as_ref().map_or("", |r| r.html_url.as_str())
    }

    pub fn sender_login(&self) -> &str {
        self.sender
            .as_ref()
            .and_then(|s| s.login.as_deref())
            .filter(|l| !l.is_empty())
            .unwrap_or("Unknown")
    }

    /// Who pushed: pusher name, pusher login, then the sender's login.
    pub fn pusher_name(&self) -> &str {
        let pusher = self.pusher.as_ref();
        pusher
            .and_then(|p| p.name.as_deref())
            .filter(|n| !n.is_empty())
            .or_else(|| {
                pusher
                    .and_then(|p| p.login.as_deref())
                    .filter(|n| !n.is_empty())
            })
            .unwrap_or_else(|| self.sender_login())
    }

    /// Branch or tag name with the `refs/heads/` / `refs/tags/` prefix removed.
    pub fn branch(&self) -> &str {
        let git_ref = self.git_ref.as_deref().unwrap_or("");
        let short = git_ref
            .strip_prefix("refs/heads/")
            .or_else(|| git_ref.strip_prefix("refs/tags/"))
            .unwrap_or(git_ref);
        if short.is_empty() {
            "unknown"
        } else {
            short
        }
    }

    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or("")
    }
}
