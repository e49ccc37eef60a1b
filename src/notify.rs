//! Credential Notifications
//! Mission: Deliver freshly generated login credentials to new account holders
//!
//! Transport is pluggable. The outbox notifier is the default for local
//! setups: it appends each notice to a file under the data directory for the
//! operator to pass on. The webhook notifier hands the message to an
//! external mail relay.

use crate::auth::models::Role;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Everything a new account holder needs to log in the first time
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialNotice {
    pub recipient: String,
    pub display_name: String,
    pub role: Role,
    pub password: String,
    pub login_url: String,
}

impl CredentialNotice {
    pub fn subject(&self) -> &'static str {
        "Your School Portal Account Credentials"
    }

    /// Plain-text message body
    pub fn body(&self) -> String {
        format!(
            "Dear {},\n\n\
             Your account has been created as a {}. Here are your login details:\n\n\
             Login ID (Email): {}\n\
             Generated Password: {}\n\
             Login URL: {}\n\n\
             Please change your password after your first login.\n",
            self.display_name,
            self.role.display_name(),
            self.recipient,
            self.password,
            self.login_url
        )
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_credentials(&self, notice: &CredentialNotice) -> Result<()>;
}

pub const OUTBOX_FILE: &str = "credential_outbox.jsonl";

/// Appends each notice as one JSON line to the credential outbox.
///
/// The file holds plaintext passwords and is created owner-only on unix.
pub struct OutboxNotifier {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboxEntry<'a> {
    #[serde(flatten)]
    notice: &'a CredentialNotice,
    subject: &'a str,
    issued_at: DateTime<Utc>,
}

impl OutboxNotifier {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            path: data_dir.join(OUTBOX_FILE),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Notifier for OutboxNotifier {
    async fn send_credentials(&self, notice: &CredentialNotice) -> Result<()> {
        let entry = OutboxEntry {
            notice,
            subject: notice.subject(),
            issued_at: Utc::now(),
        };
        let mut line = serde_json::to_vec(&entry).context("Failed to encode outbox entry")?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open outbox {}", self.path.display()))?;
        file.write_all(&line)
            .await
            .context("Failed to write outbox entry")?;
        file.flush().await.context("Failed to flush outbox")?;

        info!(
            recipient = %notice.recipient,
            role = %notice.role,
            outbox = %self.path.display(),
            "📧 Credentials written to outbox"
        );
        Ok(())
    }
}

/// POSTs the notice as JSON to a mail relay.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    to: &'a str,
    subject: &'a str,
    text: String,
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send_credentials(&self, notice: &CredentialNotice) -> Result<()> {
        let message = WebhookMessage {
            to: &notice.recipient,
            subject: notice.subject(),
            text: notice.body(),
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("Mail relay unreachable")?;

        if !resp.status().is_success() {
            warn!(status = resp.status().as_u16(), recipient = %notice.recipient, "Mail relay rejected message");
            return Err(anyhow!("mail relay answered {}", resp.status()));
        }

        info!(recipient = %notice.recipient, "📧 Credentials delivered via relay");
        Ok(())
    }
}

/// Keeps delivered notices in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<CredentialNotice>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn sent(&self) -> Vec<CredentialNotice> {
        self.sent.lock().clone()
    }

    /// Most recent notice addressed to `recipient`
    pub fn last_for(&self, recipient: &str) -> Option<CredentialNotice> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|n| n.recipient.eq_ignore_ascii_case(recipient))
            .cloned()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send_credentials(&self, notice: &CredentialNotice) -> Result<()> {
        if *self.failing.lock() {
            return Err(anyhow!("delivery to {} failed", notice.recipient));
        }
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}
