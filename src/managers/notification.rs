//! Discord webhook notifications
//!
//! One message per run, summarising which units failed. Repeated messages of
//! the same kind are rate-limited through a small JSON cache on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::artifact::RunSummary;
use crate::config::{NotificationConfig, NotifyEvent};

/// Longest error text placed in a single embed field
const MAX_FIELD_LEN: usize = 1000;
/// Discord allows 25 fields per embed; leave room for the counters
const MAX_FAILURE_FIELDS: usize = 20;

pub struct NotificationManager {
    config: NotificationConfig,
    cache_path: PathBuf,
}

/// Discord embed color codes (decimal)
#[derive(Debug, Clone, Copy)]
pub enum NotificationColor {
    Failure = 15158332, // #E74C3C
    Success = 3066993,  // #2ECC71
}

impl NotificationColor {
    fn as_decimal(&self) -> u32 {
        *self as u32
    }
}

/// Run-level notification content
#[derive(Debug, Clone)]
pub struct Notification {
    pub event_type: NotifyEvent,
    pub message: String,
    pub succeeded: usize,
    pub failed: usize,
    /// `(unit, error detail)` for every failed unit
    pub failures: Vec<(String, String)>,
    pub duration_secs: u64,
}

impl Notification {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let event_type = if summary.is_success() {
            NotifyEvent::Success
        } else {
            NotifyEvent::Failure
        };

        let message = match event_type {
            NotifyEvent::Success => {
                format!("All {} backup task(s) completed", summary.outcomes.len())
            }
            NotifyEvent::Failure => format!(
                "{} of {} backup task(s) failed",
                summary.failed(),
                summary.outcomes.len()
            ),
        };

        let failures = summary
            .failures()
            .map(|o| (o.unit.clone(), o.error_detail().unwrap_or_default()))
            .collect();

        Self {
            event_type,
            message,
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            failures,
            duration_secs: summary.duration.as_secs(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DiscordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<DiscordFooter>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix timestamp of last notification
    last_sent: i64,
    count: u32,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct NotificationCache {
    entries: HashMap<String, CacheEntry>,
}

impl NotificationManager {
    pub fn new(config: NotificationConfig) -> Self {
        let cache_path = config
            .cache_file
            .as_deref()
            .map(crate::config::expand_tilde)
            .unwrap_or_else(default_cache_path);
        Self { config, cache_path }
    }

    pub fn is_enabled(&self, event: &NotifyEvent) -> bool {
        if self.config.discord_webhook_url.is_empty() {
            return false;
        }
        self.config.notify_on.contains(event)
    }

    /// Report a finished run, if its outcome is one we notify on
    pub fn notify_run(&self, summary: &RunSummary) -> Result<()> {
        self.send(Notification::from_summary(summary))
    }

    /// Send a notification if enabled and not rate-limited
    pub fn send(&self, notification: Notification) -> Result<()> {
        if !self.is_enabled(&notification.event_type) {
            debug!(
                "Notification type {:?} not enabled, skipping",
                notification.event_type
            );
            return Ok(());
        }

        let cache_key = format!("run:{:?}", notification.event_type);

        if self.is_rate_limited(&cache_key)? {
            info!("Notification rate-limited for key: {}", cache_key);
            return Ok(());
        }

        let payload = self.build_payload(&notification);
        self.send_webhook(&payload)?;

        self.update_cache(&cache_key)?;

        info!("Sent {:?} notification", notification.event_type);

        Ok(())
    }

    fn build_payload(&self, notification: &Notification) -> DiscordPayload {
        let (color, emoji) = match notification.event_type {
            NotifyEvent::Failure => (NotificationColor::Failure, "\u{274C}"),
            NotifyEvent::Success => (NotificationColor::Success, "\u{2705}"),
        };

        let title = format!("{} Backup run: {:?}", emoji, notification.event_type);

        let mut fields = vec![
            DiscordField {
                name: "Succeeded".to_string(),
                value: notification.succeeded.to_string(),
                inline: true,
            },
            DiscordField {
                name: "Failed".to_string(),
                value: notification.failed.to_string(),
                inline: true,
            },
            DiscordField {
                name: "Duration".to_string(),
                value: format_duration(notification.duration_secs),
                inline: true,
            },
        ];

        for (unit, detail) in notification.failures.iter().take(MAX_FAILURE_FIELDS) {
            fields.push(DiscordField {
                name: unit.clone(),
                value: format!("```\n{}\n```", truncate(detail, MAX_FIELD_LEN)),
                inline: false,
            });
        }

        let embed = DiscordEmbed {
            title,
            description: Some(notification.message.clone()),
            color: color.as_decimal(),
            fields,
            footer: Some(DiscordFooter {
                text: hostname_footer(),
            }),
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        };

        DiscordPayload {
            username: Some("Backup Orchestrator".to_string()),
            embeds: vec![embed],
        }
    }

    fn send_webhook(&self, payload: &DiscordPayload) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .post(&self.config.discord_webhook_url)
            .json(payload)
            .send()
            .context("Failed to send Discord webhook")?;

        let status = response.status();
        if status.is_success() {
            debug!("Discord webhook sent successfully");
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            error!("Discord webhook failed with status {}: {}", status, body);
            anyhow::bail!("Discord webhook failed with status {}: {}", status, body)
        }
    }

    fn is_rate_limited(&self, cache_key: &str) -> Result<bool> {
        let cache = self.load_cache()?;

        if let Some(entry) = cache.entries.get(cache_key) {
            let now = chrono::Utc::now().timestamp();
            let window = (self.config.rate_limit_minutes * 60) as i64;
            if now - entry.last_sent < window {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn update_cache(&self, cache_key: &str) -> Result<()> {
        let mut cache = self.load_cache()?;
        let now = chrono::Utc::now().timestamp();

        let count = cache.entries.get(cache_key).map_or(1, |e| e.count + 1);
        cache
            .entries
            .insert(cache_key.to_string(), CacheEntry { last_sent: now, count });

        // Drop entries older than a day
        cache.entries.retain(|_, v| v.last_sent > now - 86_400);

        self.save_cache(&cache)
    }

    fn load_cache(&self) -> Result<NotificationCache> {
        if !self.cache_path.exists() {
            return Ok(NotificationCache::default());
        }

        let content = fs::read_to_string(&self.cache_path)
            .context("Failed to read notification cache")?;

        serde_json::from_str(&content).context("Failed to parse notification cache")
    }

    fn save_cache(&self, cache: &NotificationCache) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(cache)
            .context("Failed to serialize notification cache")?;

        fs::write(&self.cache_path, content).context("Failed to write notification cache")
    }
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("backup-orchestrator-notifications.json")
}

fn hostname_footer() -> String {
    match std::env::var("HOSTNAME") {
        Ok(host) if !host.is_empty() => format!("backup-orchestrator on {}", host),
        _ => "backup-orchestrator".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Format duration in human-readable form
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let (minutes, secs) = (seconds / 60, seconds % 60);
        if secs == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, secs)
        }
    } else {
        let (hours, minutes) = (seconds / 3600, (seconds % 3600) / 60);
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
