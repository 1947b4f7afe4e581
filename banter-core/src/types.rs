use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Platform-native post identifier (snowflake). Only its total order matters:
/// a stored cursor is compared against incoming ids with `<=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredAccount {
    pub id: Uuid,
    pub handle: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    /// Newest post id already processed for this account; never rewound.
    pub last_post_id: Option<PostId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    General,
    Bullish,
    Ironic,
    Provocative,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::General => "general",
            TemplateCategory::Bullish => "bullish",
            TemplateCategory::Ironic => "ironic",
            TemplateCategory::Provocative => "provocative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "general" => Some(TemplateCategory::General),
            "bullish" => Some(TemplateCategory::Bullish),
            "ironic" => Some(TemplateCategory::Ironic),
            "provocative" => Some(TemplateCategory::Provocative),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyTemplate {
    pub id: Uuid,
    pub text: String,
    pub category: TemplateCategory,
    pub is_active: bool,
    /// Incremented exactly once per successful publish; never decremented.
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementPolicy {
    pub id: Uuid,
    pub is_active: bool,
    pub replies_per_day: u32,
    pub min_delay_minutes: u32,
    pub max_delay_minutes: u32,
    pub categories: Vec<TemplateCategory>,
    pub created_at: DateTime<Utc>,
}

impl EngagementPolicy {
    pub fn with_defaults() -> Self {
        Self {
            id: Uuid::new_v4(),
            is_active: true,
            replies_per_day: 10,
            min_delay_minutes: 30,
            max_delay_minutes: 180,
            categories: vec![
                TemplateCategory::General,
                TemplateCategory::Bullish,
                TemplateCategory::Ironic,
            ],
            created_at: Utc::now(),
        }
    }

    /// Invariant: min delay must not exceed max delay.
    pub fn validate(&self) -> Result<(), crate::CoreError> {
        if self.min_delay_minutes > self.max_delay_minutes {
            return Err(crate::CoreError::InvalidInput {
                message: format!(
                    "min_delay_minutes ({}) exceeds max_delay_minutes ({})",
                    self.min_delay_minutes, self.max_delay_minutes
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementStatus {
    Success,
    Failed,
}

impl EngagementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementStatus::Success => "success",
            EngagementStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(EngagementStatus::Success),
            "failed" => Some(EngagementStatus::Failed),
            _ => None,
        }
    }
}

/// One engagement attempt, successful or not. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub id: Uuid,
    pub target_handle: String,
    pub post_id: PostId,
    pub post_url: String,
    pub reply_text: String,
    pub status: EngagementStatus,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EngagementRecord {
    pub fn success(handle: &str, post_id: PostId, reply_text: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_handle: handle.to_string(),
            post_id,
            post_url: post_url(handle, post_id),
            reply_text: reply_text.to_string(),
            status: EngagementStatus::Success,
            error_detail: None,
            created_at: at,
        }
    }

    pub fn failure(
        handle: &str,
        post_id: PostId,
        reply_text: &str,
        error_detail: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_handle: handle.to_string(),
            post_id,
            post_url: post_url(handle, post_id),
            reply_text: reply_text.to_string(),
            status: EngagementStatus::Failed,
            error_detail: Some(error_detail),
            created_at: at,
        }
    }
}

/// A post as returned by the platform. Lives only for one polling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub metrics: PostMetrics,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PostMetrics {
    pub likes: u32,
    pub reposts: u32,
    pub replies: u32,
}

pub fn post_url(handle: &str, post_id: PostId) -> String {
    format!("https://twitter.com/{}/status/{}", handle, post_id)
}
