//! Collaborator contracts consumed by the engagement scheduler. The store,
//! platform client, and activity log are injected behind these traits so the
//! scheduler can run against in-memory fakes in tests.

use crate::error::CoreError;
use crate::types::{EngagementPolicy, EngagementRecord, MonitoredAccount, Post, PostId, ReplyTemplate};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list_accounts(&self, active_only: bool) -> Result<Vec<MonitoredAccount>, CoreError>;

    /// Advance an account's cursor. Implementations must never rewind: a
    /// new cursor at or below the stored one is a silent no-op.
    async fn update_account_cursor(
        &self,
        account_id: Uuid,
        new_cursor: PostId,
    ) -> Result<(), CoreError>;

    async fn list_templates(&self, active_only: bool) -> Result<Vec<ReplyTemplate>, CoreError>;

    async fn increment_template_usage(&self, template_id: Uuid) -> Result<(), CoreError>;

    /// The single global policy, or `None` when it has not been materialized.
    async fn get_policy(&self) -> Result<Option<EngagementPolicy>, CoreError>;
}

#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Recent original posts for a handle, newest first. Reposts and
    /// reply-posts are excluded by the fetch itself.
    async fn fetch_recent_posts(
        &self,
        handle: &str,
        max_results: u32,
    ) -> Result<Vec<Post>, CoreError>;

    async fn publish_reply(&self, post_id: PostId, text: &str) -> Result<(), CoreError>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, record: EngagementRecord) -> Result<(), CoreError>;

    /// Most recent records first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<EngagementRecord>, CoreError>;
}
