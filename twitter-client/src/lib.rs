pub mod api;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;

#[cfg(test)]
mod tests;

use api::{TwitterApiClient, UserData};
use async_trait::async_trait;
use banter_core::{CoreError, PlatformConfig, Post, PostId, SocialClient};
use retry::{with_retries, RetryConfig};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Platform client facade: resolves handles, fetches recent original posts,
/// publishes replies. Fetches are retried on transient failures; publishes
/// are not.
pub struct TwitterClient {
    api: TwitterApiClient,
    retry_config: RetryConfig,
    user_ids: RwLock<HashMap<String, String>>,
}

impl TwitterClient {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            api: TwitterApiClient::new(config.bearer_token.clone(), config.user_agent.clone()),
            retry_config: RetryConfig::twitter(),
            user_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Check that the configured token is usable and return who we post as.
    pub async fn verify_credentials(&self) -> Result<UserData, CoreError> {
        self.api.verify_credentials().await
    }

    /// Look up a handle on the platform; used to validate accounts before
    /// they are monitored.
    pub async fn lookup_user(&self, handle: &str) -> Result<UserData, CoreError> {
        with_retries(&self.retry_config, "get_user_by_username", || {
            self.api.get_user_by_username(handle)
        })
        .await
    }

    pub async fn api_metrics(&self) -> metrics::ApiMetrics {
        self.api.get_metrics().await
    }

    pub async fn rate_limit_status(&self) -> rate_limiter::RateLimitStatus {
        self.api.get_rate_limit_status().await
    }

    async fn resolve_user_id(&self, handle: &str) -> Result<String, CoreError> {
        if let Some(user_id) = self.user_ids.read().await.get(handle) {
            return Ok(user_id.clone());
        }

        let user = self.lookup_user(handle).await?;

        let mut cache = self.user_ids.write().await;
        cache.insert(handle.to_string(), user.id.clone());
        debug!("Cached user id for @{} ({} handles known)", handle, cache.len());
        Ok(user.id)
    }
}

#[async_trait]
impl SocialClient for TwitterClient {
    async fn fetch_recent_posts(
        &self,
        handle: &str,
        max_results: u32,
    ) -> Result<Vec<Post>, CoreError> {
        let user_id = self.resolve_user_id(handle).await?;

        let tweets = with_retries(&self.retry_config, "get_user_tweets", || {
            self.api.get_user_tweets(&user_id, max_results)
        })
        .await?;

        let mut posts = tweets
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // The timeline arrives reverse-chronological; normalize on id order
        // since cursor comparisons are id-based.
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(posts)
    }

    async fn publish_reply(&self, post_id: PostId, text: &str) -> Result<(), CoreError> {
        match self.api.create_reply(post_id, text).await {
            Ok(created) => {
                debug!("Reply {} created for post {}", created.id, post_id);
                Ok(())
            }
            Err(e) => {
                warn!("Publishing reply to post {} failed: {}", post_id, e);
                Err(e)
            }
        }
    }
}
