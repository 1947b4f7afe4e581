use crate::metrics::{MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use banter_core::{CoreError, PlatformApiError, Post, PostId, PostMetrics};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Standard v2 response envelope: payload under `data`, partial failures
/// under `errors`, paging hints under `meta`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: Option<T>,
    pub meta: Option<ListMeta>,
    pub errors: Option<Vec<ApiErrorDetail>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMeta {
    pub result_count: Option<u32>,
    pub newest_id: Option<String>,
    pub oldest_id: Option<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub title: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: String,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub public_metrics: Option<TweetMetrics>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TweetMetrics {
    pub retweet_count: u32,
    pub reply_count: u32,
    pub like_count: u32,
    pub quote_count: u32,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    text: &'a str,
    reply: ReplyTarget,
}

#[derive(Debug, Serialize)]
struct ReplyTarget {
    in_reply_to_tweet_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
    pub text: String,
}

#[derive(Debug)]
pub struct TwitterApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    bearer_token: String,
    user_agent: String,
}

impl TwitterApiClient {
    pub fn new(bearer_token: String, user_agent: String) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::twitter_v2()));
        let metrics = Arc::new(MetricsCollector::new());

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            rate_limiter,
            metrics,
            bearer_token,
            user_agent,
        }
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(&str, &str)]>,
        json_body: Option<&serde_json::Value>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", TWITTER_API_BASE, endpoint);
        let start_time = Instant::now();
        let mut success = false;
        let mut status_code = None;
        let mut rate_limited = false;

        // Acquire rate limit permit
        let _permit = self.rate_limiter.acquire_permit().await;
        debug!("Acquired rate limit permit for {} {}", method, endpoint);

        // Build request
        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(&self.bearer_token)
            .header("User-Agent", &self.user_agent);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(body) = json_body {
            request_builder = request_builder.json(body);
        }

        debug!("Making platform API request: {} {}", method, endpoint);
        let result = request_builder.send().await;

        let outcome = match result {
            Ok(response) => {
                status_code = Some(response.status().as_u16());

                if response.status().is_success() {
                    success = true;
                    debug!("Request successful: {} {}", response.status(), endpoint);
                    Ok(response)
                } else {
                    error!(
                        "Request failed with status: {} for {}",
                        response.status(),
                        endpoint
                    );
                    match response.status().as_u16() {
                        429 => {
                            rate_limited = true;
                            let retry_after = response
                                .headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .unwrap_or(60);
                            warn!("Rate limited, retry after {} seconds", retry_after);
                            Err(PlatformApiError::RateLimitExceeded { retry_after }.into())
                        }
                        401 => Err(PlatformApiError::InvalidToken.into()),
                        403 => Err(PlatformApiError::Forbidden {
                            resource: endpoint.to_string(),
                        }
                        .into()),
                        status if status >= 500 => {
                            Err(PlatformApiError::ServerError { status_code: status }.into())
                        }
                        status => Err(PlatformApiError::InvalidResponse {
                            details: format!("HTTP {} from {}", status, endpoint),
                        }
                        .into()),
                    }
                }
            }
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    Err(PlatformApiError::RequestTimeout.into())
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success,
                rate_limited,
            })
            .await;

        outcome
    }

    /// Resolve a handle to the platform's user id.
    pub async fn get_user_by_username(&self, handle: &str) -> Result<UserData, CoreError> {
        let endpoint = format!("/2/users/by/username/{}", handle);
        let response = self
            .make_request(Method::GET, &endpoint, None, None)
            .await?;

        let envelope: ApiEnvelope<UserData> = response.json().await.map_err(|e| {
            error!("Failed to parse user lookup response: {}", e);
            PlatformApiError::InvalidResponse {
                details: format!("Failed to parse user data for @{}", handle),
            }
        })?;

        match envelope.data {
            Some(user) => {
                debug!("Resolved @{} to user id {}", handle, user.id);
                Ok(user)
            }
            // The platform reports unknown users inside the errors array.
            None => Err(PlatformApiError::UserNotFound {
                handle: handle.to_string(),
            }
            .into()),
        }
    }

    /// Recent original tweets for a user, newest first. Retweets and replies
    /// are excluded by the request itself.
    pub async fn get_user_tweets(
        &self,
        user_id: &str,
        max_results: u32,
    ) -> Result<Vec<TweetData>, CoreError> {
        let endpoint = format!("/2/users/{}/tweets", user_id);
        // The endpoint only accepts 5..=100.
        let max_results = max_results.clamp(5, 100).to_string();
        let params: [(&str, &str); 3] = [
            ("max_results", max_results.as_str()),
            ("exclude", "retweets,replies"),
            ("tweet.fields", "created_at,public_metrics"),
        ];

        let response = self
            .make_request(Method::GET, &endpoint, Some(&params), None)
            .await?;

        let envelope: ApiEnvelope<Vec<TweetData>> = response.json().await.map_err(|e| {
            error!("Failed to parse timeline response: {}", e);
            PlatformApiError::InvalidResponse {
                details: format!("Failed to parse tweets for user {}", user_id),
            }
        })?;

        // No `data` key means the window had no qualifying tweets.
        let tweets = envelope.data.unwrap_or_default();
        info!("Retrieved {} tweets for user {}", tweets.len(), user_id);
        Ok(tweets)
    }

    /// Publish `text` as a reply. Never retried; the caller records failures.
    pub async fn create_reply(
        &self,
        post_id: PostId,
        text: &str,
    ) -> Result<CreatedTweet, CoreError> {
        let payload = serde_json::to_value(ReplyRequest {
            text,
            reply: ReplyTarget {
                in_reply_to_tweet_id: post_id.to_string(),
            },
        })
        .map_err(CoreError::Serialization)?;

        let response = match self
            .make_request(Method::POST, "/2/tweets", None, Some(&payload))
            .await
        {
            Ok(response) => response,
            // A forbidden write is the platform rejecting this reply
            // (duplicate content, protected author, suspended target).
            Err(CoreError::PlatformApi(PlatformApiError::Forbidden { .. })) => {
                return Err(PlatformApiError::PublishRejected {
                    reason: format!("reply to post {} was refused", post_id),
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        let envelope: ApiEnvelope<CreatedTweet> = response.json().await.map_err(|e| {
            error!("Failed to parse reply creation response: {}", e);
            PlatformApiError::InvalidResponse {
                details: "Failed to parse created reply".to_string(),
            }
        })?;

        match envelope.data {
            Some(created) => {
                info!("Published reply {} to post {}", created.id, post_id);
                Ok(created)
            }
            None => {
                let detail = envelope
                    .errors
                    .and_then(|errors| errors.into_iter().next())
                    .and_then(|e| e.detail.or(e.title))
                    .unwrap_or_else(|| "no data in response".to_string());
                Err(PlatformApiError::PublishRejected { reason: detail }.into())
            }
        }
    }

    /// The authenticated user; used by the credentials health check.
    pub async fn verify_credentials(&self) -> Result<UserData, CoreError> {
        let response = self
            .make_request(Method::GET, "/2/users/me", None, None)
            .await?;

        let envelope: ApiEnvelope<UserData> = response.json().await.map_err(|e| {
            error!("Failed to parse credential verification response: {}", e);
            PlatformApiError::InvalidResponse {
                details: "Failed to parse authenticated user".to_string(),
            }
        })?;

        envelope.data.ok_or_else(|| {
            PlatformApiError::AuthenticationFailed {
                reason: "platform returned no user for the configured token".to_string(),
            }
            .into()
        })
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.status().await
    }
}

impl TryFrom<TweetData> for Post {
    type Error = CoreError;

    fn try_from(tweet: TweetData) -> Result<Self, Self::Error> {
        let id = tweet
            .id
            .parse::<i64>()
            .map_err(|_| PlatformApiError::InvalidResponse {
                details: format!("tweet id '{}' is not a valid snowflake", tweet.id),
            })?;
        let created_at = tweet
            .created_at
            .ok_or_else(|| PlatformApiError::InvalidResponse {
                details: format!("tweet {} is missing created_at", tweet.id),
            })?;
        let metrics = tweet.public_metrics.unwrap_or_default();
        Ok(Post {
            id: PostId(id),
            text: tweet.text,
            created_at,
            metrics: PostMetrics {
                likes: metrics.like_count,
                reposts: metrics.retweet_count + metrics.quote_count,
                replies: metrics.reply_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_client_creation() {
        let client = TwitterApiClient::new("token".to_string(), "banter-test/1.0".to_string());
        assert_eq!(client.user_agent, "banter-test/1.0");

        let status = client.get_rate_limit_status().await;
        assert!(status.available_tokens > 0);
    }

    #[test]
    fn test_tweet_conversion() {
        let tweet = TweetData {
            id: "1942652349849165824".to_string(),
            text: "gm".to_string(),
            created_at: Some(Utc::now()),
            public_metrics: Some(TweetMetrics {
                retweet_count: 2,
                reply_count: 5,
                like_count: 40,
                quote_count: 1,
            }),
        };

        let post = Post::try_from(tweet).unwrap();
        assert_eq!(post.id, PostId(1942652349849165824));
        assert_eq!(post.text, "gm");
        assert_eq!(post.metrics.likes, 40);
        assert_eq!(post.metrics.reposts, 3);
        assert_eq!(post.metrics.replies, 5);
    }

    #[test]
    fn test_tweet_conversion_rejects_bad_id() {
        let tweet = TweetData {
            id: "not-a-snowflake".to_string(),
            text: "gm".to_string(),
            created_at: Some(Utc::now()),
            public_metrics: None,
        };
        assert!(Post::try_from(tweet).is_err());
    }

    #[test]
    fn test_reply_request_shape() {
        let payload = serde_json::to_value(ReplyRequest {
            text: "nice one",
            reply: ReplyTarget {
                in_reply_to_tweet_id: PostId(42).to_string(),
            },
        })
        .unwrap();

        assert_eq!(payload["text"], "nice one");
        assert_eq!(payload["reply"]["in_reply_to_tweet_id"], "42");
    }

    #[test]
    fn test_envelope_parsing_without_data() {
        let raw = r#"{"meta":{"result_count":0}}"#;
        let envelope: ApiEnvelope<Vec<TweetData>> = serde_json::from_str(raw).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.meta.unwrap().result_count, Some(0));
    }
}
