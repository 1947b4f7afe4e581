use crate::pacing::{already_processed, is_stale, pacing_delay, randomize_reply};
use crate::EngagementScheduler;
use banter_core::{CoreError, EngagementPolicy, EngagementRecord, MonitoredAccount, ReplyTemplate};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

impl EngagementScheduler {
    /// One polling cycle: policy gate, then a sequential pass over every
    /// active account. A failing pass never aborts the cycle.
    pub(crate) async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        debug!("Starting engagement cycle");

        let policy = match self.store.get_policy().await {
            Ok(Some(policy)) => policy,
            Ok(None) => {
                warn!("No engagement policy materialized; skipping cycle");
                return;
            }
            Err(e) => {
                error!("Failed to load engagement policy: {}", e);
                return;
            }
        };
        if !policy.is_active {
            debug!("Engagement disabled by policy");
            return;
        }

        let accounts = match self.store.list_accounts(true).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!("Failed to list monitored accounts: {}", e);
                return;
            }
        };
        if accounts.is_empty() {
            debug!("No active monitored accounts");
            return;
        }

        let templates = match self.store.list_templates(true).await {
            Ok(templates) => templates,
            Err(e) => {
                error!("Failed to list reply templates: {}", e);
                return;
            }
        };
        if templates.is_empty() {
            warn!("No active reply templates");
            return;
        }

        info!(
            "Cycle started: {} accounts, {} templates",
            accounts.len(),
            templates.len()
        );
        for account in &accounts {
            if *shutdown.borrow() {
                info!("Stop requested, abandoning cycle");
                return;
            }
            if let Err(e) = self
                .process_account(account, &templates, &policy, shutdown)
                .await
            {
                error!("Pass for @{} failed: {}", account.handle, e);
            }
        }
        debug!("Engagement cycle complete");
    }

    /// Evaluate one account's recent posts newest-first and reply to the
    /// ones that clear the cursor, freshness, and probability gates.
    async fn process_account(
        &self,
        account: &MonitoredAccount,
        templates: &[ReplyTemplate],
        policy: &EngagementPolicy,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        debug!("Checking @{} for new posts", account.handle);
        let posts = self
            .client
            .fetch_recent_posts(&account.handle, self.config.fetch_page_size)
            .await?;
        if posts.is_empty() {
            debug!("No recent posts for @{}", account.handle);
            return Ok(());
        }
        let newest = posts[0].id;

        for (position, post) in posts.iter().enumerate() {
            if *shutdown.borrow() {
                info!("Stop requested, abandoning pass for @{}", account.handle);
                return Ok(());
            }
            if already_processed(post, account.last_post_id) {
                continue;
            }
            if is_stale(post, self.clock.now(), self.config.freshness_window) {
                continue;
            }
            if self.rng.unit() > self.config.engagement_probability {
                debug!("Skipping post {} on the probability gate", post.id);
                continue;
            }

            let template = &templates[self.rng.index(templates.len())];
            let text = randomize_reply(
                &template.text,
                self.config.emoji_probability,
                self.rng.as_ref(),
            );

            match self.client.publish_reply(post.id, &text).await {
                Ok(()) => {
                    info!("Replied to post {} by @{}", post.id, account.handle);
                    self.record_outcome(EngagementRecord::success(
                        &account.handle,
                        post.id,
                        &text,
                        self.clock.now(),
                    ))
                    .await;
                    if let Err(e) = self.store.increment_template_usage(template.id).await {
                        error!("Failed to bump usage for template {}: {}", template.id, e);
                    }
                    // Pacing: space consecutive replies unevenly, but only
                    // when more posts remain to evaluate.
                    if position + 1 < posts.len() {
                        let delay = pacing_delay(
                            policy.min_delay_minutes,
                            policy.max_delay_minutes,
                            self.rng.as_ref(),
                        );
                        info!("Pacing for {:?} before the next post", delay);
                        if self.wait_or_cancel(delay, shutdown).await {
                            info!(
                                "Stop requested during pacing wait, abandoning pass for @{}",
                                account.handle
                            );
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Reply to post {} by @{} failed: {}",
                        post.id, account.handle, e
                    );
                    self.record_outcome(EngagementRecord::failure(
                        &account.handle,
                        post.id,
                        &text,
                        e.to_string(),
                        self.clock.now(),
                    ))
                    .await;
                }
            }
        }

        // The cursor always moves to the newest fetched id, even when every
        // post above was filtered out.
        if let Err(e) = self.store.update_account_cursor(account.id, newest).await {
            error!("Failed to advance cursor for @{}: {}", account.handle, e);
        }
        Ok(())
    }

    async fn record_outcome(&self, record: EngagementRecord) {
        if let Err(e) = self.activity_log.append(record).await {
            error!("Failed to append engagement record: {}", e);
        }
    }
}
