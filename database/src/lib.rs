use async_trait::async_trait;
use banter_core::{
    ActivityLog, ConfigStore, CoreError, DatabaseError, EngagementPolicy, EngagementRecord,
    EngagementStatus, MonitoredAccount, PostId, ReplyTemplate, TemplateCategory,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;


const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS monitored_accounts (
        id TEXT PRIMARY KEY,
        handle TEXT NOT NULL UNIQUE,
        display_name TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        last_post_id INTEGER,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reply_templates (
        id TEXT PRIMARY KEY,
        text TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT 'general',
        is_active INTEGER NOT NULL DEFAULT 1,
        usage_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS engagement_policy (
        id TEXT PRIMARY KEY,
        is_active INTEGER NOT NULL,
        replies_per_day INTEGER NOT NULL,
        min_delay_minutes INTEGER NOT NULL,
        max_delay_minutes INTEGER NOT NULL,
        categories TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS engagement_log (
        id TEXT PRIMARY KEY,
        target_handle TEXT NOT NULL,
        post_id INTEGER NOT NULL,
        post_url TEXT NOT NULL,
        reply_text TEXT NOT NULL,
        status TEXT NOT NULL,
        error_detail TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_engagement_log_created_at
        ON engagement_log (created_at DESC)",
];

/// Starter reply templates, inserted only when the table is empty.
const DEFAULT_TEMPLATES: &[(&str, TemplateCategory)] = &[
    ("Great point, had to read this twice", TemplateCategory::General),
    ("This is the kind of signal worth following", TemplateCategory::Bullish),
    ("Bookmarking this before everyone else does", TemplateCategory::Bullish),
    ("Well, that aged quickly", TemplateCategory::Ironic),
    ("Bold take. Let's see how it plays out", TemplateCategory::Provocative),
];

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        Self::connect_with(database_url, 5).await
    }

    /// Single-connection pool; required for `sqlite::memory:` where every
    /// connection would otherwise see its own empty database.
    pub async fn connect_in_memory() -> Result<Self, CoreError> {
        Self::connect_with("sqlite::memory:", 1).await
    }

    async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        info!("Connected to database at {}", database_url);
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    migration: e.to_string(),
                })?;
        }
        debug!("Database schema is up to date");
        Ok(())
    }

    // ---- monitored accounts ----

    pub async fn insert_account(
        &self,
        handle: &str,
        display_name: Option<String>,
    ) -> Result<MonitoredAccount, CoreError> {
        let existing = sqlx::query("SELECT id FROM monitored_accounts WHERE handle = ?1")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        if existing.is_some() {
            return Err(DatabaseError::ConstraintViolation {
                constraint: format!("account @{} already exists", handle),
            }
            .into());
        }

        let account = MonitoredAccount {
            id: Uuid::new_v4(),
            handle: handle.to_string(),
            display_name,
            is_active: true,
            last_post_id: None,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO monitored_accounts (id, handle, display_name, is_active, last_post_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(account.id.to_string())
        .bind(&account.handle)
        .bind(&account.display_name)
        .bind(account.is_active)
        .bind(account.last_post_id.map(|p| p.0))
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        info!("Added monitored account @{}", account.handle);
        Ok(account)
    }

    pub async fn delete_account(&self, account_id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM monitored_accounts WHERE id = ?1")
            .bind(account_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::RecordNotFound {
                entity: "account".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Flip the active flag and return the updated account.
    pub async fn toggle_account(&self, account_id: Uuid) -> Result<MonitoredAccount, CoreError> {
        let result = sqlx::query(
            "UPDATE monitored_accounts SET is_active = NOT is_active WHERE id = ?1",
        )
        .bind(account_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::RecordNotFound {
                entity: "account".to_string(),
            }
            .into());
        }
        self.get_account(account_id).await
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<MonitoredAccount, CoreError> {
        let row = sqlx::query(
            "SELECT id, handle, display_name, is_active, last_post_id, created_at
             FROM monitored_accounts WHERE id = ?1",
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?
        .ok_or_else(|| DatabaseError::RecordNotFound {
            entity: "account".to_string(),
        })?;
        account_from_row(&row)
    }

    // ---- reply templates ----

    pub async fn insert_template(
        &self,
        text: &str,
        category: TemplateCategory,
    ) -> Result<ReplyTemplate, CoreError> {
        let template = ReplyTemplate {
            id: Uuid::new_v4(),
            text: text.to_string(),
            category,
            is_active: true,
            usage_count: 0,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO reply_templates (id, text, category, is_active, usage_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(template.id.to_string())
        .bind(&template.text)
        .bind(template.category.as_str())
        .bind(template.is_active)
        .bind(template.usage_count)
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(template)
    }

    pub async fn delete_template(&self, template_id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM reply_templates WHERE id = ?1")
            .bind(template_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::RecordNotFound {
                entity: "template".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Insert the starter template set when the table is empty. Returns the
    /// number of templates inserted.
    pub async fn seed_default_templates(&self) -> Result<usize, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reply_templates")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        if count > 0 {
            return Ok(0);
        }
        for (text, category) in DEFAULT_TEMPLATES {
            self.insert_template(text, *category).await?;
        }
        info!("Seeded {} default reply templates", DEFAULT_TEMPLATES.len());
        Ok(DEFAULT_TEMPLATES.len())
    }

    // ---- engagement policy ----

    /// Materialize the default policy when none exists. The scheduler relies
    /// on this having run before it is ever started.
    pub async fn ensure_policy(&self) -> Result<EngagementPolicy, CoreError> {
        if let Some(policy) = self.get_policy().await? {
            return Ok(policy);
        }
        let policy = EngagementPolicy::with_defaults();
        sqlx::query(
            "INSERT INTO engagement_policy
                (id, is_active, replies_per_day, min_delay_minutes, max_delay_minutes, categories, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(policy.id.to_string())
        .bind(policy.is_active)
        .bind(policy.replies_per_day as i64)
        .bind(policy.min_delay_minutes as i64)
        .bind(policy.max_delay_minutes as i64)
        .bind(serde_json::to_string(&policy.categories).map_err(CoreError::Serialization)?)
        .bind(policy.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        info!("Materialized default engagement policy");
        Ok(policy)
    }

    pub async fn update_policy(&self, update: PolicyUpdate) -> Result<EngagementPolicy, CoreError> {
        let mut policy = self.ensure_policy().await?;
        if let Some(is_active) = update.is_active {
            policy.is_active = is_active;
        }
        if let Some(replies_per_day) = update.replies_per_day {
            policy.replies_per_day = replies_per_day;
        }
        if let Some(min_delay_minutes) = update.min_delay_minutes {
            policy.min_delay_minutes = min_delay_minutes;
        }
        if let Some(max_delay_minutes) = update.max_delay_minutes {
            policy.max_delay_minutes = max_delay_minutes;
        }
        if let Some(categories) = update.categories {
            policy.categories = categories;
        }
        policy.validate()?;

        sqlx::query(
            "UPDATE engagement_policy
             SET is_active = ?2, replies_per_day = ?3, min_delay_minutes = ?4,
                 max_delay_minutes = ?5, categories = ?6
             WHERE id = ?1",
        )
        .bind(policy.id.to_string())
        .bind(policy.is_active)
        .bind(policy.replies_per_day as i64)
        .bind(policy.min_delay_minutes as i64)
        .bind(policy.max_delay_minutes as i64)
        .bind(serde_json::to_string(&policy.categories).map_err(CoreError::Serialization)?)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(policy)
    }
}

/// Partial policy update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PolicyUpdate {
    pub is_active: Option<bool>,
    pub replies_per_day: Option<u32>,
    pub min_delay_minutes: Option<u32>,
    pub max_delay_minutes: Option<u32>,
    pub categories: Option<Vec<TemplateCategory>>,
}

#[async_trait]
impl ConfigStore for Database {
    async fn list_accounts(&self, active_only: bool) -> Result<Vec<MonitoredAccount>, CoreError> {
        let query = if active_only {
            "SELECT id, handle, display_name, is_active, last_post_id, created_at
             FROM monitored_accounts WHERE is_active = 1 ORDER BY created_at"
        } else {
            "SELECT id, handle, display_name, is_active, last_post_id, created_at
             FROM monitored_accounts ORDER BY created_at"
        };
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        rows.iter().map(account_from_row).collect()
    }

    async fn update_account_cursor(
        &self,
        account_id: Uuid,
        new_cursor: PostId,
    ) -> Result<(), CoreError> {
        // Conditional single-record write: the cursor only ever moves forward.
        let result = sqlx::query(
            "UPDATE monitored_accounts SET last_post_id = ?2
             WHERE id = ?1 AND (last_post_id IS NULL OR last_post_id < ?2)",
        )
        .bind(account_id.to_string())
        .bind(new_cursor.0)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        if result.rows_affected() == 0 {
            debug!(
                "Cursor for account {} not advanced to {} (stale or unknown account)",
                account_id, new_cursor
            );
        }
        Ok(())
    }

    async fn list_templates(&self, active_only: bool) -> Result<Vec<ReplyTemplate>, CoreError> {
        let query = if active_only {
            "SELECT id, text, category, is_active, usage_count, created_at
             FROM reply_templates WHERE is_active = 1 ORDER BY created_at"
        } else {
            "SELECT id, text, category, is_active, usage_count, created_at
             FROM reply_templates ORDER BY created_at"
        };
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;
        rows.iter().map(template_from_row).collect()
    }

    async fn increment_template_usage(&self, template_id: Uuid) -> Result<(), CoreError> {
        let result =
            sqlx::query("UPDATE reply_templates SET usage_count = usage_count + 1 WHERE id = ?1")
                .bind(template_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::Sql)?;
        if result.rows_affected() == 0 {
            warn!("Usage increment for unknown template {}", template_id);
        }
        Ok(())
    }

    async fn get_policy(&self) -> Result<Option<EngagementPolicy>, CoreError> {
        let row = sqlx::query(
            "SELECT id, is_active, replies_per_day, min_delay_minutes, max_delay_minutes,
                    categories, created_at
             FROM engagement_policy LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        row.as_ref().map(policy_from_row).transpose()
    }
}

#[async_trait]
impl ActivityLog for Database {
    async fn append(&self, record: EngagementRecord) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO engagement_log
                (id, target_handle, post_id, post_url, reply_text, status, error_detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(record.id.to_string())
        .bind(&record.target_handle)
        .bind(record.post_id.0)
        .bind(&record.post_url)
        .bind(&record.reply_text)
        .bind(record.status.as_str())
        .bind(&record.error_detail)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<EngagementRecord>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, target_handle, post_id, post_url, reply_text, status, error_detail, created_at
             FROM engagement_log ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;
        rows.iter().map(record_from_row).collect()
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(raw).map_err(|_| {
        DatabaseError::QueryFailed {
            query: format!("stored id '{}' is not a valid uuid", raw),
        }
        .into()
    })
}

fn account_from_row(row: &SqliteRow) -> Result<MonitoredAccount, CoreError> {
    let id: String = row.try_get("id").map_err(DatabaseError::Sql)?;
    let last_post_id: Option<i64> = row.try_get("last_post_id").map_err(DatabaseError::Sql)?;
    Ok(MonitoredAccount {
        id: parse_uuid(&id)?,
        handle: row.try_get("handle").map_err(DatabaseError::Sql)?,
        display_name: row.try_get("display_name").map_err(DatabaseError::Sql)?,
        is_active: row.try_get("is_active").map_err(DatabaseError::Sql)?,
        last_post_id: last_post_id.map(PostId),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(DatabaseError::Sql)?,
    })
}

fn template_from_row(row: &SqliteRow) -> Result<ReplyTemplate, CoreError> {
    let id: String = row.try_get("id").map_err(DatabaseError::Sql)?;
    let category: String = row.try_get("category").map_err(DatabaseError::Sql)?;
    Ok(ReplyTemplate {
        id: parse_uuid(&id)?,
        text: row.try_get("text").map_err(DatabaseError::Sql)?,
        category: TemplateCategory::parse(&category).ok_or_else(|| {
            DatabaseError::QueryFailed {
                query: format!("unknown template category '{}'", category),
            }
        })?,
        is_active: row.try_get("is_active").map_err(DatabaseError::Sql)?,
        usage_count: row.try_get("usage_count").map_err(DatabaseError::Sql)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(DatabaseError::Sql)?,
    })
}

fn policy_from_row(row: &SqliteRow) -> Result<EngagementPolicy, CoreError> {
    let id: String = row.try_get("id").map_err(DatabaseError::Sql)?;
    let categories_raw: String = row.try_get("categories").map_err(DatabaseError::Sql)?;
    Ok(EngagementPolicy {
        id: parse_uuid(&id)?,
        is_active: row.try_get("is_active").map_err(DatabaseError::Sql)?,
        replies_per_day: row.try_get::<i64, _>("replies_per_day").map_err(DatabaseError::Sql)? as u32,
        min_delay_minutes: row
            .try_get::<i64, _>("min_delay_minutes")
            .map_err(DatabaseError::Sql)? as u32,
        max_delay_minutes: row
            .try_get::<i64, _>("max_delay_minutes")
            .map_err(DatabaseError::Sql)? as u32,
        categories: serde_json::from_str(&categories_raw).map_err(CoreError::Serialization)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(DatabaseError::Sql)?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<EngagementRecord, CoreError> {
    let id: String = row.try_get("id").map_err(DatabaseError::Sql)?;
    let status: String = row.try_get("status").map_err(DatabaseError::Sql)?;
    Ok(EngagementRecord {
        id: parse_uuid(&id)?,
        target_handle: row.try_get("target_handle").map_err(DatabaseError::Sql)?,
        post_id: PostId(row.try_get("post_id").map_err(DatabaseError::Sql)?),
        post_url: row.try_get("post_url").map_err(DatabaseError::Sql)?,
        reply_text: row.try_get("reply_text").map_err(DatabaseError::Sql)?,
        status: EngagementStatus::parse(&status).ok_or_else(|| DatabaseError::QueryFailed {
            query: format!("unknown engagement status '{}'", status),
        })?,
        error_detail: row.try_get("error_detail").map_err(DatabaseError::Sql)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(DatabaseError::Sql)?,
    })
}
