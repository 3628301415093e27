use crate::{KeyStore, ProfileSink, SeedRoster};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};
use tubescout_core::{ChannelProfile, ChannelSeed, CoreError, StorageError};

/// SQLite-backed stores for processed video keys, the seed roster and the
/// enriched output. Every write commits before returning.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const SQLITE_BUSY: &str = "5";

fn storage_error(error: sqlx::Error) -> StorageError {
    let busy = error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == SQLITE_BUSY);
    if busy {
        StorageError::DatabaseLocked
    } else {
        StorageError::Sql(error)
    }
}

fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::ConnectionFailed {
                reason: format!("{}: {}", database_url, e),
            })?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to database {}", database_url);
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Database migrations applied");
        Ok(())
    }

    /// Connect and migrate in one step.
    pub async fn open(database_url: &str) -> Result<Self, CoreError> {
        let store = Self::connect(database_url).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn processed_count(&self) -> Result<u64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_videos")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(from_db(count))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl KeyStore for SqliteStore {
    async fn contains(&self, key: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM processed_videos WHERE video_id = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.is_some())
    }

    async fn add(&self, key: &str) -> Result<(), CoreError> {
        sqlx::query("INSERT OR IGNORE INTO processed_videos (video_id) VALUES (?)")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

impl SeedRoster for SqliteStore {
    async fn contains_handle(&self, handle: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM channel_seeds WHERE channel_handle = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.is_some())
    }

    async fn append_seed(&self, seed: &ChannelSeed) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO channel_seeds (channel_handle, subscriber_count) VALUES (?, ?)",
        )
        .bind(&seed.channel_handle)
        .bind(to_db(seed.subscriber_count))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                handle = %seed.channel_handle,
                subscribers = seed.subscriber_count,
                "Failed to save channel seed: {}", e
            );
            storage_error(e)
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn seeds(&self) -> Result<Vec<ChannelSeed>, CoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT channel_handle, subscriber_count FROM channel_seeds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|(channel_handle, subscriber_count)| ChannelSeed {
                channel_handle,
                subscriber_count: from_db(subscriber_count),
            })
            .collect())
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<ChannelProfile, sqlx::Error> {
    let count = |column: &str| -> Result<u64, sqlx::Error> {
        Ok(from_db(row.try_get::<i64, _>(column)?))
    };
    Ok(ChannelProfile {
        handle: row.try_get("handle")?,
        channel_id: row.try_get("channel_id")?,
        display_name: row.try_get("display_name")?,
        guessed_name: row.try_get("guessed_name")?,
        city_country: row.try_get("city_country")?,
        email: row.try_get("email")?,
        subscriber_count: row
            .try_get::<Option<i64>, _>("subscriber_count")?
            .map(from_db),
        total_videos: count("total_videos")?,
        long_form_count: count("long_form_count")?,
        short_form_count: count("short_form_count")?,
        total_views: count("total_views")?,
        creation_date: row.try_get("creation_date")?,
        country: row.try_get("country")?,
        topics: row.try_get("topics")?,
        first_video_date: row.try_get("first_video_date")?,
        last_video_date: row.try_get("last_video_date")?,
        following_count: count("following_count")?,
        estimated_likes: count("estimated_likes")?,
        estimated_comments: count("estimated_comments")?,
    })
}

impl ProfileSink for SqliteStore {
    async fn append_profile(&self, profile: &ChannelProfile) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO channel_profiles
                (handle, channel_id, display_name, guessed_name, city_country, email,
                 subscriber_count, total_videos, long_form_count, short_form_count,
                 total_views, creation_date, country, topics, first_video_date,
                 last_video_date, following_count, estimated_likes, estimated_comments)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.handle)
        .bind(&profile.channel_id)
        .bind(&profile.display_name)
        .bind(&profile.guessed_name)
        .bind(&profile.city_country)
        .bind(&profile.email)
        .bind(profile.subscriber_count.map(to_db))
        .bind(to_db(profile.total_videos))
        .bind(to_db(profile.long_form_count))
        .bind(to_db(profile.short_form_count))
        .bind(to_db(profile.total_views))
        .bind(&profile.creation_date)
        .bind(&profile.country)
        .bind(&profile.topics)
        .bind(&profile.first_video_date)
        .bind(&profile.last_video_date)
        .bind(to_db(profile.following_count))
        .bind(to_db(profile.estimated_likes))
        .bind(to_db(profile.estimated_comments))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn enriched_handles(&self) -> Result<Vec<String>, CoreError> {
        let handles: Vec<String> =
            sqlx::query_scalar("SELECT handle FROM channel_profiles ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(handles)
    }

    async fn profiles(&self) -> Result<Vec<ChannelProfile>, CoreError> {
        let rows = sqlx::query("SELECT * FROM channel_profiles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter()
            .map(|row| profile_from_row(row).map_err(|e| CoreError::from(storage_error(e))))
            .collect()
    }
}
