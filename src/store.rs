use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::domain::{
    email_batch::EmailBatch,
    email_entry::{timestamp_to_datetime, EmailEntry, EmailEntryUpdate},
};

/// Handle over the emails table. Cloning it shares the same connection pool.
#[derive(Clone, Debug)]
pub struct EmailStore {
    db_pool: SqlitePool,
}

#[derive(thiserror::Error)]
#[error("{0}")]
pub struct StoreError(#[from] sqlx::Error);

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({:?})", self.0)
    }
}

impl EmailStore {
    pub fn new(db_pool: SqlitePool) -> EmailStore {
        EmailStore { db_pool }
    }

    /// Creates the emails table. Running it against an existing table is a no-op.
    #[tracing::instrument(name = "Ensure the emails table exists", skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            CREATE TABLE emails(
                id              INTEGER PRIMARY KEY,
                email           TEXT UNIQUE,
                confirmed_at    INTEGER,
                opt_out         INTEGER
            )
            "#,
        )
        .execute(&self.db_pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!("Created the emails table");
                Ok(())
            }
            Err(sqlx::Error::Database(err)) if err.message().contains("already exists") => {
                tracing::debug!("Emails table already exists: {}", err.message());
                Ok(())
            }
            Err(err) => {
                tracing::error!("Failed to create the emails table: {:?}", err);
                Err(StoreError(err))
            }
        }
    }

    #[tracing::instrument(name = "Insert a new email into the database", skip(self))]
    pub async fn create(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO emails (email, confirmed_at, opt_out)
            VALUES (?, 0, false)
            "#,
        )
        .bind(email)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            StoreError(err)
        })?;

        Ok(())
    }

    /// Returns `None` when no row holds that email.
    #[tracing::instrument(name = "Fetch an email from the database", skip(self))]
    pub async fn get(&self, email: &str) -> Result<Option<EmailEntry>, StoreError> {
        sqlx::query(
            r#"
            SELECT id, email, confirmed_at, opt_out
            FROM emails
            WHERE email = ?
            "#,
        )
        .bind(email)
        .try_map(|row: SqliteRow| entry_from_row(&row))
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            StoreError(err)
        })
    }

    /// Inserts the entry, or overwrites confirmed_at and opt_out when the email is already stored.
    #[tracing::instrument(
        name = "Upsert an email into the database",
        skip(self, entry),
        fields(email = %entry.email, opt_out = entry.is_opt_out())
    )]
    pub async fn update(&self, entry: &EmailEntryUpdate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO emails (email, confirmed_at, opt_out)
            VALUES (?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                confirmed_at = excluded.confirmed_at,
                opt_out = excluded.opt_out
            "#,
        )
        .bind(&entry.email)
        .bind(entry.confirmed_at_timestamp())
        .bind(entry.is_opt_out())
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            StoreError(err)
        })?;

        Ok(())
    }

    /// Opts the email out. The row itself is kept.
    #[tracing::instrument(name = "Opt out an email in the database", skip(self))]
    pub async fn delete(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE emails
            SET opt_out = true
            WHERE email = ?
            "#,
        )
        .bind(email)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            StoreError(err)
        })?;

        Ok(())
    }

    /// Active (not opted out) emails of the requested page, in ascending id order.
    #[tracing::instrument(
        name = "Fetch a batch of active emails from the database",
        skip(self, batch),
        fields(page = batch.page(), count = batch.limit())
    )]
    pub async fn get_batch(&self, batch: &EmailBatch) -> Result<Vec<EmailEntry>, StoreError> {
        sqlx::query(
            r#"
            SELECT id, email, confirmed_at, opt_out
            FROM emails
            WHERE opt_out = false
            ORDER BY id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(batch.limit())
        .bind(batch.offset())
        .try_map(|row: SqliteRow| entry_from_row(&row))
        .fetch_all(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            StoreError(err)
        })
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<EmailEntry, sqlx::Error> {
    let confirmed_at: i64 = row.try_get("confirmed_at")?;

    Ok(EmailEntry {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        confirmed_at: timestamp_to_datetime(confirmed_at)
            .map_err(|err| sqlx::Error::Decode(err.into()))?,
        opt_out: row.try_get("opt_out")?,
    })
}
