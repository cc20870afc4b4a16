use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenRow {
    pub token: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Token Operations --

    pub async fn insert_token(&self, row: &TokenRow) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO tokens (token, is_admin, created_at) VALUES ($1, $2, $3)")
            .bind(&row.token)
            .bind(row.is_admin)
            .bind(row.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn find_token(&self, token: &str) -> Result<Option<TokenRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT token, is_admin, created_at FROM tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// List all tokens. Rows that fail to decode are skipped with a
    /// warning rather than failing the whole listing.
    pub async fn list_tokens(&self) -> Result<Vec<TokenRow>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT token, is_admin, created_at FROM tokens ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;

        let mut tokens = Vec::with_capacity(rows.len());
        for row in rows {
            match TokenRow::from_row(&row) {
                Ok(t) => tokens.push(t),
                Err(e) => tracing::warn!("skipping malformed token row: {}", e),
            }
        }

        Ok(tokens)
    }

    pub async fn delete_token(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // -- Usage Operations --

    pub async fn insert_usage(
        &self,
        token: &str,
        endpoint: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(r#"INSERT INTO usages (token, endpoint, "timestamp") VALUES ($1, $2, $3)"#)
            .bind(token)
            .bind(endpoint)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
