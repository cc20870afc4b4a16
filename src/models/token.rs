use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::postgres::TokenRow;

/// Bearer token as exposed by the API and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Self {
            token: row.token,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}
