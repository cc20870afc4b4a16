use chrono::Utc;

use crate::models::token::Token;
use crate::store::postgres::{PgStore, TokenRow};

/// Token issuance, validation and usage logging over the store.
#[derive(Clone)]
pub struct AuthService {
    store: PgStore,
}

impl AuthService {
    pub fn new(store: PgStore) -> Self {
        Self { store }
    }

    /// Mint a fresh token and persist it.
    pub async fn create_token(&self, is_admin: bool) -> Result<Token, sqlx::Error> {
        let row = TokenRow {
            token: generate_token(),
            is_admin,
            created_at: Utc::now(),
        };
        self.store.insert_token(&row).await?;
        Ok(row.into())
    }

    /// Exact-match lookup. `None` for unknown tokens; no side effects.
    pub async fn validate_token(&self, token: &str) -> Result<Option<Token>, sqlx::Error> {
        Ok(self.store.find_token(token).await?.map(Token::from))
    }

    pub async fn list_tokens(&self) -> Result<Vec<Token>, sqlx::Error> {
        Ok(self
            .store
            .list_tokens()
            .await?
            .into_iter()
            .map(Token::from)
            .collect())
    }

    /// Returns whether a token was actually removed.
    pub async fn delete_token(&self, token: &str) -> Result<bool, sqlx::Error> {
        self.store.delete_token(token).await
    }

    /// Append a usage record on a detached task. Best effort: failures are
    /// traced and never reach the response path.
    pub fn log_usage(&self, token: &str, endpoint: &str) {
        let store = self.store.clone();
        let token = token.to_string();
        let endpoint = endpoint.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.insert_usage(&token, &endpoint, Utc::now()).await {
                tracing::error!(endpoint = %endpoint, "failed to write usage record: {}", e);
            } else {
                tracing::debug!(endpoint = %endpoint, "usage recorded");
            }
        });
    }
}

/// Opaque bearer token: prefixed 128-bit random hex string.
fn generate_token() -> String {
    use rand::RngCore;
    let mut random_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut random_bytes);
    format!("modgate_tok_{}", hex::encode(random_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_have_prefix_and_length() {
        let token = generate_token();
        assert!(token.starts_with("modgate_tok_"));
        assert_eq!(token.len(), "modgate_tok_".len() + 32);
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
