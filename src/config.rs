use serde::Deserialize;

/// Repo id of the default NSFW detection model on the Hugging Face hub.
pub const DEFAULT_MODEL_REPO: &str = "LukeJacob2023/nsfw-image-detector";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Hugging Face repo id of the classification model.
    /// Set via MODGATE_MODEL_REPO env var.
    pub model_repo: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("MODGATE_PORT")
            .unwrap_or_else(|_| "7000".into())
            .parse()
            .unwrap_or(7000),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/image_moderation".into()),
        model_repo: std::env::var("MODGATE_MODEL_REPO")
            .unwrap_or_else(|_| DEFAULT_MODEL_REPO.into()),
    })
}
