use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modgate::analyzer::{ImageAnalyzer, VitClassifier};
use modgate::auth::AuthService;
use modgate::store::postgres::PgStore;
use modgate::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "modgate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            let auth = AuthService::new(db);
            handle_token_command(command, &auth).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn handle_token_command(
    command: cli::TokenCommands,
    auth: &AuthService,
) -> anyhow::Result<()> {
    match command {
        cli::TokenCommands::Create { admin } => {
            let token = auth.create_token(admin).await?;
            println!("token:      {}", token.token);
            println!("is_admin:   {}", token.is_admin);
            println!("created_at: {}", token.created_at);
            println!();
            println!("Use: Authorization: Bearer {}", token.token);
        }
        cli::TokenCommands::List => {
            for token in auth.list_tokens().await? {
                println!(
                    "{}  admin={}  created={}",
                    token.token, token.is_admin, token.created_at
                );
            }
        }
        cli::TokenCommands::Delete { token } => {
            if auth.delete_token(&token).await? {
                println!("deleted {}", token);
            } else {
                anyhow::bail!("token not found: {}", token);
            }
        }
    }
    Ok(())
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    tracing::info!("Loading classification model...");
    let model_repo = cfg.model_repo.clone();
    let classifier = tokio::task::spawn_blocking(move || VitClassifier::load(&model_repo)).await??;

    let state = Arc::new(AppState {
        auth: AuthService::new(db),
        analyzer: ImageAnalyzer::new(Arc::new(classifier)),
        config: cfg,
    });

    let app = api::router(state)
        // Enforce 25 MB body size limit on all routes
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        // Open CORS: the service is meant to sit behind arbitrary frontends
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("modgate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
