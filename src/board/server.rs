use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::db::{BoardDb, DbHandle};
use super::models::User;

/// Configuration for the board server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub default_username: String,
    pub default_email: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            db_path: PathBuf::from(".cardboard/cardboard.db"),
            dev_mode: false,
            default_username: "demo".to_string(),
            default_email: "demo@cardboard.local".to_string(),
        }
    }
}

/// Build the application router: API routes, JSON 404 fallback, request
/// tracing, and permissive CORS in dev mode.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let mut app = api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open (creating if needed) the database and seed the default user.
pub fn open_database(config: &ServerConfig) -> Result<(BoardDb, User)> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = BoardDb::new(&config.db_path).context("Failed to initialize board database")?;
    let user = db
        .ensure_user(&config.default_username, &config.default_email)
        .context("Failed to seed default user")?;
    Ok((db, user))
}

/// Start the board server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let (db, default_user) = open_database(&config)?;
    tracing::info!(
        db_path = %config.db_path.display(),
        default_user = %default_user.username,
        "database ready"
    );

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        default_user,
    });
    let app = build_router(state, config.dev_mode);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, dev_mode = config.dev_mode, "server listening");
    println!("Cardboard running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(dev_mode: bool) -> Router {
        let db = BoardDb::new_in_memory().unwrap();
        let default_user = db.ensure_user("demo", "demo@cardboard.local").unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            default_user,
        });
        build_router(state, dev_mode)
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3001);
        assert_eq!(config.db_path, PathBuf::from(".cardboard/cardboard.db"));
        assert!(!config.dev_mode);
        assert_eq!(config.default_username, "demo");
    }

    #[tokio::test]
    async fn test_router_serves_api_and_json_fallback() {
        let app = test_router(false);

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn test_cors_only_in_dev_mode() {
        let request = || {
            Request::builder()
                .uri("/api/health")
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap()
        };

        let response = test_router(true).oneshot(request()).await.unwrap();
        assert!(response.headers().contains_key("access-control-allow-origin"));

        let response = test_router(false).oneshot(request()).await.unwrap();
        assert!(!response.headers().contains_key("access-control-allow-origin"));
    }

    #[test]
    fn test_open_database_creates_directory_and_seeds_user() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            db_path: dir.path().join("nested/dir/board.db"),
            default_username: "alice".to_string(),
            default_email: "alice@example.com".to_string(),
            ..ServerConfig::default()
        };

        let (db, user) = open_database(&config).unwrap();
        assert!(config.db_path.exists());
        assert_eq!(user.username, "alice");
        assert_eq!(db.get_user_by_username("alice").unwrap(), Some(user.clone()));

        // Re-opening keeps the same user row.
        drop(db);
        let (_, again) = open_database(&config).unwrap();
        assert_eq!(again.id, user.id);
    }

    #[test]
    fn test_open_database_under_renamed_default_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::CardboardToml::default();
        config.database.path = dir.path().join("board.db");

        let (db, demo) = open_database(&config.server_config()).unwrap();
        drop(db);

        config.auth.default_username = "alice".to_string();
        let (db, alice) = open_database(&config.server_config()).unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.email, "alice@cardboard.local");
        assert_ne!(alice.id, demo.id);
        assert_eq!(db.get_user(demo.id).unwrap(), Some(demo));
    }

    #[test]
    fn test_open_database_reports_taken_email() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            db_path: dir.path().join("board.db"),
            ..ServerConfig::default()
        };
        drop(open_database(&config).unwrap());

        let clash = ServerConfig {
            default_username: "alice".to_string(),
            ..config
        };
        let err = open_database(&clash).unwrap_err();
        assert!(format!("{:#}", err).contains("already used by user 'demo'"));
    }
}
