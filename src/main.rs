use anyhow::Result;
use ecograph::config::Config;
use ecograph::db::{migrate, Db};
use ecograph::error::EcographError;
use ecograph::graph::GraphBuilder;
use ecograph::server::{ApiServer, UpdateRegistry};
use ecograph::store::ProductStore;
use ecograph::sync::SyncEngine;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "verify" => run_schema_verification().await?,
        "serve" | _ => run_server().await?,
    }

    Ok(())
}

/// Run the REST API server
async fn run_server() -> Result<()> {
    log::info!("Starting Ecograph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());
    log::info!(
        "Layout: {} iterations, repulsion {}, attraction {}",
        config.layout.iterations,
        config.layout.repulsion,
        config.layout.attraction
    );

    let db = Arc::new(Db::new(config.db_path()));

    let migrations_dir = Path::new("migrations").to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;
    log::info!("Database initialized successfully");

    let store = ProductStore::new(db);
    let builder = GraphBuilder::new(store.clone(), &config);
    let sync = Arc::new(SyncEngine::new(store.clone(), config.classifier.clone()));
    let updates = Arc::new(UpdateRegistry::new());

    let server = ApiServer::new(store, builder, sync, updates, &config);
    server.run(config.server.port).await?;

    Ok(())
}

/// Verify that the database schema is in place
async fn run_schema_verification() -> Result<()> {
    let config = Config::load()?;
    let db = Db::new(config.db_path());

    let migrations_dir = Path::new("migrations").to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    db.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        for table in ["products", "schema_migrations"] {
            if !tables.iter().any(|t| t == table) {
                return Err(EcographError::Config(format!("Missing table: {}", table)));
            }
            log::debug!("✓ Table exists: {}", table);
        }

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(EcographError::Config(format!(
                "Journal mode is not WAL: {}",
                journal_mode
            )));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(EcographError::Config(format!(
                "Database integrity check failed: {}",
                integrity
            )));
        }

        Ok(())
    })
    .await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
