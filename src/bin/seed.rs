use anyhow::Result;
use clap::Parser;
use ecograph::config::Config;
use ecograph::db::{migrate, Db};
use ecograph::graph::GraphBuilder;
use ecograph::store::ProductStore;
use ecograph::sync::{PimProduct, SyncEngine, SyncOutcome};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Seed the Ecograph database with demo PIM products")]
struct Args {
    /// Clear existing products before seeding
    #[arg(short, long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());

    let db = Arc::new(Db::new(config.db_path()));
    let migrations_dir = Path::new("migrations").to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    let store = ProductStore::new(db);
    if args.reset {
        let deleted = store.clear().await?;
        log::info!("Cleared {} existing products", deleted);
    }

    let engine = SyncEngine::new(store.clone(), config.classifier.clone());

    let mut synced = 0;
    let mut skipped = 0;
    for payload in demo_products()? {
        match engine.sync_product(payload).await? {
            SyncOutcome::Updated(_) => synced += 1,
            SyncOutcome::Unchanged(_) => skipped += 1,
        }
    }

    // Build once so the seed run reports the resulting graph shape
    let builder = GraphBuilder::new(store, &config);
    let graph = builder.build_complete_graph().await?;

    println!("\n{:=<60}", "");
    println!("DATABASE SEEDED SUCCESSFULLY");
    println!("{:=<60}", "");
    println!("Products synced: {} (skipped {})", synced, skipped);
    println!("Graph nodes: {}", graph.stats.total_nodes);
    println!("Graph edges: {}", graph.stats.total_edges);
    println!("Clusters: {}", graph.stats.total_clusters);
    println!("{:=<60}\n", "");

    Ok(())
}

/// Demo products mirroring the PIM payload shape: two meters, a remote
/// unit, an MDC and a software package, linked through their
/// relationship fields.
fn demo_products() -> Result<Vec<PimProduct>> {
    let payloads = vec![
        json!({
            "id": 1,
            "sku": "E750G2",
            "status": 1,
            "type": "simple",
            "values": {
                "common": {
                    "mdcs": "mdc_iris",
                    "nics": "nic_cas",
                    "Remotas": "rs2000",
                    "protocolo": "abnt",
                    "comunicacao": "4g",
                    "modelo_medidor": "8721",
                    "modulos_hemera": "CI,RS,F",
                    "tipo_integracao": "int_cas,int_iec61698",
                    "fabricante_medidor": "landisgyr"
                },
                "categories": ["medidores"]
            },
            "created_at": "2025-11-05T22:59:58Z",
            "updated_at": "2025-11-05T23:18:58Z"
        }),
        json!({
            "id": 2,
            "sku": "E650G3",
            "status": 1,
            "type": "simple",
            "values": {
                "common": {
                    "mdcs": "mdc_iris,mdc_hemera",
                    "nics": "nic_cas,nic_terceiros",
                    "Remotas": "rs2000,rs3000",
                    "protocolo": "abnt,iec",
                    "comunicacao": "wifi,ethernet",
                    "modelo_medidor": "8722",
                    "modulos_hemera": "CI,RS,F,M"
                },
                "categories": ["medidores"]
            },
            "created_at": "2025-11-05T22:59:58Z",
            "updated_at": "2025-11-05T23:18:58Z"
        }),
        json!({
            "id": 3,
            "sku": "RS2000",
            "status": 1,
            "type": "simple",
            "values": {
                "common": {
                    "comunicacao": "gprs,ethernet",
                    "protocolo": "abnt",
                    "compativel_medidores": "E750G2,E650G3"
                },
                "categories": ["remotas"]
            },
            "created_at": "2025-11-05T22:59:58Z",
            "updated_at": "2025-11-05T23:18:58Z"
        }),
        json!({
            "id": 4,
            "sku": "MDC_IRIS",
            "status": 1,
            "type": "simple",
            "values": {
                "common": {
                    "tipo_integracao": "int_cas",
                    "compativel_medidores": "E750G2,E650G3"
                },
                "categories": ["mdc"]
            },
            "created_at": "2025-11-05T22:59:58Z",
            "updated_at": "2025-11-05T23:18:58Z"
        }),
        json!({
            "id": 5,
            "sku": "HEMERA_SUITE",
            "status": 1,
            "type": "simple",
            "values": {
                "common": {
                    "tipo_software": "mdm",
                    "modulos_hemera": "CI,RS,F,M,GD",
                    "compativel_mdc": "mdc_iris,mdc_hemera"
                },
                "categories": ["software"]
            },
            "created_at": "2025-11-05T22:59:58Z",
            "updated_at": "2025-11-05T23:18:58Z"
        }),
    ];

    let mut products = Vec::new();
    for payload in payloads {
        products.push(serde_json::from_value(payload)?);
    }
    Ok(products)
}
