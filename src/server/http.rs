use crate::config::Config;
use crate::error::{EcographError, Result};
use crate::graph::GraphBuilder;
use crate::server::updates::{GraphUpdate, UpdateRegistry};
use crate::store::{ProductFilter, ProductStore};
use crate::sync::{PimProduct, SyncEngine, SyncEvent, SyncOutcome};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{stream, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// REST API server wrapper
pub struct ApiServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: ProductStore,
    pub builder: GraphBuilder,
    pub sync: Arc<SyncEngine>,
    pub updates: Arc<UpdateRegistry>,
}

impl ApiServer {
    pub fn new(
        store: ProductStore,
        builder: GraphBuilder,
        sync: Arc<SyncEngine>,
        updates: Arc<UpdateRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            state: AppState {
                store,
                builder,
                sync,
                updates,
            },
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.create_router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting Ecograph API server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            EcographError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "Failed to bind to {}: {}. Another ecograph instance may be running; \
                     set server.port in config.toml to use a different port.",
                    addr, e
                ),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            EcographError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        // Explicit origins when configured, Any for local dev
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/api/graph/complete", get(handle_complete_graph))
            .route("/api/graph/clusters", get(handle_clusters))
            .route("/api/graph/node/:node_id", get(handle_node_details))
            .route("/api/graph/events", get(handle_events))
            .route("/api/products", get(handle_list_products))
            .route("/api/products/categories/list", get(handle_categories))
            .route("/api/products/:sku", get(handle_get_product))
            .route("/api/webhooks/unopim", post(handle_webhook_event))
            .route("/api/webhooks/products", post(handle_webhook_product))
            .route("/api/webhooks/sync-status", get(handle_sync_status))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(self.state.clone())
    }
}

/// Uniform REST envelope shared by all endpoints.
fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

fn paged_envelope(data: Value, total: usize, page: usize, per_page: usize) -> Value {
    json!({
        "success": true,
        "data": data,
        "total": total,
        "page": page,
        "per_page": per_page
    })
}

fn message_envelope(message: &str) -> Value {
    json!({ "success": true, "message": message })
}

fn internal_error(context: &str, err: EcographError) -> Response {
    log::error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": err.to_string() })),
    )
        .into_response()
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "ecograph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

/// Complete graph structure for the 3D view.
async fn handle_complete_graph(State(state): State<AppState>) -> Response {
    match state.builder.build_complete_graph().await {
        Ok(payload) => (
            StatusCode::OK,
            Json(envelope(serde_json::to_value(payload).unwrap_or_default())),
        )
            .into_response(),
        Err(e) => internal_error("Error building graph", e),
    }
}

/// Clusters only, for legend/filter UIs.
async fn handle_clusters(State(state): State<AppState>) -> Response {
    match state.builder.build_complete_graph().await {
        Ok(payload) => (
            StatusCode::OK,
            Json(envelope(
                serde_json::to_value(payload.clusters).unwrap_or_default(),
            )),
        )
            .into_response(),
        Err(e) => internal_error("Error fetching clusters", e),
    }
}

/// Node detail: full product view or virtual stub, never a 404.
async fn handle_node_details(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Response {
    match state.builder.node_details(&node_id).await {
        Ok(details) => (
            StatusCode::OK,
            Json(envelope(serde_json::to_value(details).unwrap_or_default())),
        )
            .into_response(),
        Err(e) => internal_error("Error fetching node", e),
    }
}

#[derive(Debug, Deserialize)]
struct ProductsQuery {
    status: Option<String>,
    category: Option<String>,
    search: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn handle_list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let filter = ProductFilter {
        status: query.status,
        category: query.category,
        search: query.search,
    };

    match state.store.list(filter, page, per_page).await {
        Ok((products, total)) => (
            StatusCode::OK,
            Json(paged_envelope(
                serde_json::to_value(products).unwrap_or_default(),
                total,
                page,
                per_page,
            )),
        )
            .into_response(),
        Err(e) => internal_error("Error fetching products", e),
    }
}

async fn handle_get_product(State(state): State<AppState>, Path(sku): Path<String>) -> Response {
    match state.store.find_by_sku(&sku).await {
        Ok(Some(product)) => (
            StatusCode::OK,
            Json(envelope(serde_json::to_value(product).unwrap_or_default())),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": format!("Product not found: {}", sku) })),
        )
            .into_response(),
        Err(e) => internal_error("Error fetching product", e),
    }
}

async fn handle_categories(State(state): State<AppState>) -> Response {
    match state.store.category_counts().await {
        Ok(counts) => {
            let categories: Vec<Value> = counts
                .into_iter()
                .map(|(slug, count)| {
                    json!({
                        "slug": slug,
                        "name": title_case(&slug),
                        "count": count
                    })
                })
                .collect();
            (StatusCode::OK, Json(envelope(Value::Array(categories)))).into_response()
        }
        Err(e) => internal_error("Error fetching categories", e),
    }
}

/// `modulos_hemera` -> `Modulos Hemera`
fn title_case(slug: &str) -> String {
    slug.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// PIM change notification: acknowledged and fanned out to subscribers.
async fn handle_webhook_event(
    State(state): State<AppState>,
    Json(event): Json<SyncEvent>,
) -> Response {
    log::info!(
        "[WEBHOOK] Received: {} for {} {}",
        event.event_type,
        event.entity_type,
        event.entity_id
    );

    state.updates.broadcast(GraphUpdate::new(
        &event.event_type,
        serde_json::to_value(&event).unwrap_or_default(),
    ));

    (
        StatusCode::OK,
        Json(message_envelope(&format!(
            "Webhook received: {} for {}",
            event.event_type, event.entity_type
        ))),
    )
        .into_response()
}

/// Full product push: runs the sync engine, then notifies subscribers.
async fn handle_webhook_product(
    State(state): State<AppState>,
    Json(payload): Json<PimProduct>,
) -> Response {
    match state.sync.sync_product(payload).await {
        Ok(SyncOutcome::Updated(record)) => {
            state.updates.broadcast(GraphUpdate::new(
                "product_synced",
                json!({ "sku": record.sku, "status": record.status }),
            ));
            (
                StatusCode::OK,
                Json(message_envelope(&format!("Product {} synced", record.sku))),
            )
                .into_response()
        }
        Ok(SyncOutcome::Unchanged(sku)) => (
            StatusCode::OK,
            Json(message_envelope(&format!("Product {} unchanged", sku))),
        )
            .into_response(),
        Err(e) => internal_error("Error syncing product", e),
    }
}

async fn handle_sync_status(State(state): State<AppState>) -> Response {
    let total = state.store.count(None).await;
    let active = state.store.count(Some("active".to_string())).await;

    match (total, active) {
        (Ok(total), Ok(active)) => (
            StatusCode::OK,
            Json(envelope(json!({
                "stats": {
                    "total_products": total,
                    "active_products": active,
                    "live_subscribers": state.updates.subscriber_count()
                },
                "last_check": Utc::now().to_rfc3339()
            }))),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => internal_error("Error fetching sync status", e),
    }
}

/// SSE stream of graph updates. The subscription travels with the stream
/// state, so a dropped connection unregisters itself.
async fn handle_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let subscription = UpdateRegistry::subscribe(&state.updates);

    let event_stream = stream::unfold(subscription, |mut subscription| async move {
        let update = subscription.receiver.recv().await?;
        let data = serde_json::to_string(&update).unwrap_or_default();
        let event = Event::default().event("graph_update").data(data);
        Some((std::result::Result::<Event, Infallible>::Ok(event), subscription))
    });

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
