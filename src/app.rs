use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::Config,
    database::Database,
    handlers,
    realtime::ChangeFeed,
    store::InventoryStore,
};

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: InventoryStore,
    pub feed: ChangeFeed,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            store: InventoryStore::new(db.clone()),
            feed: ChangeFeed::default(),
            config: Arc::new(config),
            db,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard))

        // Products
        .route("/products", get(handlers::products::products_list))
        .route("/products", post(handlers::products::create_product))
        .route("/products/new", get(handlers::products::product_form))
        .route("/products/:code", post(handlers::products::update_product))
        .route("/products/:code/edit", get(handlers::products::product_edit_form))
        .route("/products/:code/delete", post(handlers::products::delete_product))
        .route("/products/:code/recalculate", post(handlers::products::recalculate_product))

        // Locations
        .route("/locations", get(handlers::locations::locations_list))
        .route("/locations", post(handlers::locations::create_location))
        .route("/locations/new", get(handlers::locations::location_form))
        .route("/locations/:id", post(handlers::locations::update_location))
        .route("/locations/:id/edit", get(handlers::locations::location_edit_form))
        .route("/locations/:id/delete", post(handlers::locations::delete_location))

        // Shelves
        .route("/shelves", get(handlers::shelves::shelf_view))
        .route("/shelves/outbound", post(handlers::shelves::outbound))
        .route("/shelves/inbound", post(handlers::shelves::inbound))
        .route("/shelves/move", post(handlers::shelves::move_stock))
        .route("/shelves/configs", get(handlers::shelves::configs_list))
        .route("/shelves/configs", post(handlers::shelves::create_config))
        .route("/shelves/configs/new", get(handlers::shelves::config_form))
        .route("/shelves/configs/:column", post(handlers::shelves::update_config))
        .route("/shelves/configs/:column/edit", get(handlers::shelves::config_edit_form))
        .route("/shelves/configs/:column/delete", post(handlers::shelves::delete_config))

        // History
        .route("/history", get(handlers::history::history_list))

        // API routes
        .route("/api/health", get(handlers::api::health))
        .route("/api/products", get(handlers::api::list_products))
        .route("/api/products/:code", get(handlers::api::get_product))
        .route("/api/locations", get(handlers::api::list_locations))
        .route("/api/shelf-configs", get(handlers::api::list_shelf_configs))
        .route("/api/shelf-configs/:column", put(handlers::api::put_shelf_config))
        .route("/api/history", get(handlers::api::list_history))
        .route("/api/shelves/stock", get(handlers::api::shelf_stock))
        .route("/api/shelves/search", get(handlers::api::shelf_search))
        .route("/api/shipments/outbound", post(handlers::api::ship_outbound))
        .route("/api/shipments/inbound", post(handlers::api::receive_inbound))
        .route("/api/shipments/move", post(handlers::api::move_stock))
        .route("/api/changes", get(handlers::api::changes))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(state)
}
