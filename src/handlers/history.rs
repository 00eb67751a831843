use axum::{
    extract::{Query, State},
    response::Html,
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;

use super::{non_blank, render};
use crate::{
    app::AppState,
    error::AppError,
    filters,
    flash::{take_notice, Notice},
    models::{HistoryEntry, Product},
    repository::{self, HistoryFilter},
};

const HISTORY_PAGE_LIMIT: i64 = 200;

#[derive(Template)]
#[template(path = "history/list.html")]
struct HistoryTemplate {
    notice: Option<Notice>,
    entries: Vec<HistoryEntry>,
    products: Vec<Product>,
    product_filter: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    product: Option<String>,
}

// Inventory History
pub async fn history_list(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<HistoryQuery>,
) -> Result<Html<String>, AppError> {
    let product_code = non_blank(query.product).map(|code| code.trim().to_string());
    let filter = HistoryFilter {
        product_code: product_code.clone(),
        limit: Some(HISTORY_PAGE_LIMIT),
    };
    let entries = repository::fetch_history(&state.db, &filter).await?;
    let snapshot = state.store.snapshot().await;

    render(HistoryTemplate {
        notice: take_notice(&cookies),
        entries,
        products: snapshot.products,
        product_filter: product_code.unwrap_or_default(),
    })
}
