pub mod api;
pub mod history;
pub mod locations;
pub mod products;
pub mod shelves;

use axum::{
    extract::State,
    response::{Html, Redirect},
};
use askama::Template;
use tower_cookies::Cookies;

use crate::{
    app::AppState,
    error::AppError,
    filters,
    flash::{set_notice, take_notice, Notice},
    models::{HistoryEntry, Product},
};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    notice: Option<Notice>,
    product_count: usize,
    location_count: usize,
    column_count: usize,
    stored_cases: i64,
    low_stock: Vec<Product>,
    recent_history: Vec<HistoryEntry>,
    loaded_at: String,
}

const RECENT_HISTORY: usize = 10;

pub fn render<T: Template>(template: T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// Stores the notice for the next page and redirects there.
pub fn redirect_with(cookies: &Cookies, notice: Notice, to: &str) -> Redirect {
    set_notice(cookies, notice);
    Redirect::to(to)
}

/// Logs a failed form submission and bounces back with its message.
pub fn redirect_error(cookies: &Cookies, err: AppError, to: &str) -> Redirect {
    err.log();
    redirect_with(cookies, err.notice(), to)
}

/// Parses a whole-number form field; blank counts as absent.
pub fn parse_count(value: Option<&str>) -> Result<Option<i32>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<i32>().map(Some).map_err(|_| AppError::InvalidQuantity),
    }
}

/// Drops blank optional form fields.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Html<String>, AppError> {
    let snapshot = state.store.snapshot().await;

    let template = DashboardTemplate {
        notice: take_notice(&cookies),
        product_count: snapshot.products.len(),
        location_count: snapshot.locations.len(),
        column_count: snapshot.shelf_configs.len(),
        stored_cases: snapshot.total_cases(),
        low_stock: snapshot.low_stock().into_iter().cloned().collect(),
        recent_history: snapshot.history.iter().take(RECENT_HISTORY).cloned().collect(),
        loaded_at: snapshot
            .loaded_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string()),
    };
    render(template)
}
