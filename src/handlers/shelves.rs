use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, Redirect},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;

use super::{parse_count, redirect_error, redirect_with, render};
use crate::{
    app::AppState,
    error::{AppError, Resource},
    filters,
    flash::{take_notice, Notice},
    inventory,
    models::{
        Coordinate, InboundRequest, MoveRequest, OutboundRequest, Product, ShelfConfig,
        ShelfConfigInput, ShelfDimensions,
    },
    repository,
    shelf::{self, ShelfGrid},
};

#[derive(Template)]
#[template(path = "shelves/view.html")]
struct ShelfTemplate {
    notice: Option<Notice>,
    grid: ShelfGrid,
    products: Vec<Product>,
    column_names: Vec<String>,
    full_threshold: i32,
    scroll_left: i32,
    scroll_top: i32,
}

pub struct ShelfConfigRow {
    pub config: ShelfConfig,
    pub stored: usize,
}

#[derive(Template)]
#[template(path = "shelves/configs.html")]
struct ShelfConfigsTemplate {
    notice: Option<Notice>,
    configs: Vec<ShelfConfigRow>,
}

#[derive(Template)]
#[template(path = "shelves/config_form.html")]
struct ShelfConfigFormTemplate {
    notice: Option<Notice>,
    config: Option<ShelfConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShelfQuery {
    q: Option<String>,
    column: Option<String>,
    position: Option<String>,
    level: Option<String>,
}

impl ShelfQuery {
    fn term(&self) -> &str {
        self.q.as_deref().unwrap_or("").trim()
    }

    /// The selected slot, when all three parts are given.
    fn selected(&self) -> Option<Coordinate> {
        let coordinate = Coordinate::new(
            self.column.as_deref()?,
            self.position.as_deref()?,
            self.level.as_deref()?,
        );
        (!coordinate.is_blank()).then_some(coordinate)
    }
}

/// Slot forms post the coordinate plus the search term to return to.
#[derive(Deserialize)]
pub struct SlotForm {
    product_code: String,
    column: String,
    position: String,
    level: String,
    cases: Option<String>,
    #[serde(default)]
    q: String,
}

impl SlotForm {
    fn cases(&self) -> Result<i32, AppError> {
        parse_count(self.cases.as_deref())?.ok_or(AppError::InvalidQuantity)
    }

    fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.column, &self.position, &self.level)
    }

    fn back(&self) -> String {
        shelf::slot_href(self.q.trim(), &self.coordinate())
    }
}

#[derive(Deserialize)]
pub struct MoveForm {
    product_code: String,
    from_column: String,
    from_position: String,
    from_level: String,
    to_column: String,
    to_position: String,
    to_level: String,
    cases: Option<String>,
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
pub struct ShelfConfigForm {
    column: Option<String>,
    positions: Option<String>,
    levels: Option<String>,
}

impl ShelfConfigForm {
    fn dimensions(&self) -> Result<ShelfDimensions, AppError> {
        let parse = |value: Option<&str>| {
            parse_count(value)
                .ok()
                .flatten()
                .ok_or(AppError::InvalidShelfConfig)
        };
        let dimensions = ShelfDimensions {
            positions: parse(self.positions.as_deref())?,
            levels: parse(self.levels.as_deref())?,
        };
        dimensions.validate()?;
        Ok(dimensions)
    }
}

// Shelf View
pub async fn shelf_view(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<ShelfQuery>,
) -> Result<Html<String>, AppError> {
    let snapshot = state.store.snapshot().await;
    let threshold = state.config.full_shelf_threshold;
    let selected = query.selected();
    let column_names = shelf::columns(&snapshot.shelf_configs);

    let (scroll_left, scroll_top) = selected
        .as_ref()
        .and_then(|at| shelf::scroll_offset(&column_names, at))
        .unwrap_or((0, 0));
    let grid = ShelfGrid::build(&snapshot, query.term(), selected, threshold);

    render(ShelfTemplate {
        notice: take_notice(&cookies),
        grid,
        products: snapshot.products,
        column_names,
        full_threshold: threshold,
        scroll_left,
        scroll_top,
    })
}

// Outbound Shipment
pub async fn outbound(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<SlotForm>,
) -> Redirect {
    let back = form.back();
    let result = async {
        let request = OutboundRequest {
            cases: form.cases()?,
            product_code: form.product_code,
            column: form.column,
            position: form.position,
            level: form.level,
        };
        inventory::ship_outbound(&state.db, &request).await
    }
    .await;

    match result {
        Ok(outcome) => {
            state.store.refresh_stock().await;
            redirect_with(&cookies, outcome.notice(), &back)
        }
        Err(err) => redirect_error(&cookies, err, &back),
    }
}

// Inbound Receipt
pub async fn inbound(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<SlotForm>,
) -> Redirect {
    let back = form.back();
    let result = async {
        let request = InboundRequest {
            cases: form.cases()?,
            product_code: form.product_code,
            column: form.column,
            position: form.position,
            level: form.level,
        };
        inventory::receive_inbound(&state.db, &request).await
    }
    .await;

    match result {
        Ok(outcome) => {
            state.store.refresh_stock().await;
            redirect_with(&cookies, outcome.notice(), &back)
        }
        Err(err) => redirect_error(&cookies, err, &back),
    }
}

// Move Stock
pub async fn move_stock(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<MoveForm>,
) -> Redirect {
    let from = Coordinate::new(&form.from_column, &form.from_position, &form.from_level);
    let to = Coordinate::new(&form.to_column, &form.to_position, &form.to_level);
    let term = form.q.trim().to_string();

    let result = async {
        let request = MoveRequest {
            cases: parse_count(form.cases.as_deref())?.ok_or(AppError::InvalidQuantity)?,
            product_code: form.product_code,
            from_column: form.from_column,
            from_position: form.from_position,
            from_level: form.from_level,
            to_column: form.to_column,
            to_position: form.to_position,
            to_level: form.to_level,
        };
        inventory::move_stock(&state.db, &request).await
    }
    .await;

    match result {
        Ok(outcome) => {
            state.store.refresh_stock().await;
            redirect_with(&cookies, outcome.notice(), &shelf::slot_href(&term, &to))
        }
        Err(err) => redirect_error(&cookies, err, &shelf::slot_href(&term, &from)),
    }
}

// Shelf Configs List
pub async fn configs_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Html<String>, AppError> {
    let snapshot = state.store.snapshot().await;
    let configs = snapshot
        .shelf_configs
        .values()
        .map(|config| ShelfConfigRow {
            stored: snapshot.locations_in_column(&config.column),
            config: config.clone(),
        })
        .collect();

    render(ShelfConfigsTemplate {
        notice: take_notice(&cookies),
        configs,
    })
}

// Shelf Config Form (New)
pub async fn config_form(cookies: Cookies) -> Result<Html<String>, AppError> {
    render(ShelfConfigFormTemplate {
        notice: take_notice(&cookies),
        config: None,
    })
}

// Shelf Config Form (Edit)
pub async fn config_edit_form(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(column): Path<String>,
) -> Result<Html<String>, Redirect> {
    let page = async {
        let config = repository::find_shelf_config(&state.db, &column)
            .await?
            .ok_or_else(|| AppError::ShelfNotFound(column.clone()))?;

        render(ShelfConfigFormTemplate {
            notice: take_notice(&cookies),
            config: Some(config),
        })
    }
    .await;

    page.map_err(|err| redirect_error(&cookies, err, "/shelves/configs"))
}

// Create Shelf Config
pub async fn create_config(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<ShelfConfigForm>,
) -> Redirect {
    let result = async {
        let dimensions = form.dimensions()?;
        let input = ShelfConfigInput {
            column: form.column.clone().unwrap_or_default(),
            positions: dimensions.positions,
            levels: dimensions.levels,
        };
        input.validate()?;
        repository::create_shelf_config(&state.db, &input).await
    }
    .await;

    match result {
        Ok(config) => {
            state.store.refresh(Resource::ShelfConfigs).await;
            log::info!("Configured shelf column {}", config.column);
            redirect_with(
                &cookies,
                Notice::success(
                    "Shelf column added",
                    format!(
                        "Column {} has {} positions and {} levels.",
                        config.column, config.positions, config.levels
                    ),
                ),
                "/shelves/configs",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/shelves/configs/new"),
    }
}

// Update Shelf Config
pub async fn update_config(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(column): Path<String>,
    Form(form): Form<ShelfConfigForm>,
) -> Redirect {
    let result = async {
        let dimensions = form.dimensions()?;
        repository::update_shelf_config(&state.db, &column, dimensions).await
    }
    .await;

    match result {
        Ok(config) => {
            state.store.refresh(Resource::ShelfConfigs).await;
            redirect_with(
                &cookies,
                Notice::success(
                    "Shelf column updated",
                    format!(
                        "Column {} has {} positions and {} levels.",
                        config.column, config.positions, config.levels
                    ),
                ),
                "/shelves/configs",
            )
        }
        Err(err) => redirect_error(
            &cookies,
            err,
            &format!("/shelves/configs/{}/edit", urlencoding::encode(&column)),
        ),
    }
}

// Delete Shelf Config
pub async fn delete_config(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(column): Path<String>,
) -> Redirect {
    match inventory::remove_shelf_column(&state.db, &column).await {
        Ok(()) => {
            state.store.refresh(Resource::ShelfConfigs).await;
            log::info!("Removed shelf column {}", column);
            redirect_with(
                &cookies,
                Notice::success("Shelf column deleted", format!("Column {} was removed.", column)),
                "/shelves/configs",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/shelves/configs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_needs_every_part() {
        let query = ShelfQuery {
            column: Some("A".into()),
            position: Some("1".into()),
            ..Default::default()
        };
        assert_eq!(query.selected(), None);

        let query = ShelfQuery {
            column: Some("A".into()),
            position: Some("1".into()),
            level: Some(" 2 ".into()),
            q: Some(" tea ".into()),
        };
        assert_eq!(query.selected(), Some(Coordinate::new("A", "1", "2")));
        assert_eq!(query.term(), "tea");
    }

    #[test]
    fn shelf_config_form_rejects_bad_dimensions() {
        let form = |positions: &str, levels: &str| ShelfConfigForm {
            column: Some("C".into()),
            positions: Some(positions.into()),
            levels: Some(levels.into()),
        };
        assert_eq!(
            form("5", "3").dimensions().unwrap(),
            ShelfDimensions { positions: 5, levels: 3 }
        );
        assert!(matches!(form("0", "3").dimensions(), Err(AppError::InvalidShelfConfig)));
        assert!(matches!(form("", "3").dimensions(), Err(AppError::InvalidShelfConfig)));
        assert!(matches!(form("x", "3").dimensions(), Err(AppError::InvalidShelfConfig)));
    }

    #[test]
    fn slot_forms_return_to_the_slot() {
        let form = SlotForm {
            product_code: "PRD001".into(),
            column: "A".into(),
            position: "1".into(),
            level: "1".into(),
            cases: Some("".into()),
            q: "coffee".into(),
        };
        assert_eq!(form.back(), "/shelves?q=coffee&column=A&position=1&level=1#slot-A-1-1");
        assert!(matches!(form.cases(), Err(AppError::InvalidQuantity)));
    }
}
