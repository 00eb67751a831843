use axum::{
    extract::{Form, Path, State},
    response::{Html, Redirect},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use super::{non_blank, parse_count, redirect_error, redirect_with, render};
use crate::{
    app::AppState,
    error::{AppError, Resource},
    filters,
    flash::{take_notice, Notice},
    models::{Location, LocationUpdate, NewLocation, Product},
    repository,
};

/// A location row joined with its product name for display.
pub struct LocationRow {
    pub location: Location,
    pub product_name: String,
}

#[derive(Template)]
#[template(path = "locations/list.html")]
struct LocationsTemplate {
    notice: Option<Notice>,
    locations: Vec<LocationRow>,
}

#[derive(Template)]
#[template(path = "locations/form.html")]
struct LocationFormTemplate {
    notice: Option<Notice>,
    location: Option<Location>,
    products: Vec<Product>,
    columns: Vec<String>,
}

#[derive(Deserialize)]
pub struct LocationForm {
    product_code: Option<String>,
    column: Option<String>,
    position: Option<String>,
    level: Option<String>,
    cases: Option<String>,
}

impl LocationForm {
    fn into_new_location(self) -> Result<NewLocation, AppError> {
        Ok(NewLocation {
            product_code: self.product_code.unwrap_or_default(),
            column: self.column.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            level: self.level.unwrap_or_default(),
            cases: parse_count(self.cases.as_deref())?.ok_or(AppError::InvalidQuantity)?,
        })
    }

    fn into_update(self) -> Result<LocationUpdate, AppError> {
        Ok(LocationUpdate {
            product_code: non_blank(self.product_code),
            column: non_blank(self.column),
            position: non_blank(self.position),
            level: non_blank(self.level),
            cases: parse_count(self.cases.as_deref())?,
        })
    }
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::LocationNotFound(id.to_string()))
}

async fn form_template(
    state: &AppState,
    notice: Option<Notice>,
    location: Option<Location>,
) -> LocationFormTemplate {
    let snapshot = state.store.snapshot().await;
    LocationFormTemplate {
        notice,
        location,
        products: snapshot.products,
        columns: snapshot.shelf_configs.into_keys().collect(),
    }
}

// Locations List
pub async fn locations_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Html<String>, AppError> {
    let snapshot = state.store.snapshot().await;
    let locations = snapshot
        .locations
        .iter()
        .map(|location| LocationRow {
            product_name: snapshot
                .products
                .iter()
                .find(|p| p.code == location.product_code)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            location: location.clone(),
        })
        .collect();

    render(LocationsTemplate {
        notice: take_notice(&cookies),
        locations,
    })
}

// Location Form (New)
pub async fn location_form(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Html<String>, AppError> {
    let notice = take_notice(&cookies);
    render(form_template(&state, notice, None).await)
}

// Location Form (Edit)
pub async fn location_edit_form(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(id): Path<String>,
) -> Result<Html<String>, Redirect> {
    let page = async {
        let location = repository::find_location(&state.db, parse_id(&id)?)
            .await?
            .ok_or_else(|| AppError::LocationNotFound(id.clone()))?;

        let notice = take_notice(&cookies);
        render(form_template(&state, notice, Some(location)).await)
    }
    .await;

    page.map_err(|err| redirect_error(&cookies, err, "/locations"))
}

// Create Location
pub async fn create_location(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LocationForm>,
) -> Redirect {
    let result = async {
        let location = form.into_new_location()?;
        location.validate()?;
        let at = location.coordinate();
        if repository::find_location_at(&state.db, location.product_code.trim(), &at)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(format!(
                "{} is already stored at {}. Use an inbound receipt to add cases.",
                location.product_code.trim(),
                at
            )));
        }
        repository::create_location(&state.db, &location).await
    }
    .await;

    match result {
        Ok(location) => {
            state.store.refresh(Resource::Locations).await;
            log::info!("Added location {} for {}", location.id, location.product_code);
            redirect_with(
                &cookies,
                Notice::success("Location added", format!("Stored at {}.", location.coordinate())),
                "/locations",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/locations/new"),
    }
}

// Update Location
pub async fn update_location(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(id): Path<String>,
    Form(form): Form<LocationForm>,
) -> Redirect {
    let result = async {
        let id = parse_id(&id)?;
        let update = form.into_update()?;
        update.validate()?;
        repository::update_location(&state.db, id, &update).await
    }
    .await;

    match result {
        Ok(location) => {
            state.store.refresh(Resource::Locations).await;
            redirect_with(
                &cookies,
                Notice::success("Location updated", format!("Now at {}.", location.coordinate())),
                "/locations",
            )
        }
        Err(err) => redirect_error(&cookies, err, &format!("/locations/{}/edit", urlencoding::encode(&id))),
    }
}

// Delete Location
pub async fn delete_location(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(id): Path<String>,
) -> Redirect {
    let result = async { repository::delete_location(&state.db, parse_id(&id)?).await }.await;

    match result {
        Ok(()) => {
            state.store.refresh(Resource::Locations).await;
            redirect_with(
                &cookies,
                Notice::success("Location deleted", "The location was removed."),
                "/locations",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/locations"),
    }
}
