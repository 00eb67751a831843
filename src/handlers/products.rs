use axum::{
    extract::{Form, Path, State},
    response::{Html, Redirect},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;

use super::{non_blank, parse_count, redirect_error, redirect_with, render};
use crate::{
    app::AppState,
    error::{AppError, Resource},
    flash::{take_notice, Notice},
    inventory,
    models::{NewProduct, Product, ProductUpdate, ProductWithLocations},
    repository,
};

#[derive(Template)]
#[template(path = "products/list.html")]
struct ProductsTemplate {
    notice: Option<Notice>,
    products: Vec<ProductWithLocations>,
}

#[derive(Template)]
#[template(path = "products/form.html")]
struct ProductFormTemplate {
    notice: Option<Notice>,
    product: Option<Product>,
}

// HTML number inputs arrive as strings, possibly empty.
#[derive(Deserialize)]
pub struct ProductForm {
    code: Option<String>,
    name: String,
    quantity_per_case: Option<String>,
    total_cases: Option<String>,
    total_quantity: Option<String>,
    minimum_stock: Option<String>,
}

impl ProductForm {
    fn into_new_product(self) -> Result<NewProduct, AppError> {
        Ok(NewProduct {
            code: self.code.unwrap_or_default(),
            name: self.name,
            quantity_per_case: parse_count(self.quantity_per_case.as_deref())?
                .ok_or(AppError::InvalidQuantity)?,
            total_cases: parse_count(self.total_cases.as_deref())?.unwrap_or(0),
            total_quantity: parse_count(self.total_quantity.as_deref())?,
            minimum_stock: parse_count(self.minimum_stock.as_deref())?.unwrap_or(0),
        })
    }

    fn into_update(self) -> Result<ProductUpdate, AppError> {
        Ok(ProductUpdate {
            name: non_blank(Some(self.name)),
            quantity_per_case: parse_count(self.quantity_per_case.as_deref())?,
            total_cases: parse_count(self.total_cases.as_deref())?,
            total_quantity: parse_count(self.total_quantity.as_deref())?,
            minimum_stock: parse_count(self.minimum_stock.as_deref())?,
        })
    }
}

// Products List
pub async fn products_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Html<String>, AppError> {
    let snapshot = state.store.snapshot().await;
    render(ProductsTemplate {
        notice: take_notice(&cookies),
        products: snapshot.products_with_locations(),
    })
}

// Product Form (New)
pub async fn product_form(cookies: Cookies) -> Result<Html<String>, AppError> {
    render(ProductFormTemplate {
        notice: take_notice(&cookies),
        product: None,
    })
}

// Product Form (Edit)
pub async fn product_edit_form(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(code): Path<String>,
) -> Result<Html<String>, Redirect> {
    let page = async {
        let product = repository::find_product(&state.db, &code)
            .await?
            .ok_or_else(|| AppError::ProductNotFound(code.clone()))?;

        render(ProductFormTemplate {
            notice: take_notice(&cookies),
            product: Some(product),
        })
    }
    .await;

    page.map_err(|err| redirect_error(&cookies, err, "/products"))
}

// Create Product
pub async fn create_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<ProductForm>,
) -> Redirect {
    let result = async {
        let product = form.into_new_product()?;
        product.validate()?;
        repository::create_product(&state.db, &product).await
    }
    .await;

    match result {
        Ok(product) => {
            state.store.refresh(Resource::Products).await;
            log::info!("Registered product {}", product.code);
            redirect_with(
                &cookies,
                Notice::success("Product registered", format!("Registered {}.", product.name)),
                "/products",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/products/new"),
    }
}

// Update Product
pub async fn update_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(code): Path<String>,
    Form(form): Form<ProductForm>,
) -> Redirect {
    let result = async {
        let update = form.into_update()?;
        update.validate()?;
        repository::update_product(&state.db, &code, &update).await
    }
    .await;

    match result {
        Ok(product) => {
            state.store.refresh(Resource::Products).await;
            redirect_with(
                &cookies,
                Notice::success("Product updated", format!("Updated {}.", product.name)),
                "/products",
            )
        }
        Err(err) => redirect_error(&cookies, err, &format!("/products/{}/edit", urlencoding::encode(&code))),
    }
}

// Delete Product
pub async fn delete_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(code): Path<String>,
) -> Redirect {
    match repository::delete_product(&state.db, &code).await {
        Ok(()) => {
            state.store.refresh_all().await;
            log::info!("Deleted product {}", code);
            redirect_with(
                &cookies,
                Notice::success("Product deleted", format!("Deleted {}.", code)),
                "/products",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/products"),
    }
}

// Recalculate Product Totals
pub async fn recalculate_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(code): Path<String>,
) -> Redirect {
    match inventory::recalculate_totals(&state.db, &code).await {
        Ok(product) => {
            state.store.refresh(Resource::Products).await;
            redirect_with(
                &cookies,
                Notice::success(
                    "Totals recalculated",
                    format!("{} now holds {} cases.", product.name, product.total_cases),
                ),
                "/products",
            )
        }
        Err(err) => redirect_error(&cookies, err, "/products"),
    }
}
