//! Typed queries over the four inventory tables.
//!
//! Every function takes any Postgres executor, so the same query runs
//! against the pool or inside an operation's transaction.

use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, DbResultExt, Operation, Resource},
    models::{
        Coordinate, HistoryEntry, Location, LocationUpdate, NewHistoryEntry, NewLocation, NewProduct,
        Product, ProductUpdate, ShelfConfig, ShelfConfigInput, ShelfDimensions,
    },
};

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

pub async fn fetch_products<'e, E: PgExecutor<'e>>(db: E) -> Result<Vec<Product>, AppError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
        .fetch_all(db)
        .await
        .on(Resource::Products, Operation::Fetch)
}

pub async fn find_product<'e, E: PgExecutor<'e>>(db: E, code: &str) -> Result<Option<Product>, AppError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE code = $1")
        .bind(code)
        .fetch_optional(db)
        .await
        .on(Resource::Products, Operation::Fetch)
}

/// Same as `find_product`, holding a row lock until the transaction ends.
pub async fn lock_product<'e, E: PgExecutor<'e>>(db: E, code: &str) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE code = $1 FOR UPDATE")
        .bind(code)
        .fetch_optional(db)
        .await
        .on(Resource::Products, Operation::Fetch)?
        .ok_or_else(|| AppError::ProductNotFound(code.to_string()))
}

pub async fn create_product<'e, E: PgExecutor<'e>>(db: E, product: &NewProduct) -> Result<Product, AppError> {
    let total_quantity = product.total_quantity()?;
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (code, name, quantity_per_case, total_cases, total_quantity, minimum_stock)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(product.code.trim())
    .bind(product.name.trim())
    .bind(product.quantity_per_case)
    .bind(product.total_cases)
    .bind(total_quantity)
    .bind(product.minimum_stock)
    .fetch_one(db)
    .await
    .on(Resource::Products, Operation::Create)
}

pub async fn update_product<'e, E: PgExecutor<'e>>(
    db: E,
    code: &str,
    update: &ProductUpdate,
) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            name = COALESCE($2, name),
            quantity_per_case = COALESCE($3, quantity_per_case),
            total_cases = COALESCE($4, total_cases),
            total_quantity = COALESCE($5, total_quantity),
            minimum_stock = COALESCE($6, minimum_stock)
        WHERE code = $1
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(update.name.as_deref().map(str::trim))
    .bind(update.quantity_per_case)
    .bind(update.total_cases)
    .bind(update.total_quantity)
    .bind(update.minimum_stock)
    .fetch_optional(db)
    .await
    .on(Resource::Products, Operation::Update)?
    .ok_or_else(|| AppError::ProductNotFound(code.to_string()))
}

/// Shifts the stored totals by the given deltas, never below zero.
pub async fn adjust_product_totals<'e, E: PgExecutor<'e>>(
    db: E,
    code: &str,
    cases: i32,
    quantity: i32,
) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            total_cases = GREATEST(total_cases + $2, 0),
            total_quantity = GREATEST(total_quantity + $3, 0)
        WHERE code = $1
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(cases)
    .bind(quantity)
    .fetch_optional(db)
    .await
    .on(Resource::Products, Operation::Update)?
    .ok_or_else(|| AppError::ProductNotFound(code.to_string()))
}

pub async fn delete_product<'e, E: PgExecutor<'e>>(db: E, code: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM products WHERE code = $1")
        .bind(code)
        .execute(db)
        .await
        .on(Resource::Products, Operation::Delete)?;

    if result.rows_affected() == 0 {
        return Err(AppError::ProductNotFound(code.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// locations
// ---------------------------------------------------------------------------

pub async fn fetch_locations<'e, E: PgExecutor<'e>>(db: E) -> Result<Vec<Location>, AppError> {
    sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY created_at DESC")
        .fetch_all(db)
        .await
        .on(Resource::Locations, Operation::Fetch)
}

pub async fn find_location<'e, E: PgExecutor<'e>>(db: E, id: Uuid) -> Result<Option<Location>, AppError> {
    sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .on(Resource::Locations, Operation::Fetch)
}

/// The product's row at `at`, if any.
pub async fn find_location_at<'e, E: PgExecutor<'e>>(
    db: E,
    product_code: &str,
    at: &Coordinate,
) -> Result<Option<Location>, AppError> {
    let rows = sqlx::query_as::<_, Location>(r#"SELECT * FROM locations WHERE product_code = $1 AND "column" = $2"#)
        .bind(product_code)
        .bind(&at.column)
        .fetch_all(db)
        .await
        .on(Resource::Locations, Operation::Fetch)?;
    Ok(rows.into_iter().find(|row| row.is_at(at)))
}

/// Every slot holding the product, locked for the rest of the transaction.
pub async fn lock_product_locations<'e, E: PgExecutor<'e>>(
    db: E,
    product_code: &str,
) -> Result<Vec<Location>, AppError> {
    sqlx::query_as::<_, Location>(
        "SELECT * FROM locations WHERE product_code = $1 ORDER BY created_at FOR UPDATE",
    )
    .bind(product_code)
    .fetch_all(db)
    .await
    .on(Resource::Locations, Operation::Fetch)
}

pub async fn create_location<'e, E: PgExecutor<'e>>(db: E, location: &NewLocation) -> Result<Location, AppError> {
    let coordinate = location.coordinate();
    sqlx::query_as::<_, Location>(
        r#"
        INSERT INTO locations (product_code, "column", position, level, cases)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(location.product_code.trim())
    .bind(&coordinate.column)
    .bind(&coordinate.position)
    .bind(&coordinate.level)
    .bind(location.cases)
    .fetch_one(db)
    .await
    .on(Resource::Locations, Operation::Create)
}

pub async fn update_location<'e, E: PgExecutor<'e>>(
    db: E,
    id: Uuid,
    update: &LocationUpdate,
) -> Result<Location, AppError> {
    let trimmed = |v: &Option<String>| v.as_deref().map(|s| s.trim().to_string());
    sqlx::query_as::<_, Location>(
        r#"
        UPDATE locations SET
            product_code = COALESCE($2, product_code),
            "column" = COALESCE($3, "column"),
            position = COALESCE($4, position),
            level = COALESCE($5, level),
            cases = COALESCE($6, cases)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(trimmed(&update.product_code))
    .bind(trimmed(&update.column))
    .bind(trimmed(&update.position))
    .bind(trimmed(&update.level))
    .bind(update.cases)
    .fetch_optional(db)
    .await
    .on(Resource::Locations, Operation::Update)?
    .ok_or_else(|| AppError::LocationNotFound(id.to_string()))
}

pub async fn set_location_cases<'e, E: PgExecutor<'e>>(db: E, id: Uuid, cases: i32) -> Result<(), AppError> {
    sqlx::query("UPDATE locations SET cases = $2 WHERE id = $1")
        .bind(id)
        .bind(cases)
        .execute(db)
        .await
        .on(Resource::Locations, Operation::Update)?;
    Ok(())
}

pub async fn delete_location<'e, E: PgExecutor<'e>>(db: E, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM locations WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .on(Resource::Locations, Operation::Delete)?;

    if result.rows_affected() == 0 {
        return Err(AppError::LocationNotFound(id.to_string()));
    }
    Ok(())
}

pub async fn count_locations_in_column<'e, E: PgExecutor<'e>>(db: E, column: &str) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM locations WHERE "column" = $1"#)
        .bind(column)
        .fetch_one(db)
        .await
        .on(Resource::Locations, Operation::Fetch)
}

// ---------------------------------------------------------------------------
// shelf configs
// ---------------------------------------------------------------------------

pub async fn fetch_shelf_configs<'e, E: PgExecutor<'e>>(db: E) -> Result<Vec<ShelfConfig>, AppError> {
    sqlx::query_as::<_, ShelfConfig>(r#"SELECT * FROM shelf_configs ORDER BY "column" ASC"#)
        .fetch_all(db)
        .await
        .on(Resource::ShelfConfigs, Operation::Fetch)
}

pub async fn find_shelf_config<'e, E: PgExecutor<'e>>(db: E, column: &str) -> Result<Option<ShelfConfig>, AppError> {
    sqlx::query_as::<_, ShelfConfig>(r#"SELECT * FROM shelf_configs WHERE "column" = $1"#)
        .bind(column)
        .fetch_optional(db)
        .await
        .on(Resource::ShelfConfigs, Operation::Fetch)
}

pub async fn create_shelf_config<'e, E: PgExecutor<'e>>(
    db: E,
    config: &ShelfConfigInput,
) -> Result<ShelfConfig, AppError> {
    sqlx::query_as::<_, ShelfConfig>(
        r#"
        INSERT INTO shelf_configs ("column", positions, levels)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(config.column.trim())
    .bind(config.positions)
    .bind(config.levels)
    .fetch_one(db)
    .await
    .on(Resource::ShelfConfigs, Operation::Create)
}

pub async fn update_shelf_config<'e, E: PgExecutor<'e>>(
    db: E,
    column: &str,
    dimensions: ShelfDimensions,
) -> Result<ShelfConfig, AppError> {
    sqlx::query_as::<_, ShelfConfig>(
        r#"
        UPDATE shelf_configs SET positions = $2, levels = $3
        WHERE "column" = $1
        RETURNING *
        "#,
    )
    .bind(column)
    .bind(dimensions.positions)
    .bind(dimensions.levels)
    .fetch_optional(db)
    .await
    .on(Resource::ShelfConfigs, Operation::Update)?
    .ok_or_else(|| AppError::ShelfNotFound(column.to_string()))
}

pub async fn upsert_shelf_config<'e, E: PgExecutor<'e>>(
    db: E,
    column: &str,
    dimensions: ShelfDimensions,
) -> Result<ShelfConfig, AppError> {
    sqlx::query_as::<_, ShelfConfig>(
        r#"
        INSERT INTO shelf_configs ("column", positions, levels)
        VALUES ($1, $2, $3)
        ON CONFLICT ("column") DO UPDATE
            SET positions = EXCLUDED.positions, levels = EXCLUDED.levels
        RETURNING *
        "#,
    )
    .bind(column.trim())
    .bind(dimensions.positions)
    .bind(dimensions.levels)
    .fetch_one(db)
    .await
    .on(Resource::ShelfConfigs, Operation::Update)
}

pub async fn delete_shelf_config<'e, E: PgExecutor<'e>>(db: E, column: &str) -> Result<(), AppError> {
    let result = sqlx::query(r#"DELETE FROM shelf_configs WHERE "column" = $1"#)
        .bind(column)
        .execute(db)
        .await
        .on(Resource::ShelfConfigs, Operation::Delete)?;

    if result.rows_affected() == 0 {
        return Err(AppError::ShelfNotFound(column.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// inventory history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub product_code: Option<String>,
    pub limit: Option<i64>,
}

pub async fn fetch_history<'e, E: PgExecutor<'e>>(
    db: E,
    filter: &HistoryFilter,
) -> Result<Vec<HistoryEntry>, AppError> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM inventory_history");

    if let Some(code) = filter.product_code.as_deref().filter(|c| !c.is_empty()) {
        query.push(" WHERE product_code = ").push_bind(code.to_string());
    }
    query.push(" ORDER BY created_at DESC");
    if let Some(limit) = filter.limit {
        query.push(" LIMIT ").push_bind(limit);
    }

    query
        .build_query_as::<HistoryEntry>()
        .fetch_all(db)
        .await
        .on(Resource::InventoryHistory, Operation::Fetch)
}

pub async fn add_history<'e, E: PgExecutor<'e>>(db: E, entry: &NewHistoryEntry) -> Result<HistoryEntry, AppError> {
    let from = entry.from_location.as_ref();
    let to = entry.to_location.as_ref();

    sqlx::query_as::<_, HistoryEntry>(
        r#"
        INSERT INTO inventory_history (
            product_code, type, cases, quantity,
            from_column, from_position, from_level,
            to_column, to_position, to_level
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(&entry.product_code)
    .bind(entry.kind.as_str())
    .bind(entry.cases)
    .bind(entry.quantity)
    .bind(from.map(|c| c.column.clone()))
    .bind(from.map(|c| c.position.clone()))
    .bind(from.map(|c| c.level.clone()))
    .bind(to.map(|c| c.column.clone()))
    .bind(to.map(|c| c.position.clone()))
    .bind(to.map(|c| c.level.clone()))
    .fetch_one(db)
    .await
    .on(Resource::InventoryHistory, Operation::Create)
}
