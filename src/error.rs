use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::flash::Notice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Products,
    Locations,
    ShelfConfigs,
    InventoryHistory,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Products,
        Resource::Locations,
        Resource::ShelfConfigs,
        Resource::InventoryHistory,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Locations => "locations",
            Resource::ShelfConfigs => "shelf_configs",
            Resource::InventoryHistory => "inventory_history",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.table() == table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Fetch,
}

pub const DEFAULT_MESSAGE: &str = "An unexpected error occurred.";

/// The user-facing message for a failed operation on a resource.
pub fn message(resource: Resource, operation: Operation) -> &'static str {
    use Operation::*;
    use Resource::*;

    match (resource, operation) {
        (Products, Create) => "Failed to register the product.",
        (Products, Update) => "Failed to update the product.",
        (Products, Delete) => "Failed to delete the product.",
        (Products, Fetch) => "Failed to load products.",
        (Locations, Create) => "Failed to register the storage location.",
        (Locations, Update) => "Failed to update the storage location.",
        (Locations, Delete) => "Failed to delete the storage location.",
        (Locations, Fetch) => "Failed to load storage locations.",
        (ShelfConfigs, Create) => "Failed to register the shelf configuration.",
        (ShelfConfigs, Update) => "Failed to update the shelf configuration.",
        (ShelfConfigs, Delete) => "Failed to delete the shelf configuration.",
        (ShelfConfigs, Fetch) => "Failed to load shelf configurations.",
        (InventoryHistory, Create) => "Failed to record inventory history.",
        (InventoryHistory, Update) => "Failed to update inventory history.",
        (InventoryHistory, Delete) => "Failed to delete inventory history.",
        (InventoryHistory, Fetch) => "Failed to load inventory history.",
    }
}

/// Constraint failures worth telling the user about, keyed by SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    CheckViolation,
    NotNullViolation,
    Other,
}

impl DbErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "23505" => DbErrorKind::UniqueViolation,
            "23503" => DbErrorKind::ForeignKeyViolation,
            "23514" => DbErrorKind::CheckViolation,
            "23502" => DbErrorKind::NotNullViolation,
            _ => DbErrorKind::Other,
        }
    }

    pub fn of(err: &sqlx::Error) -> Self {
        err.as_database_error()
            .and_then(|db| db.code())
            .map(|code| Self::from_code(&code))
            .unwrap_or(DbErrorKind::Other)
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            DbErrorKind::UniqueViolation => Some("The same data already exists."),
            DbErrorKind::ForeignKeyViolation => Some("The related data does not exist."),
            DbErrorKind::CheckViolation => Some("A value violates a constraint."),
            DbErrorKind::NotNullViolation => Some("A required field is missing."),
            DbErrorKind::Other => None,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            DbErrorKind::UniqueViolation => StatusCode::CONFLICT,
            DbErrorKind::ForeignKeyViolation
            | DbErrorKind::CheckViolation
            | DbErrorKind::NotNullViolation => StatusCode::UNPROCESSABLE_ENTITY,
            DbErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn database_description(resource: Resource, operation: Operation, kind: DbErrorKind) -> String {
    if resource == Resource::Products
        && operation == Operation::Create
        && kind == DbErrorKind::UniqueViolation
    {
        return "This product code is already in use.".to_string();
    }

    match kind.message() {
        Some(detail) => format!("{} {}", message(resource, operation), detail),
        None => message(resource, operation).to_string(),
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{resource:?} {operation:?} failed: {source}")]
    Database {
        resource: Resource,
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    #[error("product {0} not found")]
    ProductNotFound(String),

    #[error("no location at {0}")]
    LocationNotFound(String),

    #[error("shelf column {0} not found")]
    ShelfNotFound(String),

    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    #[error("minimum stock must not be negative")]
    InvalidMinimumStock,

    #[error("invalid storage position")]
    InvalidPosition,

    #[error("invalid shelf configuration")]
    InvalidShelfConfig,

    #[error("requested {requested} cases but only {available} are stored")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("shelf column {0} still holds inventory")]
    ShelfHasInventory(String),

    #[error("{0}")]
    Validation(String),

    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database { source, .. } => DbErrorKind::of(source).status(),
            AppError::ProductNotFound(_)
            | AppError::LocationNotFound(_)
            | AppError::ShelfNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } | AppError::ShelfHasInventory(_) => {
                StatusCode::CONFLICT
            }
            AppError::InvalidQuantity
            | AppError::InvalidMinimumStock
            | AppError::InvalidPosition
            | AppError::InvalidShelfConfig
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn description(&self) -> String {
        match self {
            AppError::Database { resource, operation, source } => {
                database_description(*resource, *operation, DbErrorKind::of(source))
            }
            AppError::ProductNotFound(_) => "The product could not be found.".to_string(),
            AppError::LocationNotFound(_) => "The storage location could not be found.".to_string(),
            AppError::ShelfNotFound(_) => "The shelf column could not be found.".to_string(),
            AppError::InvalidQuantity => "Quantities must be greater than zero.".to_string(),
            AppError::InvalidMinimumStock => "Minimum stock must be zero or greater.".to_string(),
            AppError::InvalidPosition => "The storage location is not valid.".to_string(),
            AppError::InvalidShelfConfig => "The shelf configuration is not valid.".to_string(),
            AppError::InsufficientStock { .. } => "Not enough stock at this location.".to_string(),
            AppError::ShelfHasInventory(_) => {
                "The shelf column still holds inventory and cannot be deleted.".to_string()
            }
            AppError::Validation(message) => message.clone(),
            AppError::Template(_) => DEFAULT_MESSAGE.to_string(),
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error("Error", self.description())
    }

    pub fn log(&self) {
        if self.status().is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let notice = self.notice();
        (self.status(), Json(notice)).into_response()
    }
}

/// Attaches the resource and operation to a failed query.
pub trait DbResultExt<T> {
    fn on(self, resource: Resource, operation: Operation) -> Result<T, AppError>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn on(self, resource: Resource, operation: Operation) -> Result<T, AppError> {
        self.map_err(|source| AppError::Database {
            resource,
            operation,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resource_has_a_message_per_operation() {
        let operations = [Operation::Create, Operation::Update, Operation::Delete, Operation::Fetch];
        for resource in Resource::ALL {
            for operation in operations {
                assert!(!message(resource, operation).is_empty());
            }
        }
        assert_eq!(message(Resource::Products, Operation::Fetch), "Failed to load products.");
    }

    #[test]
    fn tables_map_back_to_resources() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_table(resource.table()), Some(resource));
        }
        assert_eq!(Resource::from_table("users"), None);
    }

    #[test]
    fn sqlstate_codes_are_classified() {
        assert_eq!(DbErrorKind::from_code("23505"), DbErrorKind::UniqueViolation);
        assert_eq!(DbErrorKind::from_code("23503"), DbErrorKind::ForeignKeyViolation);
        assert_eq!(DbErrorKind::from_code("23514"), DbErrorKind::CheckViolation);
        assert_eq!(DbErrorKind::from_code("23502"), DbErrorKind::NotNullViolation);
        assert_eq!(DbErrorKind::from_code("40001"), DbErrorKind::Other);
        assert_eq!(DbErrorKind::of(&sqlx::Error::RowNotFound), DbErrorKind::Other);
    }

    #[test]
    fn duplicate_product_code_gets_its_own_message() {
        assert_eq!(
            database_description(Resource::Products, Operation::Create, DbErrorKind::UniqueViolation),
            "This product code is already in use."
        );
        assert_eq!(
            database_description(Resource::Locations, Operation::Create, DbErrorKind::ForeignKeyViolation),
            "Failed to register the storage location. The related data does not exist."
        );
        assert_eq!(
            database_description(Resource::ShelfConfigs, Operation::Delete, DbErrorKind::Other),
            "Failed to delete the shelf configuration."
        );
    }

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(AppError::ProductNotFound("X".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InsufficientStock { requested: 5, available: 2 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::InvalidQuantity.status(), StatusCode::BAD_REQUEST);

        let db = Err::<(), _>(sqlx::Error::RowNotFound)
            .on(Resource::Products, Operation::Update)
            .unwrap_err();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(db.description(), "Failed to update the product.");
    }
}
