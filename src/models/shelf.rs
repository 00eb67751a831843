use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Grid dimensions of one shelf column.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShelfConfig {
    pub column: String,
    pub positions: i32,
    pub levels: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfDimensions {
    pub positions: i32,
    pub levels: i32,
}

impl ShelfDimensions {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.positions <= 0 || self.levels <= 0 {
            return Err(AppError::InvalidShelfConfig);
        }
        Ok(())
    }
}

impl From<&ShelfConfig> for ShelfDimensions {
    fn from(config: &ShelfConfig) -> Self {
        Self {
            positions: config.positions,
            levels: config.levels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfConfigInput {
    pub column: String,
    pub positions: i32,
    pub levels: i32,
}

impl ShelfConfigInput {
    pub fn dimensions(&self) -> ShelfDimensions {
        ShelfDimensions {
            positions: self.positions,
            levels: self.levels,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.column.trim().is_empty() {
            return Err(AppError::InvalidShelfConfig);
        }
        self.dimensions().validate()
    }
}
