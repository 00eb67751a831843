use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Address of a physical storage slot: shelf column, position along the
/// column, and level from the floor up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub column: String,
    pub position: String,
    pub level: String,
}

impl Coordinate {
    pub fn new(column: impl Into<String>, position: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            column: column.into().trim().to_string(),
            position: position.into().trim().to_string(),
            level: level.into().trim().to_string(),
        }
    }

    pub fn position_number(&self) -> Option<i32> {
        self.position.parse().ok()
    }

    pub fn level_number(&self) -> Option<i32> {
        self.level.parse().ok()
    }

    /// Positions and levels are stored as text, so "03" and "3" name the
    /// same slot.
    pub fn matches(&self, other: &Coordinate) -> bool {
        self.column == other.column
            && same_index(&self.position, &other.position)
            && same_index(&self.level, &other.level)
    }

    pub fn is_blank(&self) -> bool {
        self.column.is_empty() || self.position.is_empty() || self.level.is_empty()
    }
}

fn same_index(a: &str, b: &str) -> bool {
    match (a.trim().parse::<i32>(), b.trim().parse::<i32>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}, position {}, level {}", self.column, self.position, self.level)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub product_code: String,
    pub column: String,
    pub position: String,
    pub level: String,
    pub cases: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.column, &self.position, &self.level)
    }

    pub fn is_at(&self, coordinate: &Coordinate) -> bool {
        self.coordinate().matches(coordinate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLocation {
    pub product_code: String,
    pub column: String,
    pub position: String,
    pub level: String,
    pub cases: i32,
}

impl NewLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.column, &self.position, &self.level)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.product_code.trim().is_empty() || self.coordinate().is_blank() {
            return Err(AppError::InvalidPosition);
        }
        if self.cases <= 0 {
            return Err(AppError::InvalidQuantity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub product_code: Option<String>,
    pub column: Option<String>,
    pub position: Option<String>,
    pub level: Option<String>,
    pub cases: Option<i32>,
}

impl LocationUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let blank = |v: &Option<String>| matches!(v, Some(s) if s.trim().is_empty());
        if blank(&self.product_code) || blank(&self.column) || blank(&self.position) || blank(&self.level) {
            return Err(AppError::InvalidPosition);
        }
        if matches!(self.cases, Some(c) if c <= 0) {
            return Err(AppError::InvalidQuantity);
        }
        Ok(())
    }
}
