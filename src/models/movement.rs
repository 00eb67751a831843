use serde::{Deserialize, Serialize};

use super::Coordinate;

/// Ship cases out of one slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub product_code: String,
    pub column: String,
    pub position: String,
    pub level: String,
    pub cases: i32,
}

impl OutboundRequest {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.column, &self.position, &self.level)
    }
}

/// Receive cases into one slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundRequest {
    pub product_code: String,
    pub column: String,
    pub position: String,
    pub level: String,
    pub cases: i32,
}

impl InboundRequest {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.column, &self.position, &self.level)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub product_code: String,
    pub from_column: String,
    pub from_position: String,
    pub from_level: String,
    pub to_column: String,
    pub to_position: String,
    pub to_level: String,
    pub cases: i32,
}

impl MoveRequest {
    pub fn from(&self) -> Coordinate {
        Coordinate::new(&self.from_column, &self.from_position, &self.from_level)
    }

    pub fn to(&self) -> Coordinate {
        Coordinate::new(&self.to_column, &self.to_position, &self.to_level)
    }
}
