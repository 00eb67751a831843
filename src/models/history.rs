use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Inbound,
    Outbound,
    Move,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Inbound => "inbound",
            HistoryKind::Outbound => "outbound",
            HistoryKind::Move => "move",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(HistoryKind::Inbound),
            "outbound" => Some(HistoryKind::Outbound),
            "move" => Some(HistoryKind::Move),
            _ => None,
        }
    }
}

/// One row of the append-only inventory log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub product_code: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub cases: i32,
    pub quantity: i32,
    pub from_column: Option<String>,
    pub from_position: Option<String>,
    pub from_level: Option<String>,
    pub to_column: Option<String>,
    pub to_position: Option<String>,
    pub to_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn kind(&self) -> Option<HistoryKind> {
        HistoryKind::parse(&self.kind)
    }

    pub fn from_location(&self) -> Option<Coordinate> {
        coordinate(&self.from_column, &self.from_position, &self.from_level)
    }

    pub fn to_location(&self) -> Option<Coordinate> {
        coordinate(&self.to_column, &self.to_position, &self.to_level)
    }
}

fn coordinate(column: &Option<String>, position: &Option<String>, level: &Option<String>) -> Option<Coordinate> {
    match (column, position, level) {
        (Some(c), Some(p), Some(l)) => Some(Coordinate::new(c, p, l)),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub product_code: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub cases: i32,
    pub quantity: i32,
    pub from_location: Option<Coordinate>,
    pub to_location: Option<Coordinate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_its_column_text() {
        for kind in [HistoryKind::Inbound, HistoryKind::Outbound, HistoryKind::Move] {
            assert_eq!(HistoryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(HistoryKind::parse("adjustment"), None);
    }

    #[test]
    fn partial_coordinates_are_dropped() {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            product_code: "PRD001".to_string(),
            kind: "outbound".to_string(),
            cases: 2,
            quantity: 48,
            from_column: Some("A".to_string()),
            from_position: Some("1".to_string()),
            from_level: Some("2".to_string()),
            to_column: Some("B".to_string()),
            to_position: None,
            to_level: None,
            created_at: Utc::now(),
        };

        assert_eq!(entry.kind(), Some(HistoryKind::Outbound));
        assert_eq!(entry.from_location(), Some(Coordinate::new("A", "1", "2")));
        assert_eq!(entry.to_location(), None);
    }
}
