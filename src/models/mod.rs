pub mod history;
pub mod location;
pub mod movement;
pub mod product;
pub mod shelf;

pub use history::{HistoryEntry, HistoryKind, NewHistoryEntry};
pub use location::{Coordinate, Location, LocationUpdate, NewLocation};
pub use movement::{InboundRequest, MoveRequest, OutboundRequest};
pub use product::{NewProduct, Product, ProductUpdate, ProductWithLocations};
pub use shelf::{ShelfConfig, ShelfConfigInput, ShelfDimensions};
