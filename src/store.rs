//! In-process mirror of the inventory tables.
//!
//! Reads for the dashboard and the shelf view come from here. The mirror is
//! never patched incrementally: any change to a table refetches that whole
//! table, and the latest refetch wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    database::Database,
    error::{message, AppError, Operation, Resource},
    models::{HistoryEntry, Location, Product, ProductWithLocations, ShelfConfig},
    repository::{self, HistoryFilter},
};

/// Most recent history rows kept in the mirror; the history page queries
/// the database directly for anything older.
const HISTORY_MIRROR_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub locations: Vec<Location>,
    pub shelf_configs: BTreeMap<String, ShelfConfig>,
    pub history: Vec<HistoryEntry>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Products in mirror order, each with the locations holding it.
    pub fn products_with_locations(&self) -> Vec<ProductWithLocations> {
        let mut by_product: BTreeMap<&str, Vec<Location>> = BTreeMap::new();
        for location in &self.locations {
            by_product
                .entry(location.product_code.as_str())
                .or_default()
                .push(location.clone());
        }

        self.products
            .iter()
            .map(|product| ProductWithLocations {
                product: product.clone(),
                locations: by_product.remove(product.code.as_str()).unwrap_or_default(),
            })
            .collect()
    }

    pub fn product(&self, code: &str) -> Option<ProductWithLocations> {
        let product = self.products.iter().find(|p| p.code == code)?;
        Some(ProductWithLocations {
            product: product.clone(),
            locations: self
                .locations
                .iter()
                .filter(|loc| loc.product_code == code)
                .cloned()
                .collect(),
        })
    }

    /// Products whose total quantity has fallen below their minimum stock.
    pub fn low_stock(&self) -> Vec<&Product> {
        self.products.iter().filter(|p| p.is_below_minimum()).collect()
    }

    pub fn locations_in_column(&self, column: &str) -> usize {
        self.locations.iter().filter(|loc| loc.column == column).count()
    }

    pub fn total_cases(&self) -> i64 {
        self.locations.iter().map(|loc| i64::from(loc.cases)).sum()
    }
}

#[derive(Clone)]
pub struct InventoryStore {
    db: Database,
    snapshot: Arc<RwLock<Snapshot>>,
}

impl InventoryStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Loads all four tables concurrently.
    pub async fn refresh_all(&self) {
        tokio::join!(
            self.refresh(Resource::Products),
            self.refresh(Resource::Locations),
            self.refresh(Resource::ShelfConfigs),
            self.refresh(Resource::InventoryHistory),
        );
    }

    /// The tables a stock movement writes to.
    pub async fn refresh_stock(&self) {
        tokio::join!(
            self.refresh(Resource::Products),
            self.refresh(Resource::Locations),
            self.refresh(Resource::InventoryHistory),
        );
    }

    /// Refetches one table. A failed fetch keeps the previous rows.
    pub async fn refresh(&self, resource: Resource) {
        if let Err(err) = self.try_refresh(resource).await {
            log::error!("{} ({})", message(resource, Operation::Fetch), err);
        }
    }

    async fn try_refresh(&self, resource: Resource) -> Result<(), AppError> {
        match resource {
            Resource::Products => {
                let rows = repository::fetch_products(&self.db).await?;
                self.replace(|s| s.products = rows).await;
            }
            Resource::Locations => {
                let rows = repository::fetch_locations(&self.db).await?;
                self.replace(|s| s.locations = rows).await;
            }
            Resource::ShelfConfigs => {
                let rows = repository::fetch_shelf_configs(&self.db).await?;
                let configs = rows.into_iter().map(|c| (c.column.clone(), c)).collect();
                self.replace(|s| s.shelf_configs = configs).await;
            }
            Resource::InventoryHistory => {
                let filter = HistoryFilter {
                    product_code: None,
                    limit: Some(HISTORY_MIRROR_LIMIT),
                };
                let rows = repository::fetch_history(&self.db, &filter).await?;
                self.replace(|s| s.history = rows).await;
            }
        }
        log::debug!("Refreshed {}", resource.table());
        Ok(())
    }

    async fn replace<F: FnOnce(&mut Snapshot)>(&self, apply: F) {
        let mut snapshot = self.snapshot.write().await;
        apply(&mut snapshot);
        snapshot.loaded_at = Some(Utc::now());
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use uuid::Uuid;

    pub fn product(code: &str, name: &str, quantity_per_case: i32, total_cases: i32, minimum_stock: i32) -> Product {
        Product {
            code: code.to_string(),
            name: name.to_string(),
            quantity_per_case,
            total_cases,
            total_quantity: total_cases * quantity_per_case,
            minimum_stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn location(product_code: &str, column: &str, position: &str, level: &str, cases: i32) -> Location {
        Location {
            id: Uuid::new_v4(),
            product_code: product_code.to_string(),
            column: column.to_string(),
            position: position.to_string(),
            level: level.to_string(),
            cases,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn shelf(column: &str, positions: i32, levels: i32) -> ShelfConfig {
        ShelfConfig {
            column: column.to_string(),
            positions,
            levels,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Two products across columns A and B.
    pub fn warehouse() -> Snapshot {
        Snapshot {
            products: vec![
                product("PRD001", "Premium Coffee Beans", 24, 50, 800),
                product("PRD002", "Green Tea Leaves", 12, 10, 500),
                product("PRD003", "Cocoa Powder", 6, 0, 0),
            ],
            locations: vec![
                location("PRD001", "A", "1", "1", 30),
                location("PRD001", "B", "2", "3", 20),
                location("PRD002", "A", "1", "2", 10),
            ],
            shelf_configs: [shelf("A", 3, 3), shelf("B", 4, 3)]
                .into_iter()
                .map(|c| (c.column.clone(), c))
                .collect(),
            history: Vec::new(),
            loaded_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    #[test]
    fn products_are_joined_with_their_locations() {
        let snapshot = warehouse();
        let joined = snapshot.products_with_locations();

        assert_eq!(joined.len(), 3);
        assert_eq!(joined[0].product.code, "PRD001");
        assert_eq!(joined[0].locations.len(), 2);
        assert_eq!(joined[0].located_cases(), 50);
        assert!(!joined[0].is_out_of_sync());
        assert_eq!(joined[2].locations.len(), 0);
    }

    #[test]
    fn low_stock_compares_quantity_with_minimum() {
        let snapshot = warehouse();
        let low: Vec<_> = snapshot.low_stock().iter().map(|p| p.code.as_str()).collect();

        // PRD001 holds 1200 against 800; PRD002 holds 120 against 500.
        assert_eq!(low, vec!["PRD002"]);
    }

    #[test]
    fn single_product_lookup() {
        let snapshot = warehouse();
        let tea = snapshot.product("PRD002").unwrap();
        assert_eq!(tea.locations.len(), 1);
        assert!(snapshot.product("NOPE").is_none());
        assert_eq!(snapshot.locations_in_column("A"), 2);
        assert_eq!(snapshot.total_cases(), 60);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_rows() {
        // Nothing listens on port 1, so every fetch fails.
        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy("postgres://souko@127.0.0.1:1/souko")
            .unwrap();
        let store = InventoryStore::new(db);
        let loaded_at = Utc::now();
        *store.snapshot.write().await = Snapshot {
            loaded_at: Some(loaded_at),
            ..warehouse()
        };

        store.refresh(Resource::Products).await;
        store.refresh_stock().await;

        let snapshot = store.snapshot().await;
        let codes: Vec<_> = snapshot.products.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["PRD001", "PRD002", "PRD003"]);
        assert_eq!(snapshot.locations.len(), 3);
        assert_eq!(snapshot.shelf_configs.len(), 2);
        assert_eq!(snapshot.loaded_at, Some(loaded_at));
    }
}
