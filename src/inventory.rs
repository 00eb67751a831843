//! Stock movements: outbound shipments, inbound receipts and moves between
//! slots, plus total recalculation.
//!
//! The arithmetic lives in the `plan_*` functions and never touches the
//! database. Each operation locks the product and its location rows, applies
//! the plan and writes the history record inside a single transaction.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, DbResultExt, Operation, Resource},
    flash::Notice,
    models::{
        Coordinate, HistoryEntry, HistoryKind, InboundRequest, Location, MoveRequest,
        NewHistoryEntry, NewLocation, OutboundRequest, Product, ProductUpdate, ShelfConfig,
    },
    repository,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPlan {
    pub location_id: Uuid,
    /// The matched slot as stored.
    pub slot: Coordinate,
    pub remaining: i32,
    pub cases: i32,
    pub quantity: i32,
}

impl OutboundPlan {
    pub fn empties_slot(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Existing { location_id: Uuid, cases: i32 },
    New,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPlan {
    pub destination: Destination,
    pub cases: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub source: OutboundPlan,
    pub destination: Destination,
}

fn require_cases(cases: i32) -> Result<(), AppError> {
    if cases <= 0 {
        return Err(AppError::InvalidQuantity);
    }
    Ok(())
}

pub fn plan_outbound(
    product: &Product,
    locations: &[Location],
    at: &Coordinate,
    cases: i32,
) -> Result<OutboundPlan, AppError> {
    require_cases(cases)?;

    let location = locations
        .iter()
        .find(|loc| loc.product_code == product.code && loc.is_at(at))
        .ok_or_else(|| AppError::LocationNotFound(at.to_string()))?;

    if cases > location.cases {
        return Err(AppError::InsufficientStock {
            requested: cases,
            available: location.cases,
        });
    }

    Ok(OutboundPlan {
        location_id: location.id,
        slot: location.coordinate(),
        remaining: location.cases - cases,
        cases,
        quantity: product.quantity_for(cases)?,
    })
}

fn destination(
    product: &Product,
    locations: &[Location],
    at: &Coordinate,
    cases: i32,
) -> Result<Destination, AppError> {
    match locations
        .iter()
        .find(|loc| loc.product_code == product.code && loc.is_at(at))
    {
        Some(existing) => Ok(Destination::Existing {
            location_id: existing.id,
            cases: existing.cases.checked_add(cases).ok_or(AppError::InvalidQuantity)?,
        }),
        None => Ok(Destination::New),
    }
}

pub fn plan_inbound(
    product: &Product,
    locations: &[Location],
    at: &Coordinate,
    cases: i32,
) -> Result<InboundPlan, AppError> {
    require_cases(cases)?;

    Ok(InboundPlan {
        destination: destination(product, locations, at, cases)?,
        cases,
        quantity: product.quantity_for(cases)?,
    })
}

pub fn plan_move(
    product: &Product,
    locations: &[Location],
    from: &Coordinate,
    to: &Coordinate,
    cases: i32,
) -> Result<MovePlan, AppError> {
    if from.matches(to) {
        return Err(AppError::Validation(
            "Source and destination are the same slot.".to_string(),
        ));
    }
    let source = plan_outbound(product, locations, from, cases)?;

    Ok(MovePlan {
        destination: destination(product, locations, to, cases)?,
        source,
    })
}

/// A slot is valid when its column is configured and the position and
/// level fall inside that column's grid.
pub fn validate_coordinate(config: Option<&ShelfConfig>, at: &Coordinate) -> Result<(), AppError> {
    let config = config.ok_or(AppError::InvalidPosition)?;
    let in_range = |value: Option<i32>, max: i32| matches!(value, Some(v) if v >= 1 && v <= max);

    if in_range(at.position_number(), config.positions) && in_range(at.level_number(), config.levels) {
        Ok(())
    } else {
        Err(AppError::InvalidPosition)
    }
}

/// Totals that match the product's location rows.
pub fn totals_from_locations(product: &Product, locations: &[Location]) -> Result<ProductUpdate, AppError> {
    let cases = locations
        .iter()
        .filter(|loc| loc.product_code == product.code)
        .try_fold(0i32, |sum, loc| sum.checked_add(loc.cases))
        .ok_or(AppError::InvalidQuantity)?;

    Ok(ProductUpdate {
        total_cases: Some(cases),
        total_quantity: Some(product.quantity_for(cases)?),
        ..Default::default()
    })
}

/// What a completed movement changed, for the response and the notice.
#[derive(Debug, Clone, Serialize)]
pub struct MovementOutcome {
    pub product: Product,
    pub history: HistoryEntry,
    pub slot_emptied: bool,
}

impl MovementOutcome {
    pub fn notice(&self) -> Notice {
        let (title, verb) = match self.history.kind() {
            Some(HistoryKind::Inbound) => ("Receipt complete", "Received"),
            Some(HistoryKind::Move) => ("Move complete", "Moved"),
            _ => ("Shipment complete", "Shipped"),
        };
        Notice::success(
            title,
            format!("{} {} cases of {}.", verb, self.history.cases, self.product.name),
        )
    }
}

async fn begin(db: &Database) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, AppError> {
    db.begin().await.on(Resource::InventoryHistory, Operation::Create)
}

async fn apply_destination(
    tx: &mut sqlx::PgConnection,
    product_code: &str,
    at: &Coordinate,
    destination: &Destination,
    cases: i32,
) -> Result<(), AppError> {
    match destination {
        Destination::Existing { location_id, cases: total } => {
            repository::set_location_cases(&mut *tx, *location_id, *total).await
        }
        Destination::New => {
            let location = NewLocation {
                product_code: product_code.to_string(),
                column: at.column.clone(),
                position: at.position.clone(),
                level: at.level.clone(),
                cases,
            };
            repository::create_location(&mut *tx, &location).await.map(|_| ())
        }
    }
}

async fn apply_source(tx: &mut sqlx::PgConnection, plan: &OutboundPlan) -> Result<(), AppError> {
    if plan.empties_slot() {
        repository::delete_location(&mut *tx, plan.location_id).await
    } else {
        repository::set_location_cases(&mut *tx, plan.location_id, plan.remaining).await
    }
}

pub async fn ship_outbound(db: &Database, request: &OutboundRequest) -> Result<MovementOutcome, AppError> {
    require_cases(request.cases)?;
    let at = request.coordinate();

    let mut tx = begin(db).await?;
    let product = repository::lock_product(&mut *tx, request.product_code.trim()).await?;
    let locations = repository::lock_product_locations(&mut *tx, &product.code).await?;
    let plan = plan_outbound(&product, &locations, &at, request.cases)?;

    apply_source(&mut tx, &plan).await?;
    let product = repository::adjust_product_totals(&mut *tx, &product.code, -plan.cases, -plan.quantity).await?;
    let history = repository::add_history(
        &mut *tx,
        &NewHistoryEntry {
            product_code: product.code.clone(),
            kind: HistoryKind::Outbound,
            cases: plan.cases,
            quantity: plan.quantity,
            from_location: Some(plan.slot.clone()),
            to_location: None,
        },
    )
    .await?;
    tx.commit().await.on(Resource::InventoryHistory, Operation::Create)?;

    log::info!(
        "Shipped {} cases of {} from {} ({} left)",
        plan.cases, product.code, plan.slot, plan.remaining
    );
    Ok(MovementOutcome {
        product,
        history,
        slot_emptied: plan.empties_slot(),
    })
}

pub async fn receive_inbound(db: &Database, request: &InboundRequest) -> Result<MovementOutcome, AppError> {
    require_cases(request.cases)?;
    let at = request.coordinate();

    let mut tx = begin(db).await?;
    let config = repository::find_shelf_config(&mut *tx, &at.column).await?;
    validate_coordinate(config.as_ref(), &at)?;

    let product = repository::lock_product(&mut *tx, request.product_code.trim()).await?;
    let locations = repository::lock_product_locations(&mut *tx, &product.code).await?;
    let plan = plan_inbound(&product, &locations, &at, request.cases)?;

    apply_destination(&mut tx, &product.code, &at, &plan.destination, plan.cases).await?;
    let product = repository::adjust_product_totals(&mut *tx, &product.code, plan.cases, plan.quantity).await?;
    let history = repository::add_history(
        &mut *tx,
        &NewHistoryEntry {
            product_code: product.code.clone(),
            kind: HistoryKind::Inbound,
            cases: plan.cases,
            quantity: plan.quantity,
            from_location: None,
            to_location: Some(at.clone()),
        },
    )
    .await?;
    tx.commit().await.on(Resource::InventoryHistory, Operation::Create)?;

    log::info!("Received {} cases of {} into {}", plan.cases, product.code, at);
    Ok(MovementOutcome {
        product,
        history,
        slot_emptied: false,
    })
}

pub async fn move_stock(db: &Database, request: &MoveRequest) -> Result<MovementOutcome, AppError> {
    require_cases(request.cases)?;
    let from = request.from();
    let to = request.to();

    let mut tx = begin(db).await?;
    let config = repository::find_shelf_config(&mut *tx, &to.column).await?;
    validate_coordinate(config.as_ref(), &to)?;

    let product = repository::lock_product(&mut *tx, request.product_code.trim()).await?;
    let locations = repository::lock_product_locations(&mut *tx, &product.code).await?;
    let plan = plan_move(&product, &locations, &from, &to, request.cases)?;

    apply_source(&mut tx, &plan.source).await?;
    apply_destination(&mut tx, &product.code, &to, &plan.destination, plan.source.cases).await?;
    let history = repository::add_history(
        &mut *tx,
        &NewHistoryEntry {
            product_code: product.code.clone(),
            kind: HistoryKind::Move,
            cases: plan.source.cases,
            quantity: plan.source.quantity,
            from_location: Some(plan.source.slot.clone()),
            to_location: Some(to.clone()),
        },
    )
    .await?;
    tx.commit().await.on(Resource::InventoryHistory, Operation::Create)?;

    log::info!(
        "Moved {} cases of {} from {} to {}",
        plan.source.cases, product.code, plan.source.slot, to
    );
    Ok(MovementOutcome {
        product,
        history,
        slot_emptied: plan.source.empties_slot(),
    })
}

/// Resets a product's totals to the sum of its location rows.
pub async fn recalculate_totals(db: &Database, code: &str) -> Result<Product, AppError> {
    let mut tx = db.begin().await.on(Resource::Products, Operation::Update)?;
    let product = repository::lock_product(&mut *tx, code).await?;
    let locations = repository::lock_product_locations(&mut *tx, &product.code).await?;

    let update = totals_from_locations(&product, &locations)?;
    let product = repository::update_product(&mut *tx, &product.code, &update).await?;
    tx.commit().await.on(Resource::Products, Operation::Update)?;

    log::info!("Recalculated totals for {}: {} cases", product.code, product.total_cases);
    Ok(product)
}

/// Deletes a shelf column, refusing while any location still uses it.
pub async fn remove_shelf_column(db: &Database, column: &str) -> Result<(), AppError> {
    let stored = repository::count_locations_in_column(db, column).await?;
    if stored > 0 {
        return Err(AppError::ShelfHasInventory(column.to_string()));
    }
    repository::delete_shelf_config(db, column).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{location, product, shelf};

    fn coffee() -> (Product, Vec<Location>) {
        (
            product("PRD001", "Premium Coffee Beans", 24, 50, 800),
            vec![
                location("PRD001", "A", "1", "1", 30),
                location("PRD001", "B", "2", "3", 20),
            ],
        )
    }

    #[test]
    fn outbound_subtracts_from_the_matching_slot() {
        let (product, locations) = coffee();
        let plan = plan_outbound(&product, &locations, &Coordinate::new("A", "1", "1"), 5).unwrap();

        assert_eq!(plan.location_id, locations[0].id);
        assert_eq!(plan.remaining, 25);
        assert_eq!(plan.quantity, 120);
        assert!(!plan.empties_slot());
    }

    #[test]
    fn outbound_of_everything_empties_the_slot() {
        let (product, locations) = coffee();
        let plan = plan_outbound(&product, &locations, &Coordinate::new("B", "02", "3"), 20).unwrap();

        assert!(plan.empties_slot());
        assert_eq!(plan.slot, Coordinate::new("B", "2", "3"));
        assert_eq!(plan.quantity, 480);
    }

    #[test]
    fn outbound_rejections() {
        let (product, locations) = coffee();
        let at = Coordinate::new("A", "1", "1");

        assert!(matches!(
            plan_outbound(&product, &locations, &at, 0),
            Err(AppError::InvalidQuantity)
        ));
        assert!(matches!(
            plan_outbound(&product, &locations, &at, 31),
            Err(AppError::InsufficientStock { requested: 31, available: 30 })
        ));
        assert!(matches!(
            plan_outbound(&product, &locations, &Coordinate::new("C", "1", "1"), 1),
            Err(AppError::LocationNotFound(_))
        ));
    }

    #[test]
    fn inbound_tops_up_or_opens_a_slot() {
        let (product, locations) = coffee();

        let top_up = plan_inbound(&product, &locations, &Coordinate::new("A", "1", "1"), 4).unwrap();
        assert_eq!(
            top_up.destination,
            Destination::Existing { location_id: locations[0].id, cases: 34 }
        );
        assert_eq!(top_up.quantity, 96);

        let fresh = plan_inbound(&product, &locations, &Coordinate::new("A", "2", "1"), 4).unwrap();
        assert_eq!(fresh.destination, Destination::New);
    }

    #[test]
    fn move_between_slots() {
        let (product, locations) = coffee();
        let plan = plan_move(
            &product,
            &locations,
            &Coordinate::new("B", "2", "3"),
            &Coordinate::new("A", "1", "1"),
            20,
        )
        .unwrap();

        assert!(plan.source.empties_slot());
        assert_eq!(
            plan.destination,
            Destination::Existing { location_id: locations[0].id, cases: 50 }
        );

        let same = plan_move(
            &product,
            &locations,
            &Coordinate::new("A", "1", "1"),
            &Coordinate::new("A", "01", "1"),
            1,
        );
        assert!(matches!(same, Err(AppError::Validation(_))));
    }

    #[test]
    fn oversized_quantities_are_rejected_instead_of_overflowing() {
        let (product, locations) = coffee();
        let a11 = Coordinate::new("A", "1", "1");

        assert!(matches!(
            plan_inbound(&product, &locations, &Coordinate::new("A", "2", "1"), 100_000_000),
            Err(AppError::InvalidQuantity)
        ));
        assert!(matches!(
            plan_inbound(&product, &locations, &a11, i32::MAX),
            Err(AppError::InvalidQuantity)
        ));

        let mut crowded = locations.clone();
        crowded[1].cases = i32::MAX;
        assert!(matches!(
            plan_move(&product, &crowded, &a11, &Coordinate::new("B", "2", "3"), 1),
            Err(AppError::InvalidQuantity)
        ));
    }

    #[test]
    fn totals_follow_the_location_rows() {
        let (product, mut locations) = coffee();
        locations.push(location("PRD002", "A", "1", "2", 99));

        let update = totals_from_locations(&product, &locations).unwrap();
        assert_eq!(update.total_cases, Some(50));
        assert_eq!(update.total_quantity, Some(1200));
        assert_eq!(update.name, None);

        let empty = totals_from_locations(&product, &[]).unwrap();
        assert_eq!(empty.total_cases, Some(0));
        assert_eq!(empty.total_quantity, Some(0));

        locations[0].cases = i32::MAX;
        assert!(matches!(
            totals_from_locations(&product, &locations),
            Err(AppError::InvalidQuantity)
        ));
    }

    #[test]
    fn coordinates_must_fit_the_configured_grid() {
        let config = shelf("A", 3, 2);

        assert!(validate_coordinate(Some(&config), &Coordinate::new("A", "3", "2")).is_ok());
        assert!(validate_coordinate(Some(&config), &Coordinate::new("A", "4", "1")).is_err());
        assert!(validate_coordinate(Some(&config), &Coordinate::new("A", "1", "3")).is_err());
        assert!(validate_coordinate(Some(&config), &Coordinate::new("A", "0", "1")).is_err());
        assert!(validate_coordinate(Some(&config), &Coordinate::new("A", "x", "1")).is_err());
        assert!(matches!(
            validate_coordinate(None, &Coordinate::new("Z", "1", "1")),
            Err(AppError::InvalidPosition)
        ));
    }

    #[test]
    fn outcome_notice_names_the_movement() {
        let (product, _) = coffee();
        let history = HistoryEntry {
            id: Uuid::new_v4(),
            product_code: product.code.clone(),
            kind: "outbound".to_string(),
            cases: 3,
            quantity: 72,
            from_column: Some("A".to_string()),
            from_position: Some("1".to_string()),
            from_level: Some("1".to_string()),
            to_column: None,
            to_position: None,
            to_level: None,
            created_at: chrono::Utc::now(),
        };
        let outcome = MovementOutcome { product, history, slot_emptied: false };
        let notice = outcome.notice();

        assert_eq!(notice.title, "Shipment complete");
        assert_eq!(notice.description, "Shipped 3 cases of Premium Coffee Beans.");
    }
}
