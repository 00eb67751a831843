use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Location;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub code: String,
    pub name: String,
    pub quantity_per_case: i32,
    pub total_cases: i32,
    pub total_quantity: i32,
    pub minimum_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_below_minimum(&self) -> bool {
        self.total_quantity < self.minimum_stock
    }

    /// Units in `cases` full cases; too large to store is an invalid quantity.
    pub fn quantity_for(&self, cases: i32) -> Result<i32, AppError> {
        cases
            .checked_mul(self.quantity_per_case)
            .ok_or(AppError::InvalidQuantity)
    }
}

/// A product joined with every location row that holds it.
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithLocations {
    #[serde(flatten)]
    pub product: Product,
    pub locations: Vec<Location>,
}

impl ProductWithLocations {
    pub fn located_cases(&self) -> i32 {
        self.locations
            .iter()
            .fold(0i32, |sum, loc| sum.saturating_add(loc.cases))
    }

    /// Totals disagree with the location rows.
    pub fn is_out_of_sync(&self) -> bool {
        let cases = self.located_cases();
        self.product.total_cases != cases
            || self
                .product
                .quantity_for(cases)
                .map_or(true, |quantity| quantity != self.product.total_quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub quantity_per_case: i32,
    #[serde(default)]
    pub total_cases: i32,
    /// Derived from `total_cases` when absent.
    #[serde(default)]
    pub total_quantity: Option<i32>,
    #[serde(default)]
    pub minimum_stock: i32,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.code.trim().is_empty() || self.name.trim().is_empty() {
            return Err(AppError::Validation("Product code and name are required.".to_string()));
        }
        if self.quantity_per_case <= 0 || self.total_cases < 0 {
            return Err(AppError::InvalidQuantity);
        }
        if self.minimum_stock < 0 {
            return Err(AppError::InvalidMinimumStock);
        }
        if self.total_quantity()? < 0 {
            return Err(AppError::InvalidQuantity);
        }
        Ok(())
    }

    pub fn total_quantity(&self) -> Result<i32, AppError> {
        match self.total_quantity {
            Some(quantity) => Ok(quantity),
            None => self
                .total_cases
                .checked_mul(self.quantity_per_case)
                .ok_or(AppError::InvalidQuantity),
        }
    }
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub quantity_per_case: Option<i32>,
    pub total_cases: Option<i32>,
    pub total_quantity: Option<i32>,
    pub minimum_stock: Option<i32>,
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::Validation("Product name cannot be empty.".to_string()));
        }
        if matches!(self.quantity_per_case, Some(q) if q <= 0)
            || matches!(self.total_cases, Some(c) if c < 0)
            || matches!(self.total_quantity, Some(q) if q < 0)
        {
            return Err(AppError::InvalidQuantity);
        }
        if matches!(self.minimum_stock, Some(m) if m < 0) {
            return Err(AppError::InvalidMinimumStock);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            code: "PRD001".to_string(),
            name: "Premium coffee beans".to_string(),
            quantity_per_case: 24,
            total_cases: 50,
            total_quantity: None,
            minimum_stock: 800,
        }
    }

    #[test]
    fn total_quantity_defaults_to_cases_times_case_size() {
        assert_eq!(new_product().total_quantity().unwrap(), 1200);

        let explicit = NewProduct { total_quantity: Some(1000), ..new_product() };
        assert_eq!(explicit.total_quantity().unwrap(), 1000);
    }

    #[test]
    fn new_product_validation() {
        assert!(new_product().validate().is_ok());

        let zero_case = NewProduct { quantity_per_case: 0, ..new_product() };
        assert!(matches!(zero_case.validate(), Err(AppError::InvalidQuantity)));

        let negative_minimum = NewProduct { minimum_stock: -1, ..new_product() };
        assert!(matches!(negative_minimum.validate(), Err(AppError::InvalidMinimumStock)));

        let blank_code = NewProduct { code: " ".to_string(), ..new_product() };
        assert!(matches!(blank_code.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn oversized_totals_are_rejected_instead_of_wrapping() {
        let huge = NewProduct { total_cases: 100_000_000, ..new_product() };
        assert!(matches!(huge.total_quantity(), Err(AppError::InvalidQuantity)));
        assert!(matches!(huge.validate(), Err(AppError::InvalidQuantity)));

        let negative = NewProduct { total_quantity: Some(-5), ..new_product() };
        assert!(matches!(negative.validate(), Err(AppError::InvalidQuantity)));
    }

    #[test]
    fn partial_update_validation() {
        assert!(ProductUpdate::default().validate().is_ok());

        let rename = ProductUpdate { name: Some("Special blend".to_string()), ..Default::default() };
        assert!(rename.validate().is_ok());

        let bad = ProductUpdate { quantity_per_case: Some(0), ..Default::default() };
        assert!(matches!(bad.validate(), Err(AppError::InvalidQuantity)));
    }
}
