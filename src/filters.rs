use std::borrow::Borrow;
use std::fmt::Display;

use askama::Result;
use chrono::{DateTime, Utc};

// Template filters, in scope wherever a handler imports `crate::filters`.

/// `{{ n|cases }}` renders "1 case" / "12 cases".
pub fn cases<T: Display>(n: T) -> Result<String> {
    let n = n.to_string();
    if n == "1" {
        Ok("1 case".to_string())
    } else {
        Ok(format!("{} cases", n))
    }
}

pub fn datetime<T: Borrow<DateTime<Utc>>>(dt: T) -> Result<String> {
    Ok(dt.borrow().format("%Y-%m-%d %H:%M").to_string())
}
