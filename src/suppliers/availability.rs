//! Per-supplier in-stock rules
//!
//! Suppliers disagree on what "in stock" means. Each adapter is handed one
//! [`AvailabilityPolicy`], a pure predicate over
//! `(warehouse, delivery_days, quantity)`.

use std::fmt;
use std::sync::Arc;

use crate::utils::matches_region;

type Predicate = dyn Fn(&str, u32, u32) -> bool + Send + Sync;

/// In-stock predicate injected into an adapter
#[derive(Clone)]
pub struct AvailabilityPolicy {
    name: &'static str,
    predicate: Arc<Predicate>,
}

impl AvailabilityPolicy {
    /// Wrap an arbitrary predicate
    pub fn custom<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&str, u32, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    /// In stock only for same-day delivery
    pub fn same_day() -> Self {
        Self::custom("same_day", |_, delivery_days, _| delivery_days == 0)
    }

    /// In stock when something is on hand and arrives by tomorrow
    pub fn next_day() -> Self {
        Self::custom("next_day", |_, delivery_days, quantity| {
            quantity > 0 && delivery_days <= 1
        })
    }

    /// Home-region warehouses get one extra day of tolerance
    ///
    /// A home warehouse with `delivery_days == 1` is closed for the day and
    /// reopens tomorrow, which still counts as in stock.
    pub fn home_region(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        Self::custom("home_region", move |warehouse, delivery_days, quantity| {
            if quantity == 0 {
                return false;
            }
            if matches_region(warehouse, &marker) {
                delivery_days <= 1
            } else {
                delivery_days == 0
            }
        })
    }

    /// Defer entirely to the supplier's own flag
    pub fn always() -> Self {
        Self::custom("always", |_, _, _| true)
    }

    pub fn is_in_stock(&self, warehouse: &str, delivery_days: u32, quantity: u32) -> bool {
        (self.predicate)(warehouse, delivery_days, quantity)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for AvailabilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailabilityPolicy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
