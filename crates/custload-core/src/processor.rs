//! Filter/transform stage.

use crate::customer::{Customer, DEFAULT_COUNTRY};
use crate::error::ProcessError;

/// Inspects a record and keeps it (possibly transformed) or excludes it.
///
/// `Ok(None)` is an exclusion: the item is dropped and counted as filtered,
/// it is never offered to the skip policy.
pub trait ItemProcessor<T>: Send + Sync {
    fn process(&self, item: T) -> Result<Option<T>, ProcessError>;
}

impl<T, F> ItemProcessor<T> for F
where
    F: Fn(T) -> Result<Option<T>, ProcessError> + Send + Sync,
{
    fn process(&self, item: T) -> Result<Option<T>, ProcessError> {
        self(item)
    }
}

/// Keeps every item unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<T> ItemProcessor<T> for PassThrough {
    fn process(&self, item: T) -> Result<Option<T>, ProcessError> {
        Ok(Some(item))
    }
}

/// Keeps customers whose `country` equals the configured value exactly.
#[derive(Debug, Clone)]
pub struct CountryFilter {
    country: String,
}

impl CountryFilter {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }
}

impl Default for CountryFilter {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTRY)
    }
}

impl ItemProcessor<Customer> for CountryFilter {
    fn process(&self, item: Customer) -> Result<Option<Customer>, ProcessError> {
        if item.country == self.country {
            Ok(Some(item))
        } else {
            Ok(None)
        }
    }
}
