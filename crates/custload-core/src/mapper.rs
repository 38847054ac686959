//! Raw line → domain record mapping.

use crate::customer::{Customer, CUSTOMER_FIELDS};
use crate::error::MappingError;
use crate::types::RawRecord;

/// Converts one tokenized line into a typed record.
///
/// Implementations must be pure: no I/O, no shared mutable state.
pub trait LineMapper<T>: Send + Sync {
    fn map(&self, raw: &RawRecord) -> Result<T, MappingError>;
}

impl<T, F> LineMapper<T> for F
where
    F: Fn(&RawRecord) -> Result<T, MappingError> + Send + Sync,
{
    fn map(&self, raw: &RawRecord) -> Result<T, MappingError> {
        self(raw)
    }
}

/// Positional mapper for the customer file.
///
/// Lines with fewer than eight tokens are padded with empty strings. Lines
/// with more are truncated unless `strict` is set, in which case any count
/// other than eight is a [`MappingError::FieldCount`].
#[derive(Debug, Clone, Default)]
pub struct CustomerLineMapper {
    strict: bool,
}

impl CustomerLineMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl LineMapper<Customer> for CustomerLineMapper {
    fn map(&self, raw: &RawRecord) -> Result<Customer, MappingError> {
        let expected = CUSTOMER_FIELDS.len();
        if self.strict && raw.len() != expected {
            return Err(MappingError::FieldCount {
                line: raw.line,
                expected,
                found: raw.len(),
            });
        }

        let id_text = raw.value_at(0).trim();
        let id = id_text
            .parse::<i64>()
            .map_err(|source| MappingError::InvalidNumber {
                line: raw.line,
                field: CUSTOMER_FIELDS[0].to_string(),
                value: id_text.to_string(),
                source,
            })?;

        Ok(Customer {
            id,
            first_name: raw.value_at(1).to_string(),
            last_name: raw.value_at(2).to_string(),
            email: raw.value_at(3).to_string(),
            gender: raw.value_at(4).to_string(),
            contact_no: raw.value_at(5).to_string(),
            country: raw.value_at(6).to_string(),
            dob: raw.value_at(7).to_string(),
        })
    }
}
