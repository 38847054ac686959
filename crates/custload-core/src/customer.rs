//! The customer record imported by the reference job.

use serde::{Deserialize, Serialize};

/// Column order of the customer input file.
pub const CUSTOMER_FIELDS: [&str; 8] = [
    "id",
    "firstName",
    "lastName",
    "email",
    "gender",
    "contactNo",
    "country",
    "dob",
];

/// Country kept by the reference filter.
pub const DEFAULT_COUNTRY: &str = "United States";

/// A customer row after mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub contact_no: String,
    pub country: String,
    pub dob: String,
}

impl Customer {
    /// Field names as `Arc<[String]>`, ready to hand to a record source.
    pub fn field_names() -> std::sync::Arc<[String]> {
        CUSTOMER_FIELDS.iter().map(|s| s.to_string()).collect()
    }
}
