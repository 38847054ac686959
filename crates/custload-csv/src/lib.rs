//! custload-csv — delimited-file [`RecordSource`](custload_core::RecordSource)
//! backed by the `csv` crate.
//!
//! ```rust,no_run
//! use custload_core::Customer;
//! use custload_csv::CsvSourceBuilder;
//!
//! let source = CsvSourceBuilder::new("customers.csv")
//!     .names(Customer::field_names())
//!     .lines_to_skip(1)
//!     .build()
//!     .unwrap();
//! ```

pub mod error;
pub mod source;

pub use error::CsvSourceError;
pub use source::{CsvRecordSource, CsvSourceBuilder};
