use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use redress_core::workflow::StoreError;

pub mod order;
pub mod payment;
pub mod ticket;

pub use order::SqlOrderStore;
pub use payment::SqlPaymentStore;
pub use ticket::SqlTicketStore;

pub(crate) fn backend(error: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(error.to_string())
}

pub(crate) fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw.trim())
        .map_err(|_| StoreError::Backend(format!("column `{column}` holds invalid decimal `{raw}`")))
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        StoreError::Backend(format!("column `{column}` holds invalid timestamp `{raw}`"))
    })
}
