//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod ops_bookings;
pub mod vip_bundles;

use std::str::FromStr;

use crate::error::ApiError;

fn parse_id<T>(id: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
