//! Utility functions for timestamps and identifier validation.

pub mod ids;
pub mod timestamps;

pub use ids::{
    validate_account_id, validate_incident_id, validate_region, validate_resource_id,
};
pub use timestamps::{iso_timestamp, now_millis, Timestamp};
