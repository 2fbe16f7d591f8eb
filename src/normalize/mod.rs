//! Boundary normalization
//!
//! Inbound records from the pull and push paths are loosely typed JSON.
//! Everything here turns them into strict values once, at the edge, so the
//! rest of the crate never re-validates.

mod coerce;
mod time;

pub use coerce::{
    field, field_bool, field_decimal, field_f64, field_str, records, to_decimal,
    to_f64,
};
pub use time::{field_time, parse_timestamp, plausible_range};
