//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Project ID - identifies a verified offset project.
///
/// Assigned by the project-management collaborator at approval and never
/// reused.
pub type ProjectId = u64;

/// User ID - buyers and project developers share one id space.
///
/// # Usage:
/// - Holding key together with [`ProjectId`]
/// - `from_user_id` / `to_user_id` on ledger entries
pub type UserId = u64;

/// Whole-credit quantity (1 credit = 1 tonne CO2e). Credits are never fractional.
pub type Quantity = u64;

/// Vintage year of the underlying reduction
pub type Vintage = u16;

/// Wall-clock timestamp in milliseconds since the Unix epoch
pub type TimestampMs = i64;

/// Current wall-clock time in milliseconds
#[inline]
pub fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}
