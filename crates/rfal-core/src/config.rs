//! Compile-time capacities
//!
//! These are the defaults for the const generic parameters of
//! [`Fal`](crate::Fal). Firmware with tighter memory budgets picks its own
//! values at the type level, e.g. `Fal<'_, FlagLock, 1, 1, 4>`.

/// Default number of flash device slots
pub const DEVICE_SLOTS: usize = 4;

/// Default number of partition table slots
pub const TABLE_SLOTS: usize = 4;

/// Default number of resolution cache entries
///
/// Should be at least the total number of partitions across all
/// registered tables, otherwise the overflow is not resolvable.
pub const CACHE_SLOTS: usize = 16;

/// Number of leading bytes considered when comparing device and partition names
pub const NAME_MAX: usize = 24;
