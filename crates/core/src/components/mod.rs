//! Components of an incident record.
//!
//! These are the persisted entities the capture workflow reads and mutates, independent of how
//! the backend stores them.

pub mod clarification;
pub mod ids;
pub mod incident;
pub mod narrative;
