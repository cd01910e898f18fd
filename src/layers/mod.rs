//! Ordered, named displacement layers.

/// Layer records and the owning stack.
pub mod stack;
