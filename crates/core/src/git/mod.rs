//! Git operations for harbinger.

pub mod refname;
pub mod repository;

#[cfg(test)]
pub(crate) mod fake;

pub use refname::validate_ref_name;
pub use repository::{GitRepository, MergeTreeOutput, RefStore, Side};
