//! Dependency-guarded deletion
//!
//! [`RuleSet`] declares, per entity type, which references block a deletion
//! and which owned rows go with it; [`DependencyGuard`] applies it.

mod delete;
mod rules;

pub use delete::{CascadeCount, DeleteReport, DependencyGuard};
pub use rules::{CascadeStep, DependencyCheck, EntityRule, RuleSet};
