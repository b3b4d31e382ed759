//! Entity identity and the engine facade

mod engine;
mod entity;

#[cfg(test)]
mod tests;

pub use engine::{IntegrityEngine, IntegrityError, IntegrityResult};
pub use entity::{EntityId, EntityType, UnknownEntityType};
