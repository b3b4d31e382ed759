//! Storage backend for the integrity engine
//!
//! The engine talks to a relational store through parameterized statements and
//! explicit transactions. `SqliteStore` is the only backend; every mutation runs
//! through a [`UnitOfWork`].

mod identifier;
mod sqlite;
mod traits;
mod unit_of_work;

pub use identifier::{validate_identifier, RowFilter};
pub(crate) use identifier::{bind_filter, filter_clause};
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
pub use traits::{OpenStore, StorageError, StorageResult};
pub use unit_of_work::{run_in, UnitOfWork};
