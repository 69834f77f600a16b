//! Extraction, parsing and publication of a `ledger` register.
//!
//! [`Ledger`] runs the accounting tool and [`parser`] turns its output into
//! [`Transaction`]s. A batch then goes to one of the [`sinks`], or into a
//! [`LedgerCache`] that an HTTP layer can serve from.
pub use cache::{DEFAULT_REFRESH_INTERVAL, LedgerCache, Snapshot, spawn_refresher};
pub use error::{EngineError, PersistenceError};
pub use ledger::{Extract, Ledger, LedgerBuilder};
pub use points::{Field, Point};
pub use transactions::Transaction;

pub mod cache;
mod error;
pub mod ledger;
pub mod parser;
pub mod points;
pub mod sinks;
mod transactions;

pub type ResultEngine<T> = Result<T, EngineError>;
