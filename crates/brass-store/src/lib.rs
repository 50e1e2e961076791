//! Counter-store backends.
//!
//! Three implementations of `brass_core::CounterStore`:
//!
//! - [`AtomicStore`] — in-memory, one critical section per spend;
//!   linearizable per key within the process.
//! - [`SqliteStore`] — the durable flavor of the atomic backend; one
//!   SQLite transaction per spend.
//! - [`BestEffortStore`] — eventually-consistent semantics on purpose:
//!   concurrent spends may under-count. Free-tier only.

pub mod atomic;
pub mod best_effort;
pub mod keys;
pub mod sqlite;
pub mod tables;

pub use atomic::AtomicStore;
pub use best_effort::BestEffortStore;
pub use sqlite::SqliteStore;
