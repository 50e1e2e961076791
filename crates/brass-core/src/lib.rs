//! Core types and primitives for the BRASS spend verifier.
//!
//! This crate is the bottom of the workspace: byte codecs, the
//! domain-separated hash `H3`, the P-256 point codec with validity checks,
//! typed identifiers, the counter-store entities, and the `CounterStore` /
//! `Clock` traits that the backends and the handler share.

pub mod clock;
pub mod codec;
pub mod error;
pub mod hash;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use traits::CounterStore;
pub use types::{CounterKey, PolicyId, ProjectId, SpendDecision, SpendRequest, WindowId};
