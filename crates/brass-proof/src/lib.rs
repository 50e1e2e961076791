//! Presentation wire types and DLEQ proof verification for the BRASS
//! spend verifier.
//!
//! Two proofs guard every spend: the issuer proof π_I (`log_G(Y) =
//! log_M(Z)`, the issuer applied one secret scalar to both) and the client
//! unblinding proof π_C (`log_P(M) = log_{Z'}(Z)`, the presenter knows the
//! blinding scalar), the latter bound to the full spend context.

pub mod binding;
pub mod dleq;
pub mod error;
pub mod presentation;

pub use binding::{client_binding, verify_client_proof, verify_issuer_proof, DLEQ_LABEL};
pub use dleq::DleqProof;
pub use error::{ProofError, ProofResult};
pub use presentation::{DecodedPresentation, Presentation, ProofScalars};
