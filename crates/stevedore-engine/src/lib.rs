//! Stevedore reconciliation engine
//!
//! Turns a validated release into desired-state objects, guards every
//! mutation behind the ownership marker, and applies or tears down the whole
//! release as a best-effort batch. The CLI sits on top; the cluster sits
//! behind the [`store::ResourceStore`] trait.

pub mod apply;
pub mod k8s;
pub mod ownership;
pub mod snapshot;
pub mod store;
pub mod synth;

pub use apply::{Applier, ApplyReport, Operation, StepOutcome, StepReport};
pub use ownership::{check_ownership, Ownership};
pub use store::{DesiredObject, KubeStore, ResourceKind, ResourceStore};
