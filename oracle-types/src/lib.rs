//! Core data structures and error types shared by every crate in the
//! oracle node workspace. Deliberately free of chain, storage, or crypto
//! client dependencies so it can sit at the bottom of the dependency graph.

pub mod error;
pub mod event;
pub mod feed;
pub mod job;
pub mod node_identity;
pub mod observation;
pub mod proof;
pub mod report;
pub mod trigger;

pub use error::{JobError, ProverError, StoreError};
pub use event::EventId;
pub use feed::{AggregationMethod, FeedConfig, FeedLiveStatus};
pub use job::{Job, JobKind, JobParams, JobRecord, JobStatus};
pub use node_identity::NodeIdentity;
pub use observation::Observation;
pub use proof::{CircuitKind, Proof, PROOF_SCALAR_COUNT};
pub use report::{Report, ReportSignature};
pub use trigger::{Trigger, TriggerKind};
