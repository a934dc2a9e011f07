//! Host-side oracle logic with no chain I/O: the ZK Prover, VRF Manager,
//! Reputation Registry, and the median/z-score Aggregator.

pub mod aggregation;
pub mod constants;
pub mod json_path;
pub mod reputation;
pub mod vrf;
pub mod zk;

pub use reputation::ReputationRegistry;
pub use vrf::{VrfError, VrfManager};
pub use zk::{circuits, ZkProver};
