//! Typed per-`JobKind` handlers (§4.8 a-c).

pub mod aggregate;
pub mod compute;
pub mod data_feed;
pub mod vrf;

pub use aggregate::AggregateHandler;
pub use compute::ComputeHandler;
pub use data_feed::DataFeedHandler;
pub use vrf::VrfHandler;
