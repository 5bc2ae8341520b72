//! Growth-ring boundary extraction from tree cross-section edges.
//!
//! Given oriented edge curves and the pith location, the pipeline turns a
//! noisy, fragmented edge set into closed, radially ordered ring boundaries:
//!
//! 1. **Sampler** – resamples edge curves on equally spaced rays around the
//!    center, producing chains of nodes (at most one node per ray).
//! 2. **Connect** – merges compatible chains pass by pass, cheapest first,
//!    rejecting bridges that would cross other chains; then discards short or
//!    unsupported chains.
//! 3. **Complete** – closes nearly full chains by interpolation guided by the
//!    next inner ring.
//! 4. **Dedup** – sorts rings by mean radius and drops duplicates.
//!
//! # Public API
//! - [`Detector`] as the primary entry point
//! - [`DetectConfig`] for tuning
//! - [`EdgeMap`] as input, optionally produced by [`detect_edge_curves`]
//! - [`DetectionResult`] / [`Ring`] as output, [`ChainSet`] for inspection

mod chain;
mod complete;
mod config;
mod connect;
mod dedup;
mod detector;
mod edges;
mod error;
mod pipeline;
mod sampler;

#[cfg(test)]
pub(crate) mod test_utils;

pub use chain::{ray_angle, Chain, ChainId, ChainProperties, ChainSet, ChainState, Node, RayGap};
pub use complete::{CompletionStats, Ring};
pub use config::{
    CompletionParams, ConnectConfig, ConnectPass, CostWeights, DetectConfig, SamplerConfig,
};
pub use connect::{ConnectStats, PassStats};
pub use detector::Detector;
pub use edges::{
    detect_edge_curves, filter_by_orientation, EdgeCurve, EdgeDetectConfig, EdgeMap, EdgePoint,
};
pub use error::{ConfigError, DetectError, DetectWarning, InputError};
pub use pipeline::{detect_rings, DetectionResult, PipelineStats};
pub use sampler::sample_chains;

// Stage entry points, for callers that want to run stages individually.
pub use complete::{complete_rings, Completion};
pub use connect::{connect_chains, ConnectOutcome};
