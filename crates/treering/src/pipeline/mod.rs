//! Detection pipeline glue.
//!
//! Wires the stages together: input validation -> polar sampling -> chain
//! connection -> completion -> dedup. Algorithmic work lives in
//! `crate::sampler`, `crate::connect`, `crate::complete` and `crate::dedup`;
//! this layer owns call order, data flow and stage-level logging.

mod result;
mod run;

pub use result::{DetectionResult, PipelineStats};

pub(crate) use run::run;
pub use run::detect_rings;
