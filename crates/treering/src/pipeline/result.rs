use crate::complete::{CompletionStats, Ring};
use crate::connect::ConnectStats;
use crate::error::DetectWarning;

/// Per-stage counters of one detection run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct PipelineStats {
    /// Edge curves in the input.
    pub n_curves: usize,
    /// Edge points in the input.
    pub n_edge_points: usize,
    /// Chains produced by polar sampling.
    pub sampled_chains: usize,
    /// Nodes produced by polar sampling.
    pub sampled_nodes: usize,
    pub connect: ConnectStats,
    pub completion: CompletionStats,
    /// Rings removed as duplicates of a neighbour.
    pub duplicates_removed: usize,
}

/// Full detection result for one cross-section.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DetectionResult {
    /// Ring boundaries, innermost first.
    pub rings: Vec<Ring>,
    /// Center used for polar sampling.
    pub center: [f64; 2],
    /// Image dimensions [width, height].
    pub image_size: [u32; 2],
    /// Number of rays per ring.
    pub n_rays: usize,
    pub stats: PipelineStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DetectWarning>,
}

impl DetectionResult {
    /// `false` when a stage stopped early (see `warnings`).
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Mean radius of every ring, innermost first.
    pub fn mean_radii(&self) -> Vec<f64> {
        self.rings.iter().map(|r| r.mean_radius).collect()
    }
}
