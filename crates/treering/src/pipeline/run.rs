//! Top-level pipeline orchestrator.

use tracing::info;

use super::{DetectionResult, PipelineStats};
use crate::chain::ChainSet;
use crate::complete::complete_rings;
use crate::config::DetectConfig;
use crate::connect::connect_chains;
use crate::dedup::dedup_rings;
use crate::edges::EdgeMap;
use crate::error::{DetectError, InputError};
use crate::sampler::sample_chains;

fn validate_input(edges: &EdgeMap, center: [f64; 2]) -> Result<(), InputError> {
    let [w, h] = edges.image_size;
    if w == 0 || h == 0 {
        return Err(InputError::EmptyImage {
            image_size: edges.image_size,
        });
    }
    if !center[0].is_finite() || !center[1].is_finite() {
        return Err(InputError::NonFiniteCenter { center });
    }
    if center[0] < 0.0 || center[1] < 0.0 || center[0] >= w as f64 || center[1] >= h as f64 {
        return Err(InputError::CenterOutsideImage {
            center,
            image_size: edges.image_size,
        });
    }
    for (ci, curve) in edges.curves.iter().enumerate() {
        if let Some(pi) = curve
            .points
            .iter()
            .position(|p| !p.xy[0].is_finite() || !p.xy[1].is_finite())
        {
            return Err(InputError::NonFinitePoint {
                curve: ci,
                point: pi,
            });
        }
    }
    Ok(())
}

/// Run every stage on a validated configuration.
///
/// When `keep_chains` is set, the chain set reached by the connection engine
/// is returned alongside the result.
pub(crate) fn run(
    edges: &EdgeMap,
    center: [f64; 2],
    config: &DetectConfig,
    keep_chains: bool,
) -> Result<(DetectionResult, Option<ChainSet>), DetectError> {
    validate_input(edges, center)?;

    let mut stats = PipelineStats {
        n_curves: edges.curves.len(),
        n_edge_points: edges.point_count(),
        ..PipelineStats::default()
    };

    let set = sample_chains(edges, center, config.n_rays, &config.sampler);
    stats.sampled_chains = set.len();
    stats.sampled_nodes = set.node_count();
    info!(
        curves = stats.n_curves,
        chains = stats.sampled_chains,
        nodes = stats.sampled_nodes,
        "sampled edge curves"
    );

    let outcome = connect_chains(set, config);
    let chains = keep_chains.then(|| outcome.set.clone());
    stats.connect = outcome.stats;

    let completion = complete_rings(outcome.set, config);
    stats.completion = completion.stats;
    let n_closed = completion.rings.len();
    let rings = dedup_rings(completion.rings, &config.completion);
    stats.duplicates_removed = n_closed - rings.len();

    info!(
        rings = rings.len(),
        interpolated = stats.completion.closed_by_interpolation,
        duplicates = stats.duplicates_removed,
        "ring detection done"
    );

    let result = DetectionResult {
        rings,
        center,
        image_size: edges.image_size,
        n_rays: config.n_rays,
        stats,
        warnings: outcome.warnings,
    };
    Ok((result, chains))
}

/// Validate `config`, then detect rings in `edges` around `center`.
pub fn detect_rings(
    edges: &EdgeMap,
    center: [f64; 2],
    config: &DetectConfig,
) -> Result<DetectionResult, DetectError> {
    config.validate()?;
    run(edges, center, config, false).map(|(result, _)| result)
}
