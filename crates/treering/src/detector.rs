//! High-level detection API.
//!
//! [`Detector`] is the primary entry point. It holds a validated
//! [`DetectConfig`]; create it once and run it on many edge maps.

use crate::chain::ChainSet;
use crate::config::DetectConfig;
use crate::edges::EdgeMap;
use crate::error::{ConfigError, DetectError};
use crate::pipeline::DetectionResult;

/// Primary detection interface.
///
/// # Examples
///
/// ```no_run
/// use treering::{Detector, EdgeMap};
///
/// let detector = Detector::new();
/// let edges = EdgeMap::new([640, 480], Vec::new());
/// let result = detector.detect(&edges, [320.0, 240.0]).unwrap();
/// println!("found {} rings", result.rings.len());
/// ```
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectConfig,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Create a detector with the default configuration.
    pub fn new() -> Self {
        Self {
            config: DetectConfig::default(),
        }
    }

    /// Create with full config control. The config is validated here once.
    pub fn with_config(config: DetectConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the current configuration.
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Detect ring boundaries in `edges` around `center`.
    pub fn detect(&self, edges: &EdgeMap, center: [f64; 2]) -> Result<DetectionResult, DetectError> {
        crate::pipeline::run(edges, center, &self.config, false).map(|(result, _)| result)
    }

    /// Like [`Self::detect`], also returning the chain set reached by the
    /// connection engine (before completion) for external rendering.
    pub fn detect_with_chains(
        &self,
        edges: &EdgeMap,
        center: [f64; 2],
    ) -> Result<(DetectionResult, ChainSet), DetectError> {
        let (result, chains) = crate::pipeline::run(edges, center, &self.config, true)?;
        let chains = chains.unwrap_or_else(|| ChainSet::new(self.config.n_rays, center));
        Ok((result, chains))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainState;
    use crate::connect::connect_chains;
    use crate::edges::{detect_edge_curves, EdgeDetectConfig, EdgePoint};
    use crate::error::{DetectWarning, InputError};
    use crate::test_utils::{arc_curve, circle_curve, draw_ring_image, edge_map, noisy_circle_curve};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn assert_well_formed(result: &DetectionResult) {
        for ring in &result.rings {
            assert_eq!(ring.points.len(), result.n_rays);
            assert_eq!(ring.radii.len(), result.n_rays);
            assert_eq!(ring.n_measured + ring.n_interpolated, result.n_rays);
            assert!(ring.radii.iter().all(|r| r.is_finite() && *r > 0.0));
        }
        for pair in result.rings.windows(2) {
            assert!(pair[0].mean_radius < pair[1].mean_radius);
        }
    }

    #[test]
    fn single_circle_gives_one_ring() {
        let edges = edge_map(vec![circle_curve([0.0, 0.0], 100.0, 720, true)]);
        let result = Detector::new().detect(&edges, [0.0, 0.0]).unwrap();
        assert_well_formed(&result);
        assert_eq!(result.rings.len(), 1);
        assert_relative_eq!(result.rings[0].mean_radius, 100.0, epsilon = 0.01);
        assert_eq!(result.rings[0].n_interpolated, 0);
        assert_eq!(result.stats.connect.discarded, 0);
        assert!(result.is_complete());
    }

    #[test]
    fn circle_with_gap_is_closed() {
        let edges = edge_map(vec![arc_curve([0.0, 0.0], 100.0, 5.25, 355.25, 0.5)]);
        let result = Detector::new().detect(&edges, [0.0, 0.0]).unwrap();
        assert_well_formed(&result);
        assert_eq!(result.rings.len(), 1);
        let ring = &result.rings[0];
        assert_eq!(ring.n_interpolated, 10);
        assert_relative_eq!(ring.mean_radius, 100.0, epsilon = 0.01);
        assert_eq!(result.stats.completion.closed_by_interpolation, 1);
    }

    #[test]
    fn concentric_circles_are_ordered() {
        let edges = edge_map(vec![
            circle_curve([0.0, 0.0], 100.0, 720, true),
            circle_curve([0.0, 0.0], 50.0, 720, true),
        ]);
        let result = Detector::new().detect(&edges, [0.0, 0.0]).unwrap();
        assert_well_formed(&result);
        let radii = result.mean_radii();
        assert_eq!(radii.len(), 2);
        assert_relative_eq!(radii[0], 50.0, epsilon = 0.01);
        assert_relative_eq!(radii[1], 100.0, epsilon = 0.01);
    }

    #[test]
    fn empty_edge_set_gives_no_rings() {
        let result = Detector::new().detect(&edge_map(Vec::new()), [10.0, 10.0]).unwrap();
        assert!(result.rings.is_empty());
        assert!(result.is_complete());
    }

    #[test]
    fn isolated_short_arc_is_dropped() {
        let edges = edge_map(vec![arc_curve([0.0, 0.0], 60.0, 30.25, 35.25, 0.5)]);
        let result = Detector::new().detect(&edges, [0.0, 0.0]).unwrap();
        assert!(result.rings.is_empty());
        assert_eq!(result.stats.connect.discarded, 1);
    }

    #[test]
    fn fragmented_circle_is_reassembled() {
        let center = [300.0, 200.0];
        let curves = (0..8)
            .map(|i| {
                let start = 45.0 * i as f64 + 0.25;
                arc_curve(center, 120.0, start, start + 40.0, 0.5)
            })
            .collect();
        let result = Detector::new().detect(&edge_map(curves), center).unwrap();
        assert_well_formed(&result);
        assert_eq!(result.rings.len(), 1);
        assert_eq!(result.stats.connect.merges, 7);
        assert_eq!(result.rings[0].n_interpolated, 40);
    }

    #[test]
    fn noisy_rings_are_recovered() {
        let mut rng = StdRng::seed_from_u64(7);
        let center = [256.0, 256.0];
        let curves = [60.0, 95.0, 130.0]
            .iter()
            .map(|&r| noisy_circle_curve(&mut rng, center, r, 900, 0.4))
            .collect();
        let result = Detector::new().detect(&edge_map(curves), center).unwrap();
        assert_well_formed(&result);
        let radii = result.mean_radii();
        assert_eq!(radii.len(), 3);
        for (got, want) in radii.iter().zip([60.0, 95.0, 130.0]) {
            assert!((got - want).abs() < 0.5, "ring at {} expected near {}", got, want);
        }
    }

    #[test]
    fn duplicate_traces_collapse() {
        let edges = edge_map(vec![
            circle_curve([0.0, 0.0], 80.0, 720, true),
            circle_curve([0.0, 0.0], 81.0, 720, true),
        ]);
        let result = Detector::new().detect(&edges, [0.0, 0.0]).unwrap();
        assert_eq!(result.rings.len(), 1);
        assert_eq!(result.stats.duplicates_removed, 1);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let mut rng = StdRng::seed_from_u64(11);
        let center = [128.0, 128.0];
        let mut curves = vec![noisy_circle_curve(&mut rng, center, 70.0, 600, 0.5)];
        curves.push(arc_curve(center, 100.0, 0.25, 150.25, 0.5));
        curves.push(arc_curve(center, 100.5, 154.25, 340.25, 0.5));
        let edges = edge_map(curves);
        let detector = Detector::new();
        let a = detector.detect(&edges, center).unwrap();
        let b = detector.detect(&edges, center).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn converged_chains_are_a_fixed_point() {
        let center = [0.0, 0.0];
        let mut curves: Vec<_> = (0..6)
            .map(|i| {
                let start = 60.0 * i as f64 + 0.25;
                arc_curve(center, 90.0, start, start + 52.0, 0.5)
            })
            .collect();
        curves.push(arc_curve(center, 40.0, 10.25, 22.25, 0.5));
        let detector = Detector::new();
        let (_, chains) = detector.detect_with_chains(&edge_map(curves), center).unwrap();
        assert!(chains.is_consistent());
        let merged_once: Vec<_> = chains.iter().map(|c| (c.id(), c.state())).collect();

        let again = connect_chains(chains, detector.config());
        assert_eq!(again.stats.merges, 0);
        let merged_twice: Vec<_> = again.set.iter().map(|c| (c.id(), c.state())).collect();
        assert_eq!(merged_once, merged_twice);
        assert!(merged_twice.iter().any(|&(_, s)| s == ChainState::Discarded));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let center = [0.0, 0.0];
        let curves = (0..8)
            .map(|i| {
                let start = 45.0 * i as f64 + 0.25;
                arc_curve(center, 120.0, start, start + 40.0, 0.5)
            })
            .collect();
        let mut cfg = DetectConfig::default();
        cfg.connect.max_iterations = 2;
        let detector = Detector::with_config(cfg).unwrap();
        let result = detector.detect(&edge_map(curves), center).unwrap();
        assert!(!result.is_complete());
        assert_eq!(
            result.warnings,
            vec![DetectWarning::IterationCapReached { iterations: 2 }]
        );
        assert_well_formed(&result);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let detector = Detector::new();
        let edges = edge_map(vec![circle_curve([0.0, 0.0], 10.0, 90, true)]);

        assert!(matches!(
            detector.detect(&edges, [f64::NAN, 0.0]),
            Err(DetectError::Input(InputError::NonFiniteCenter { .. }))
        ));
        assert!(matches!(
            detector.detect(&edges, [2000.0, 5.0]),
            Err(DetectError::Input(InputError::CenterOutsideImage { .. }))
        ));
        assert!(matches!(
            detector.detect(&EdgeMap::new([0, 10], Vec::new()), [0.0, 0.0]),
            Err(DetectError::Input(InputError::EmptyImage { .. }))
        ));

        let mut bad = edges.clone();
        bad.curves[0].points[3] = EdgePoint::new([f64::INFINITY, 1.0], [1.0, 0.0]);
        assert_eq!(
            detector.detect(&bad, [0.0, 0.0]),
            Err(DetectError::Input(InputError::NonFinitePoint { curve: 0, point: 3 }))
        );
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut cfg = DetectConfig::default();
        cfg.completion.closing_fraction = 0.0;
        assert!(Detector::with_config(cfg.clone()).is_err());
        let edges = edge_map(Vec::new());
        assert!(matches!(
            crate::pipeline::detect_rings(&edges, [1.0, 1.0], &cfg),
            Err(DetectError::Config(_))
        ));
    }

    #[test]
    fn oversized_ray_count_fails_before_allocation() {
        let cfg = DetectConfig {
            n_rays: 1 << 62,
            ..Default::default()
        };
        assert!(matches!(
            Detector::with_config(cfg.clone()),
            Err(ConfigError::OutOfRange { field: "n_rays", .. })
        ));
        let edges = edge_map(vec![circle_curve([0.0, 0.0], 10.0, 90, true)]);
        assert!(matches!(
            crate::pipeline::detect_rings(&edges, [0.0, 0.0], &cfg),
            Err(DetectError::Config(ConfigError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn synthetic_image_end_to_end() {
        let center = [100.0, 100.0];
        let img = draw_ring_image(200, 200, center, &[40.0, 75.0], 1.5);
        let edges = detect_edge_curves(&img, &EdgeDetectConfig::default());
        let result = Detector::new().detect(&edges, center).unwrap();
        assert_well_formed(&result);
        assert!(!result.rings.is_empty());
        let near = |target: f64| result.rings.iter().any(|r| (r.mean_radius - target).abs() < 4.0);
        assert!(near(40.0), "radii {:?}", result.mean_radii());
        assert!(near(75.0), "radii {:?}", result.mean_radii());
    }
}
