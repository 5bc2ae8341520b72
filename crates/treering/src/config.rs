use std::path::Path;

use crate::error::ConfigError;

/// Polar sampling controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Minimum number of ray crossings a curve run needs to become a chain.
    pub min_nodes: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { min_nodes: 2 }
    }
}

/// One pass of the connection schedule.
///
/// Passes run in order, each to a fixed point. The last pass should be the
/// most permissive in every tolerance.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConnectPass {
    /// Largest empty angular gap (degrees) a merge may bridge.
    pub max_angular_gap_deg: f64,
    /// Radial discontinuity tolerance relative to the local radius.
    pub radial_tolerance_rel: f64,
    /// A bridge may be at most this many times steeper (radius change per
    /// ray) than the steepest step inside the two chains it joins.
    #[serde(default = "default_slope_ratio")]
    pub slope_ratio: f64,
}

fn default_slope_ratio() -> f64 {
    1.5
}

impl ConnectPass {
    pub const fn new(
        max_angular_gap_deg: f64,
        radial_tolerance_rel: f64,
        slope_ratio: f64,
    ) -> Self {
        Self {
            max_angular_gap_deg,
            radial_tolerance_rel,
            slope_ratio,
        }
    }
}

/// Weights of the merge cost terms.
///
/// Every term is normalized by its pass tolerance, so a weight of 1 means a
/// candidate at the edge of that tolerance contributes 1 to the cost.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Weight of the empty angular gap between the two chains.
    pub gap: f64,
    /// Weight of the radial jump between the adjacent endpoints.
    pub radial: f64,
    /// Weight of the relative radial spread of the merged chain.
    pub variance: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            gap: 1.0,
            radial: 1.0,
            variance: 1.0,
        }
    }
}

/// Chain connection engine parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Pass schedule, strict to permissive.
    pub passes: Vec<ConnectPass>,
    /// Absolute part of the radial tolerance (pixels).
    pub radial_tolerance_px: f64,
    /// Lower bound (pixels per ray) on the chain steepness a bridge is
    /// compared against, so smooth chains still tolerate sampling noise.
    pub slope_floor_px: f64,
    /// Largest angular overlap (degrees) between two chains that may still be merged.
    pub max_overlap_deg: f64,
    /// Cost term weights.
    pub weights: CostWeights,
    /// Candidates costing more than this are never merged.
    pub max_cost: f64,
    /// Open chains spanning fewer degrees than this are discarded after convergence.
    pub min_chain_span_deg: f64,
    /// Angular window (degrees) around a chain searched for corroborating chains.
    pub support_window_deg: f64,
    /// Chains spanning at least this fraction of the circle support themselves.
    pub self_support_fraction: f64,
    /// Hard cap on candidate evaluations across all passes.
    pub max_iterations: usize,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            passes: vec![
                ConnectPass::new(10.0, 0.1, 1.5),
                ConnectPass::new(10.0, 0.2, 1.5),
                ConnectPass::new(22.0, 0.1, 1.5),
                ConnectPass::new(22.0, 0.2, 1.5),
                ConnectPass::new(45.0, 0.1, 1.5),
                ConnectPass::new(45.0, 0.2, 1.5),
                ConnectPass::new(22.0, 0.1, 2.0),
                ConnectPass::new(45.0, 0.2, 2.0),
            ],
            radial_tolerance_px: 2.0,
            slope_floor_px: 1.5,
            max_overlap_deg: 2.0,
            weights: CostWeights::default(),
            max_cost: 3.0,
            min_chain_span_deg: 10.0,
            support_window_deg: 45.0,
            self_support_fraction: 0.9,
            max_iterations: 200_000,
        }
    }
}

/// Ring completion and deduplication parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompletionParams {
    /// Minimum angular span, as a fraction of the circle, for a chain to be closed.
    pub closing_fraction: f64,
    /// Largest gap (degrees) completion is allowed to interpolate.
    pub max_closing_gap_deg: f64,
    /// Two rings closer than this in mean radius (pixels) may be duplicates.
    pub duplicate_radius_px: f64,
    /// Fraction of rays within `duplicate_radius_px` above which two rings are duplicates.
    pub duplicate_similarity: f64,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            closing_fraction: 0.9,
            max_closing_gap_deg: 45.0,
            duplicate_radius_px: 3.0,
            duplicate_similarity: 0.8,
        }
    }
}

/// Top-level detection configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Number of equally spaced rays around the center.
    pub n_rays: usize,
    /// Polar sampling.
    pub sampler: SamplerConfig,
    /// Chain connection engine.
    pub connect: ConnectConfig,
    /// Completion and deduplication.
    pub completion: CompletionParams,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            n_rays: 360,
            sampler: SamplerConfig::default(),
            connect: ConnectConfig::default(),
            completion: CompletionParams::default(),
        }
    }
}

impl DetectConfig {
    const MIN_RAYS: usize = 8;
    const MAX_RAYS: usize = 36_000;

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every numeric parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        range(
            "n_rays",
            self.n_rays as f64,
            Self::MIN_RAYS as f64,
            Self::MAX_RAYS as f64,
        )?;
        range("sampler.min_nodes", self.sampler.min_nodes as f64, 1.0, f64::MAX)?;

        let c = &self.connect;
        if c.passes.is_empty() {
            return Err(ConfigError::EmptyPassSchedule);
        }
        for pass in &c.passes {
            positive("connect.passes.max_angular_gap_deg", pass.max_angular_gap_deg)?;
            range(
                "connect.passes.max_angular_gap_deg",
                pass.max_angular_gap_deg,
                0.0,
                360.0,
            )?;
            positive(
                "connect.passes.radial_tolerance_rel",
                pass.radial_tolerance_rel,
            )?;
            range("connect.passes.slope_ratio", pass.slope_ratio, 1.0, f64::MAX)?;
        }
        positive("connect.radial_tolerance_px", c.radial_tolerance_px)?;
        positive("connect.slope_floor_px", c.slope_floor_px)?;
        positive("connect.max_overlap_deg", c.max_overlap_deg)?;
        range("connect.max_overlap_deg", c.max_overlap_deg, 0.0, 180.0)?;
        non_negative("connect.weights.gap", c.weights.gap)?;
        non_negative("connect.weights.radial", c.weights.radial)?;
        non_negative("connect.weights.variance", c.weights.variance)?;
        positive("connect.max_cost", c.max_cost)?;
        positive("connect.min_chain_span_deg", c.min_chain_span_deg)?;
        range("connect.min_chain_span_deg", c.min_chain_span_deg, 0.0, 360.0)?;
        positive("connect.support_window_deg", c.support_window_deg)?;
        range("connect.support_window_deg", c.support_window_deg, 0.0, 360.0)?;
        fraction("connect.self_support_fraction", c.self_support_fraction)?;
        range("connect.max_iterations", c.max_iterations as f64, 1.0, f64::MAX)?;

        let p = &self.completion;
        fraction("completion.closing_fraction", p.closing_fraction)?;
        positive("completion.max_closing_gap_deg", p.max_closing_gap_deg)?;
        range(
            "completion.max_closing_gap_deg",
            p.max_closing_gap_deg,
            0.0,
            360.0,
        )?;
        positive("completion.duplicate_radius_px", p.duplicate_radius_px)?;
        fraction("completion.duplicate_similarity", p.duplicate_similarity)?;
        Ok(())
    }

    /// Angular step between two rays, in degrees.
    pub fn ray_step_deg(&self) -> f64 {
        360.0 / self.n_rays as f64
    }

    /// Convert an angle in degrees into a whole number of rays (rounded up).
    pub(crate) fn deg_to_rays(&self, deg: f64) -> usize {
        let rays = (deg / self.ray_step_deg() - 1e-9).ceil();
        (rays.max(0.0) as usize).min(self.n_rays)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    range(field, value, 0.0, f64::MAX)
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    positive(field, value)?;
    range(field, value, 0.0, 1.0)
}

fn range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DetectConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let mut cfg = DetectConfig::default();
        cfg.connect.radial_tolerance_px = 0.0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NotPositive {
                field: "connect.radial_tolerance_px",
                value: 0.0
            })
        );

        let mut cfg = DetectConfig::default();
        cfg.completion.duplicate_radius_px = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_fraction_above_one_and_empty_schedule() {
        let mut cfg = DetectConfig::default();
        cfg.completion.closing_fraction = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                field: "completion.closing_fraction",
                ..
            })
        ));

        let mut cfg = DetectConfig::default();
        cfg.connect.passes.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyPassSchedule));
    }

    #[test]
    fn rejects_too_few_rays() {
        let cfg = DetectConfig {
            n_rays: 4,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_ray_count_too_large_to_allocate() {
        let cfg = DetectConfig {
            n_rays: 1 << 62,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { field: "n_rays", .. })
        ));
        let cfg = DetectConfig {
            n_rays: 36_000,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn slope_ratio_defaults_and_is_checked() {
        let cfg: DetectConfig = serde_json::from_str(
            r#"{"connect": {"passes": [{"max_angular_gap_deg": 30.0, "radial_tolerance_rel": 0.15}]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.connect.passes, vec![ConnectPass::new(30.0, 0.15, 1.5)]);
        assert!(cfg.validate().is_ok());

        let mut cfg = DetectConfig::default();
        cfg.connect.passes[0].slope_ratio = 0.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                field: "connect.passes.slope_ratio",
                ..
            })
        ));
    }

    #[test]
    fn last_default_pass_is_most_permissive() {
        let passes = ConnectConfig::default().passes;
        let last = passes[passes.len() - 1];
        assert!(passes.iter().all(|p| {
            p.max_angular_gap_deg <= last.max_angular_gap_deg
                && p.radial_tolerance_rel <= last.radial_tolerance_rel
                && p.slope_ratio <= last.slope_ratio
        }));
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: DetectConfig =
            serde_json::from_str(r#"{"n_rays": 720, "completion": {"closing_fraction": 0.8}}"#)
                .unwrap();
        assert_eq!(cfg.n_rays, 720);
        assert_eq!(cfg.completion.closing_fraction, 0.8);
        assert_eq!(cfg.completion.max_closing_gap_deg, 45.0);
        assert_eq!(cfg.connect.passes.len(), 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn degrees_round_up_to_rays() {
        let cfg = DetectConfig::default();
        assert_eq!(cfg.deg_to_rays(10.0), 10);
        assert_eq!(cfg.deg_to_rays(2.5), 3);
        let cfg = DetectConfig {
            n_rays: 720,
            ..Default::default()
        };
        assert_eq!(cfg.deg_to_rays(10.0), 20);
        assert_eq!(cfg.deg_to_rays(400.0), 720);
    }
}
