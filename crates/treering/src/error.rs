//! Error and warning types returned by the detection pipeline.

// ── Configuration ──────────────────────────────────────────────────────────

/// Invalid configuration value, reported before any stage runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value that must be finite and strictly positive is not.
    NotPositive {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Value found in the configuration.
        value: f64,
    },
    /// A value lies outside its admissible range.
    OutOfRange {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Value found in the configuration.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// The connection pass schedule has no entries.
    EmptyPassSchedule,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} must be finite and positive, got {}", field, value)
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "{} must lie in [{}, {}], got {}",
                field, min, max, value
            ),
            Self::EmptyPassSchedule => write!(f, "connect.passes must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Input ──────────────────────────────────────────────────────────────────

/// Malformed detection input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// The edge map reports a zero-sized image.
    EmptyImage {
        /// Reported image size `[width, height]`.
        image_size: [u32; 2],
    },
    /// Center coordinates are NaN or infinite.
    NonFiniteCenter {
        /// Center as supplied by the caller.
        center: [f64; 2],
    },
    /// Center lies outside `[0, width) x [0, height)`.
    CenterOutsideImage {
        /// Center as supplied by the caller.
        center: [f64; 2],
        /// Image size `[width, height]`.
        image_size: [u32; 2],
    },
    /// An edge point has NaN or infinite coordinates.
    NonFinitePoint {
        /// Index of the curve in the edge map.
        curve: usize,
        /// Index of the point within the curve.
        point: usize,
    },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyImage { image_size } => {
                write!(f, "empty image: {}x{}", image_size[0], image_size[1])
            }
            Self::NonFiniteCenter { center } => {
                write!(f, "center is not finite: ({}, {})", center[0], center[1])
            }
            Self::CenterOutsideImage { center, image_size } => write!(
                f,
                "center ({:.2}, {:.2}) lies outside the {}x{} image",
                center[0], center[1], image_size[0], image_size[1]
            ),
            Self::NonFinitePoint { curve, point } => {
                write!(f, "edge point {} of curve {} is not finite", point, curve)
            }
        }
    }
}

impl std::error::Error for InputError {}

// ── Top-level ──────────────────────────────────────────────────────────────

/// Error returned by [`crate::Detector`] entry points.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    /// Configuration failed validation.
    Config(ConfigError),
    /// Input failed validation.
    Input(InputError),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
            Self::Input(e) => write!(f, "invalid input: {}", e),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Input(e) => Some(e),
        }
    }
}

impl From<ConfigError> for DetectError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<InputError> for DetectError {
    fn from(e: InputError) -> Self {
        Self::Input(e)
    }
}

/// Non-fatal condition attached to a [`crate::DetectionResult`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DetectWarning {
    /// The connection engine stopped at its iteration cap before reaching a
    /// fixed point; rings were built from the best chain set reached.
    IterationCapReached {
        /// Number of candidate evaluations performed.
        iterations: usize,
    },
}

impl std::fmt::Display for DetectWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IterationCapReached { iterations } => write!(
                f,
                "chain connection stopped after {} iterations without converging",
                iterations
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_error_wraps_sources() {
        let e: DetectError = ConfigError::EmptyPassSchedule.into();
        assert!(e.to_string().contains("connect.passes"));
        assert!(std::error::Error::source(&e).is_some());

        let e: DetectError = InputError::NonFiniteCenter {
            center: [f64::NAN, 1.0],
        }
        .into();
        assert!(matches!(e, DetectError::Input(_)));
    }

    #[test]
    fn warning_serializes_with_kind_tag() {
        let w = DetectWarning::IterationCapReached { iterations: 12 };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"iteration_cap_reached\""));
        assert!(json.contains("12"));
    }
}
