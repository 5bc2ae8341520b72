use super::{ray_angle, Chain, Node};

/// Geometric descriptor of a chain.
///
/// Always computed from the current node list; never cached across a merge.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChainProperties {
    /// Mean node radius (pixels).
    pub mean_radius: f64,
    /// Population variance of node radii.
    pub radius_variance: f64,
    /// Endpoint A.
    pub endpoint_a: Node,
    /// Endpoint B.
    pub endpoint_b: Node,
    /// Angle of endpoint A in degrees, `[0, 360)`.
    pub start_angle_deg: f64,
    /// Angle of endpoint B in degrees, `[0, 360)`.
    pub end_angle_deg: f64,
    /// Number of nodes.
    pub n_nodes: usize,
    /// Rays from A to B inclusive.
    pub span: usize,
    /// Largest internal run of empty rays (wrap gap excluded).
    pub max_internal_gap: usize,
}

impl ChainProperties {
    pub(crate) fn of(chain: &Chain) -> Option<Self> {
        let a = chain.first()?;
        let b = chain.last()?;
        let (mean_radius, radius_variance) =
            radius_moments(chain.nodes().iter().map(|n| n.radius))?;
        let n = chain.n_rays();
        Some(Self {
            mean_radius,
            radius_variance,
            endpoint_a: a.clone(),
            endpoint_b: b.clone(),
            start_angle_deg: ray_angle(a.ray, n).to_degrees(),
            end_angle_deg: ray_angle(b.ray, n).to_degrees(),
            n_nodes: chain.len(),
            span: chain.span(),
            max_internal_gap: chain.gaps().iter().map(|g| g.len).max().unwrap_or(0),
        })
    }

    /// Radius standard deviation relative to the mean radius.
    pub fn relative_spread(&self) -> f64 {
        if self.mean_radius > 0.0 {
            self.radius_variance.sqrt() / self.mean_radius
        } else {
            0.0
        }
    }
}

/// Mean and population variance of a radius sequence; `None` when empty.
pub(crate) fn radius_moments<I: IntoIterator<Item = f64>>(radii: I) -> Option<(f64, f64)> {
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for r in radii {
        n += 1;
        sum += r;
        sum_sq += r * r;
    }
    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    Some((mean, var))
}
