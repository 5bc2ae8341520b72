//! Chain model: angularly sampled ring fragments around the pith.
//!
//! Rays are indexed `0..n_rays`; ray `k` points along
//! `θ_k = 2πk / n_rays`, measured with `atan2(y - cy, x - cx)` in image
//! coordinates. A [`Chain`] stores its nodes in counter-clockwise order
//! (increasing ray index modulo `n_rays`) from endpoint A to endpoint B, with
//! at most one node per ray.

mod properties;
mod set;

pub use properties::ChainProperties;
pub(crate) use properties::radius_moments;
pub use set::ChainSet;

use std::f64::consts::TAU;

/// Stable chain identifier inside a [`ChainSet`].
pub type ChainId = usize;

/// Lifecycle state of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// Still growing; may take part in merges.
    Open,
    /// Owns a node on every ray. Terminal.
    Closed,
    /// Too short or unsupported after convergence. Terminal.
    Discarded,
}

/// One sample of a ring fragment on a ray.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Ray index in `0..n_rays`.
    pub ray: usize,
    /// Distance from the center along the ray (pixels).
    pub radius: f64,
    /// Position in image coordinates.
    pub xy: [f64; 2],
    /// Owning chain.
    pub chain: ChainId,
    /// `true` when synthesized by completion rather than measured.
    pub interpolated: bool,
}

impl Node {
    /// Build a node on `ray` at `radius` from `center`.
    pub fn on_ray(ray: usize, radius: f64, center: [f64; 2], n_rays: usize) -> Self {
        let theta = ray_angle(ray, n_rays);
        Self {
            ray,
            radius,
            xy: [
                center[0] + radius * theta.cos(),
                center[1] + radius * theta.sin(),
            ],
            chain: 0,
            interpolated: false,
        }
    }
}

/// Run of empty rays inside a chain's angular domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayGap {
    /// First empty ray.
    pub start: usize,
    /// Number of consecutive empty rays.
    pub len: usize,
}

/// Why a merge or a closure was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// One of the chains is not open.
    NotOpen,
    /// The chains neither touch nor overlap within tolerance.
    NotAdjacent,
    /// The empty gap between the chains is too wide.
    GapTooLarge { gap: usize, max: usize },
    /// The chains overlap by too many rays.
    OverlapTooLarge { overlap: usize, max: usize },
    /// The merged chain would wrap past a full circle.
    SpanExceedsCircle { span: usize },
    /// The radial jump between adjacent endpoints is too large.
    RadialJump { jump: f64, tolerance: f64 },
    /// The bridge is much steeper than the chains it joins.
    IrregularSlope { slope: f64, max: f64 },
    /// The bridge across the gap crosses another chain.
    CrossesChain { chain: ChainId },
    /// The merge cost is above threshold.
    TooCostly { cost: f64 },
    /// The resulting node order would not be angularly monotonic.
    NonMonotonic,
    /// The chain spans too little of the circle to be closed.
    TooShort { span: usize },
    /// A gap is wider than completion may interpolate.
    ClosingGapTooLarge { gap: usize, max: usize },
    /// Interpolated nodes would land on or inside an accepted ring.
    CrossesRing { ring: ChainId },
}

impl Rejection {
    /// Short stable label used in statistics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotOpen => "not_open",
            Self::NotAdjacent => "not_adjacent",
            Self::GapTooLarge { .. } => "gap_too_large",
            Self::OverlapTooLarge { .. } => "overlap_too_large",
            Self::SpanExceedsCircle { .. } => "span_exceeds_circle",
            Self::RadialJump { .. } => "radial_jump",
            Self::IrregularSlope { .. } => "irregular_slope",
            Self::CrossesChain { .. } => "crosses_chain",
            Self::TooCostly { .. } => "too_costly",
            Self::NonMonotonic => "non_monotonic",
            Self::TooShort { .. } => "too_short",
            Self::ClosingGapTooLarge { .. } => "closing_gap_too_large",
            Self::CrossesRing { .. } => "crosses_ring",
        }
    }
}

/// Angle of ray `ray` in radians.
#[inline]
pub fn ray_angle(ray: usize, n_rays: usize) -> f64 {
    TAU * ray as f64 / n_rays as f64
}

/// Number of counter-clockwise ray steps from `from` to `to`.
#[inline]
pub(crate) fn ray_offset(from: usize, to: usize, n_rays: usize) -> usize {
    (to + n_rays - from) % n_rays
}

/// Ordered, angularly monotonic sequence of nodes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Chain {
    id: ChainId,
    n_rays: usize,
    nodes: Vec<Node>,
    state: ChainState,
    support: bool,
}

impl Chain {
    pub(crate) fn new(id: ChainId, n_rays: usize, mut nodes: Vec<Node>) -> Self {
        for node in &mut nodes {
            node.chain = id;
        }
        let state = if nodes.len() == n_rays {
            ChainState::Closed
        } else {
            ChainState::Open
        };
        Self {
            id,
            n_rays,
            nodes,
            state,
            support: false,
        }
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn n_rays(&self) -> usize {
        self.n_rays
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChainState::Open
    }

    /// Whether another chain corroborates this one (see the connection engine).
    pub fn is_supported(&self) -> bool {
        self.support
    }

    pub(crate) fn set_state(&mut self, state: ChainState) {
        self.state = state;
    }

    pub(crate) fn set_support(&mut self, support: bool) {
        self.support = support;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Endpoint A (first node counter-clockwise).
    pub fn first(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Endpoint B (last node counter-clockwise).
    pub fn last(&self) -> Option<&Node> {
        self.nodes.last()
    }

    fn start_ray(&self) -> usize {
        self.nodes.first().map_or(0, |n| n.ray)
    }

    fn offset_of(&self, ray: usize) -> usize {
        ray_offset(self.start_ray(), ray, self.n_rays)
    }

    /// Number of rays from A to B inclusive, gaps included.
    pub fn span(&self) -> usize {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(a), Some(b)) => ray_offset(a.ray, b.ray, self.n_rays) + 1,
            _ => 0,
        }
    }

    /// Whether `ray` lies inside the angular domain `[A, B]`.
    pub fn contains_ray(&self, ray: usize) -> bool {
        !self.nodes.is_empty() && self.offset_of(ray) < self.span()
    }

    /// Node sampled on `ray`, if any.
    pub fn node_at(&self, ray: usize) -> Option<&Node> {
        if !self.contains_ray(ray) {
            return None;
        }
        let off = self.offset_of(ray);
        self.nodes
            .binary_search_by_key(&off, |n| self.offset_of(n.ray))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Radius on `ray`: the node radius when sampled, linear interpolation
    /// between the bracketing nodes inside a gap, `None` outside the domain.
    pub fn radius_at(&self, ray: usize) -> Option<f64> {
        if !self.contains_ray(ray) {
            return None;
        }
        let off = self.offset_of(ray);
        let idx = self.nodes.partition_point(|n| self.offset_of(n.ray) < off);
        let next = &self.nodes[idx];
        let next_off = self.offset_of(next.ray);
        if next_off == off || idx == 0 {
            return Some(next.radius);
        }
        let prev = &self.nodes[idx - 1];
        let prev_off = self.offset_of(prev.ray);
        let t = (off - prev_off) as f64 / (next_off - prev_off) as f64;
        Some(prev.radius + t * (next.radius - prev.radius))
    }

    /// Radius of the boundary node angularly closest to `ray` when the ray
    /// lies outside the domain; same as [`Self::radius_at`] inside it.
    pub fn radius_near(&self, ray: usize) -> Option<f64> {
        if let Some(r) = self.radius_at(ray) {
            return Some(r);
        }
        let (a, b) = (self.first()?, self.last()?);
        let to_a = ray_offset(ray, a.ray, self.n_rays);
        let from_b = ray_offset(b.ray, ray, self.n_rays);
        Some(if to_a <= from_b { a.radius } else { b.radius })
    }

    /// Empty-ray runs strictly between A and B.
    pub fn gaps(&self) -> Vec<RayGap> {
        self.nodes
            .windows(2)
            .filter_map(|w| {
                let step = ray_offset(w[0].ray, w[1].ray, self.n_rays);
                (step > 1).then(|| RayGap {
                    start: (w[0].ray + 1) % self.n_rays,
                    len: step - 1,
                })
            })
            .collect()
    }

    /// Empty rays between B and A going counter-clockwise.
    pub fn wrap_gap(&self) -> usize {
        self.n_rays - self.span().min(self.n_rays)
    }

    /// Largest empty run, the wrap gap included.
    pub fn max_gap(&self) -> usize {
        self.gaps()
            .iter()
            .map(|g| g.len)
            .max()
            .unwrap_or(0)
            .max(self.wrap_gap())
    }

    /// Ray offsets from A are strictly increasing and stay below `n_rays`.
    pub fn is_angularly_monotonic(&self) -> bool {
        if self.nodes.iter().any(|n| n.ray >= self.n_rays) {
            return false;
        }
        let mut prev: Option<usize> = None;
        for node in &self.nodes {
            let off = self.offset_of(node.ray);
            if prev.is_some_and(|p| off <= p) {
                return false;
            }
            prev = Some(off);
        }
        true
    }

    /// Steepest radius change per ray between consecutive nodes.
    pub fn max_slope(&self) -> f64 {
        self.nodes
            .windows(2)
            .map(|w| {
                let step = ray_offset(w[0].ray, w[1].ray, self.n_rays).max(1);
                (w[1].radius - w[0].radius).abs() / step as f64
            })
            .fold(0.0, f64::max)
    }

    /// Rays of the angular domain, from A to B counter-clockwise.
    pub fn domain_rays(&self) -> impl Iterator<Item = usize> + '_ {
        let start = self.start_ray();
        (0..self.span()).map(move |j| (start + j) % self.n_rays)
    }

    /// Number of measured (non-interpolated) nodes.
    pub fn measured_len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.interpolated).count()
    }

    /// Geometric descriptor of the current node list.
    pub fn properties(&self) -> Option<ChainProperties> {
        ChainProperties::of(self)
    }
}
