//! Ring completion: close nearly full chains by interpolation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::chain::{radius_moments, ray_offset, Chain, ChainId, ChainSet, ChainState, Node, Rejection};
use crate::config::DetectConfig;

/// One detected growth-ring boundary: exactly one point per ray.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ring {
    /// Id of the chain the ring was built from.
    pub id: ChainId,
    /// Boundary points in image coordinates, indexed by ray.
    pub points: Vec<[f64; 2]>,
    /// Distance from the center, indexed by ray.
    pub radii: Vec<f64>,
    pub mean_radius: f64,
    /// Points taken from edge data.
    pub n_measured: usize,
    /// Points synthesized by completion.
    pub n_interpolated: usize,
}

impl Ring {
    /// Build from a closed chain; `None` unless it owns every ray.
    pub(crate) fn from_chain(chain: &Chain) -> Option<Self> {
        let n = chain.n_rays();
        if chain.len() != n {
            return None;
        }
        let mut nodes: Vec<&Node> = chain.nodes().iter().collect();
        nodes.sort_by_key(|node| node.ray);
        let radii: Vec<f64> = nodes.iter().map(|node| node.radius).collect();
        let (mean_radius, _) = radius_moments(radii.iter().copied())?;
        let n_interpolated = nodes.iter().filter(|node| node.interpolated).count();
        Some(Self {
            id: chain.id(),
            points: nodes.iter().map(|node| node.xy).collect(),
            radii,
            mean_radius,
            n_measured: n - n_interpolated,
            n_interpolated,
        })
    }

    pub fn n_rays(&self) -> usize {
        self.radii.len()
    }
}

/// Completion counters.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CompletionStats {
    /// Chains that were already closed.
    pub closed_direct: usize,
    /// Chains closed by interpolating their gaps.
    pub closed_by_interpolation: usize,
    /// Nodes synthesized across all closures.
    pub interpolated_nodes: usize,
    /// Closures refused, by reason.
    pub rejections: BTreeMap<&'static str, usize>,
}

/// Result of [`complete_rings`].
#[derive(Debug, Clone)]
pub struct Completion {
    /// Rings, innermost first.
    pub rings: Vec<Ring>,
    /// Remaining chains; all of them closed.
    pub set: ChainSet,
    pub stats: CompletionStats,
}

/// Radii of the gap rays between `prev` and `next` (counter-clockwise).
///
/// With an inner ring the ratio `r / r_inner` is interpolated so the filled
/// section follows the inner ring's shape; otherwise `r` itself is.
fn fill_gap(prev: &Node, next: &Node, missing: usize, n: usize, inner: Option<&[f64]>) -> Vec<(usize, f64)> {
    let steps = (missing + 1) as f64;
    let guide = inner.filter(|r| r[prev.ray] > 0.0 && r[next.ray] > 0.0);
    (1..=missing)
        .map(|j| {
            let ray = (prev.ray + j) % n;
            let t = j as f64 / steps;
            let radius = match guide {
                Some(r) => {
                    let q0 = prev.radius / r[prev.ray];
                    let q1 = next.radius / r[next.ray];
                    r[ray] * (q0 + t * (q1 - q0))
                }
                None => prev.radius + t * (next.radius - prev.radius),
            };
            (ray, radius)
        })
        .collect()
}

/// Try to close an open chain. Returns the full node list ordered by ray.
fn close_chain(
    chain: &Chain,
    accepted: &[Ring],
    min_span: f64,
    max_gap: usize,
    center: [f64; 2],
) -> Result<Vec<Node>, Rejection> {
    let n = chain.n_rays();
    if (chain.span() as f64) < min_span {
        return Err(Rejection::TooShort { span: chain.span() });
    }
    let widest = chain.max_gap();
    if widest > max_gap {
        return Err(Rejection::ClosingGapTooLarge {
            gap: widest,
            max: max_gap,
        });
    }

    let inner = accepted.last().map(|ring| ring.radii.as_slice());
    let nodes = chain.nodes();
    let mut full: Vec<Node> = nodes.to_vec();
    for (i, prev) in nodes.iter().enumerate() {
        let next = &nodes[(i + 1) % nodes.len()];
        let step = match ray_offset(prev.ray, next.ray, n) {
            0 => n,
            s => s,
        };
        for (ray, radius) in fill_gap(prev, next, step - 1, n, inner) {
            if let Some(ring) = accepted.iter().find(|ring| radius <= ring.radii[ray]) {
                return Err(Rejection::CrossesRing { ring: ring.id });
            }
            let mut node = Node::on_ray(ray, radius, center, n);
            node.interpolated = true;
            full.push(node);
        }
    }
    full.sort_by_key(|node| node.ray);
    Ok(full)
}

/// Turn the converged chain set into rings.
///
/// Discarded chains are retired. The rest are visited from the smallest
/// mean radius outwards: closed chains become rings as they are; open chains
/// spanning at least `closing_fraction` of the circle with no gap wider than
/// `max_closing_gap_deg` are closed by interpolation; anything else is retired.
pub fn complete_rings(mut set: ChainSet, config: &DetectConfig) -> Completion {
    let params = &config.completion;
    let n = config.n_rays;
    let min_span = params.closing_fraction * n as f64;
    let max_gap = config.deg_to_rays(params.max_closing_gap_deg);
    let mut stats = CompletionStats::default();

    for id in set.ids_in_state(ChainState::Discarded) {
        set.retire(id);
    }

    let mut order: Vec<(f64, ChainId)> = set
        .iter()
        .filter_map(|c| c.properties().map(|p| (p.mean_radius, c.id())))
        .collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut rings: Vec<Ring> = Vec::new();
    for (_, id) in order {
        let Some(chain) = set.get(id) else {
            continue;
        };
        if chain.state() == ChainState::Closed {
            if let Some(ring) = Ring::from_chain(chain) {
                stats.closed_direct += 1;
                rings.push(ring);
            }
            continue;
        }

        match close_chain(chain, &rings, min_span, max_gap, set.center()) {
            Ok(nodes) => {
                let added = nodes.iter().filter(|node| node.interpolated).count();
                set.close_with(id, nodes);
                if let Some(ring) = set.get(id).and_then(Ring::from_chain) {
                    debug!(chain = id, interpolated = added, mean_radius = ring.mean_radius, "closed chain");
                    stats.closed_by_interpolation += 1;
                    stats.interpolated_nodes += added;
                    rings.push(ring);
                }
            }
            Err(why) => {
                debug!(chain = id, reason = why.label(), "chain not closable");
                *stats.rejections.entry(why.label()).or_insert(0) += 1;
                set.retire(id);
            }
        }
    }

    Completion { rings, set, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arc(set: &mut ChainSet, rays: impl Iterator<Item = usize>, r: impl Fn(usize) -> f64) -> ChainId {
        let n = set.n_rays();
        let nodes = rays
            .map(|k| Node::on_ray(k % n, r(k % n), set.center(), n))
            .collect();
        set.insert(nodes)
    }

    #[test]
    fn closed_chain_becomes_ring_ordered_by_ray() {
        let mut set = ChainSet::new(36, [0.0, 0.0]);
        arc(&mut set, 10..46, |k| 20.0 + k as f64 * 0.01);
        let out = complete_rings(set, &DetectConfig { n_rays: 36, ..Default::default() });
        assert_eq!(out.rings.len(), 1);
        let ring = &out.rings[0];
        assert_eq!(ring.n_rays(), 36);
        assert_eq!(ring.n_interpolated, 0);
        assert_relative_eq!(ring.radii[0], 20.0, epsilon = 1e-12);
        assert_relative_eq!(ring.radii[35], 20.35, epsilon = 1e-12);
        assert_eq!(out.stats.closed_direct, 1);
    }

    #[test]
    fn wrap_gap_is_filled_linearly() {
        let mut set = ChainSet::new(360, [0.0, 0.0]);
        arc(&mut set, 6..356, |k| if k == 355 { 101.0 } else { 100.0 });
        let out = complete_rings(set, &DetectConfig::default());
        let ring = &out.rings[0];
        assert_eq!(ring.n_interpolated, 10);
        assert_eq!(ring.n_measured, 350);
        // Rays 356..=359, 0..=5 lie between ray 355 (r = 101) and ray 6 (r = 100).
        assert_relative_eq!(ring.radii[356], 101.0 - 1.0 / 11.0, epsilon = 1e-9);
        assert_relative_eq!(ring.radii[0], 101.0 - 5.0 / 11.0, epsilon = 1e-9);
        assert_eq!(out.set.count_in_state(ChainState::Closed), 1);
        assert!(out.set.is_consistent());
    }

    #[test]
    fn gap_follows_inner_ring_shape() {
        let mut set = ChainSet::new(360, [0.0, 0.0]);
        let wavy = |k: usize| 50.0 + 5.0 * (k as f64).to_radians().sin();
        arc(&mut set, 0..360, wavy);
        arc(&mut set, (60..360).chain(0..30), |k| 2.0 * wavy(k));
        let out = complete_rings(set, &DetectConfig::default());
        assert_eq!(out.rings.len(), 2);
        let outer = &out.rings[1];
        for k in 30..60 {
            assert_relative_eq!(outer.radii[k], 2.0 * wavy(k), epsilon = 1e-9);
        }
    }

    #[test]
    fn short_or_gappy_chains_are_retired() {
        let mut set = ChainSet::new(360, [0.0, 0.0]);
        arc(&mut set, 0..200, |_| 40.0);
        arc(&mut set, (0..100).chain(160..350), |_| 80.0);
        let out = complete_rings(set, &DetectConfig::default());
        assert!(out.rings.is_empty());
        assert!(out.set.is_empty());
        assert_eq!(out.stats.rejections.get("too_short"), Some(&1));
        assert_eq!(out.stats.rejections.get("closing_gap_too_large"), Some(&1));
    }

    #[test]
    fn closure_inside_accepted_ring_is_rejected() {
        let mut set = ChainSet::new(360, [0.0, 0.0]);
        arc(&mut set, 0..360, |k| if (0..40).contains(&k) { 70.0 } else { 50.0 });
        // Mean radius above the inner ring, but its gap dips under it.
        let outer = arc(&mut set, 20..355, |k| if k == 20 || k == 354 { 55.0 } else { 80.0 });
        let out = complete_rings(set, &DetectConfig::default());
        assert_eq!(out.rings.len(), 1);
        assert!(out.set.get(outer).is_none());
        assert_eq!(out.stats.rejections.get("crosses_ring"), Some(&1));
    }

    #[test]
    fn discarded_chains_are_retired_first() {
        let mut set = ChainSet::new(360, [0.0, 0.0]);
        let id = arc(&mut set, 0..360, |_| 30.0);
        set.set_state(id, ChainState::Discarded);
        let out = complete_rings(set, &DetectConfig::default());
        assert!(out.rings.is_empty());
        assert!(out.set.is_empty());
    }
}
