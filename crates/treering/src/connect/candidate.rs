//! Merge candidate evaluation: admissibility checks and cost.

use std::collections::BTreeMap;

use crate::chain::{radius_moments, ray_offset, Chain, ChainId, ChainSet, Node, Rejection};
use crate::config::CostWeights;

/// Tolerances of the pass currently running, converted to rays.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassLimits {
    pub max_gap: usize,
    pub max_overlap: usize,
    pub radial_px: f64,
    pub radial_rel: f64,
    pub slope_ratio: f64,
    pub slope_floor: f64,
    pub weights: CostWeights,
    pub max_cost: f64,
}

/// Admissible merge of `x` (endpoint B side) followed by `y` (endpoint A side).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub x: ChainId,
    pub y: ChainId,
    /// Empty rays between X.B and Y.A.
    pub gap: usize,
    /// Rays shared by X's tail and Y's head.
    pub overlap: usize,
    /// |r(X.B) - r(Y.A)| in pixels.
    pub discontinuity: f64,
    pub cost: f64,
}

/// Evaluate the unordered pair `{a, b}` in both orientations and keep the
/// cheaper admissible one. When neither is admissible the rejection of
/// `a -> b` is returned.
pub(crate) fn best_of_pair(
    set: &ChainSet,
    a: ChainId,
    b: ChainId,
    limits: &PassLimits,
) -> Result<Candidate, Rejection> {
    match (evaluate(set, a, b, limits), evaluate(set, b, a, limits)) {
        (Ok(ab), Ok(ba)) => Ok(if ba.cost < ab.cost { ba } else { ab }),
        (Ok(c), Err(_)) | (Err(_), Ok(c)) => Ok(c),
        (Err(e), Err(_)) => Err(e),
    }
}

/// Evaluate joining X.B to Y.A.
pub(crate) fn evaluate(
    set: &ChainSet,
    x: ChainId,
    y: ChainId,
    limits: &PassLimits,
) -> Result<Candidate, Rejection> {
    let (cx, cy) = match (set.get(x), set.get(y)) {
        (Some(cx), Some(cy)) if x != y && cx.is_open() && cy.is_open() => (cx, cy),
        _ => return Err(Rejection::NotOpen),
    };
    let (Some(xb), Some(ya)) = (cx.last(), cy.first()) else {
        return Err(Rejection::NotAdjacent);
    };
    let n = set.n_rays();

    let (gap, overlap) = if cx.contains_ray(ya.ray) {
        let overlap = ray_offset(ya.ray, xb.ray, n) + 1;
        if overlap > limits.max_overlap || overlap >= cx.span() || overlap >= cy.span() {
            return Err(Rejection::OverlapTooLarge {
                overlap,
                max: limits.max_overlap,
            });
        }
        (0, overlap)
    } else {
        let gap = ray_offset(xb.ray, ya.ray, n).saturating_sub(1);
        if gap > limits.max_gap {
            return Err(Rejection::GapTooLarge {
                gap,
                max: limits.max_gap,
            });
        }
        (gap, 0)
    };

    let span = (cx.span() + gap + cy.span()).saturating_sub(overlap);
    if span > n {
        return Err(Rejection::SpanExceedsCircle { span });
    }

    let discontinuity = (xb.radius - ya.radius).abs();
    let tolerance = limits.radial_px + limits.radial_rel * 0.5 * (xb.radius + ya.radius);
    if discontinuity > tolerance {
        return Err(Rejection::RadialJump {
            jump: discontinuity,
            tolerance,
        });
    }

    // Linear bridge from X.B to Y.A; adjacent or overlapping ends count as one step.
    let slope = discontinuity / (gap + 1) as f64;
    let steepest = cx.max_slope().max(cy.max_slope()).max(limits.slope_floor);
    let max_slope = limits.slope_ratio * steepest;
    if slope > max_slope {
        return Err(Rejection::IrregularSlope {
            slope,
            max: max_slope,
        });
    }

    if overlap == 0 {
        check_bridge(set, [x, y], xb, ya, n)?;
    } else {
        check_bridge(set, [x, y], ya, xb, n)?;
    }

    let cost = merge_cost(cx, cy, gap, discontinuity, tolerance, limits);
    if cost > limits.max_cost {
        return Err(Rejection::TooCostly { cost });
    }

    Ok(Candidate {
        x,
        y,
        gap,
        overlap,
        discontinuity,
        cost,
    })
}

fn merge_cost(
    cx: &Chain,
    cy: &Chain,
    gap: usize,
    discontinuity: f64,
    tolerance: f64,
    limits: &PassLimits,
) -> f64 {
    let w = &limits.weights;
    let gap_term = gap as f64 / limits.max_gap.max(1) as f64;
    let radial_term = if tolerance > 0.0 {
        discontinuity / tolerance
    } else {
        0.0
    };
    let spread = radius_moments(cx.nodes().iter().chain(cy.nodes()).map(|n| n.radius))
        .filter(|&(mean, _)| mean > 0.0)
        .map_or(0.0, |(mean, var)| var.sqrt() / mean);
    let variance_term = spread / limits.radial_rel;
    w.gap * gap_term + w.radial * radial_term + w.variance * variance_term
}

/// Reject when the straight polar segment from `from` to `to` (counter-
/// clockwise, radius interpolated linearly) crosses or touches a chain other
/// than `skip`. A chain is crossed when the bridge does not stay strictly on
/// one side of it over every shared ray, endpoints included. Inside another
/// chain's gaps its bridged radius is used, so earlier merges block too.
fn check_bridge(
    set: &ChainSet,
    skip: [ChainId; 2],
    from: &Node,
    to: &Node,
    n_rays: usize,
) -> Result<(), Rejection> {
    let steps = ray_offset(from.ray, to.ray, n_rays);
    let mut sides: BTreeMap<ChainId, bool> = BTreeMap::new();
    for j in 0..=steps {
        let ray = (from.ray + j) % n_rays;
        let t = if steps == 0 { 0.0 } else { j as f64 / steps as f64 };
        let bridge = from.radius + t * (to.radius - from.radius);
        for other in set.chains_at_ray(ray) {
            if skip.contains(&other.id()) {
                continue;
            }
            let Some(radius) = other.radius_at(ray) else {
                continue;
            };
            let diff = bridge - radius;
            if diff.abs() <= 1e-9 {
                return Err(Rejection::CrossesChain { chain: other.id() });
            }
            let outside = diff > 0.0;
            if *sides.entry(other.id()).or_insert(outside) != outside {
                return Err(Rejection::CrossesChain { chain: other.id() });
            }
        }
    }
    Ok(())
}
