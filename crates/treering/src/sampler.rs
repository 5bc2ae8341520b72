//! Polar resampling of edge curves into chains.
//!
//! Every curve segment is intersected exactly with the rays whose angle it
//! sweeps. A segment covering the unwrapped angle interval `[u0, u1)` crosses
//! ray `k` when `θ_k` lies in that half-open interval (mirrored for clockwise
//! segments), so a vertex lying exactly on a ray is counted once.

use std::f64::consts::{PI, TAU};

use tracing::debug;

use crate::chain::{ChainSet, Node};
use crate::config::SamplerConfig;
use crate::edges::EdgeMap;

const CENTER_EPS: f64 = 1e-9;

/// Angular walking direction of a run of crossings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Ccw,
    Cw,
}

/// Accumulates consecutive ray crossings of one curve.
struct Run {
    nodes: Vec<Node>,
    turn: Option<Turn>,
}

impl Run {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            turn: None,
        }
    }

    fn flush(&mut self, set: &mut ChainSet, min_nodes: usize) {
        let mut nodes = std::mem::take(&mut self.nodes);
        let turn = self.turn.take();
        if nodes.len() < min_nodes {
            return;
        }
        if turn == Some(Turn::Cw) {
            nodes.reverse();
        }
        set.insert(nodes);
    }
}

fn wrap_pi(a: f64) -> f64 {
    let mut a = a % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Point where ray `theta` crosses segment `p0 -> p1` (both relative to the
/// center), as a distance along the ray.
fn ray_segment_radius(theta: f64, p0: [f64; 2], p1: [f64; 2]) -> f64 {
    let u = [theta.cos(), theta.sin()];
    let d = [p1[0] - p0[0], p1[1] - p0[1]];
    let cross = |a: [f64; 2], b: [f64; 2]| a[0] * b[1] - a[1] * b[0];
    let denom = cross(u, d);
    let t = if denom.abs() > f64::EPSILON {
        (-cross(u, p0) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let pt = [p0[0] + t * d[0], p0[1] + t * d[1]];
    (u[0] * pt[0] + u[1] * pt[1]).max(0.0)
}

/// Sample every curve of `edges` onto `n_rays` rays around `center`.
///
/// Consecutive crossings sharing an angular direction form a run; a reversal,
/// a point on the center, or a run reaching `n_rays` crossings starts a new one.
/// Clockwise runs are reversed so every chain is stored counter-clockwise.
/// Runs shorter than `config.min_nodes` are dropped.
pub fn sample_chains(
    edges: &EdgeMap,
    center: [f64; 2],
    n_rays: usize,
    config: &SamplerConfig,
) -> ChainSet {
    let mut set = ChainSet::new(n_rays, center);
    let step = TAU / n_rays as f64;
    let min_nodes = config.min_nodes.max(1);

    for curve in &edges.curves {
        let mut run = Run::new();
        // (relative position, unwrapped angle) of the previous point.
        let mut prev: Option<([f64; 2], f64)> = None;

        for point in &curve.points {
            let p1 = [point.xy[0] - center[0], point.xy[1] - center[1]];
            if p1[0].hypot(p1[1]) <= CENTER_EPS {
                run.flush(&mut set, min_nodes);
                prev = None;
                continue;
            }
            let a1 = p1[1].atan2(p1[0]);
            let Some((p0, u0)) = prev else {
                prev = Some((p1, a1));
                continue;
            };
            let a0 = p0[1].atan2(p0[0]);
            let u1 = u0 + wrap_pi(a1 - a0);

            let (turn, rays): (Turn, Vec<i64>) = if u1 > u0 {
                let lo = (u0 / step).ceil() as i64;
                let hi = (u1 / step).ceil() as i64;
                (Turn::Ccw, (lo..hi).collect())
            } else if u1 < u0 {
                let hi = (u0 / step).floor() as i64;
                let lo = (u1 / step).floor() as i64;
                (Turn::Cw, ((lo + 1)..=hi).rev().collect())
            } else {
                (Turn::Ccw, Vec::new())
            };

            for k in rays {
                if run.turn.is_some_and(|t| t != turn) || run.nodes.len() >= n_rays {
                    run.flush(&mut set, min_nodes);
                }
                run.turn = Some(turn);
                let ray = k.rem_euclid(n_rays as i64) as usize;
                let theta = step * ray as f64;
                let radius = ray_segment_radius(theta, p0, p1);
                run.nodes.push(Node::on_ray(ray, radius, center, n_rays));
            }
            prev = Some((p1, u1));
        }
        run.flush(&mut set, min_nodes);
    }

    debug!(
        curves = edges.curves.len(),
        chains = set.len(),
        nodes = set.node_count(),
        "polar sampling done"
    );
    set
}
