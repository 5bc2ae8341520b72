//! Chain connection engine.
//!
//! Runs the pass schedule from strict to permissive. Each pass repeatedly
//! merges the cheapest admissible pair of open chains until no admissible
//! pair remains. Merge candidates live in a min-heap keyed by
//! `(cost, lower id, higher id)` and are re-validated when popped, since the
//! set may have changed since they were queued.

mod candidate;
mod support;

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use tracing::{debug, info, trace, warn};

use crate::chain::{ChainId, ChainSet, ChainState, Rejection};
use crate::config::DetectConfig;
use crate::error::DetectWarning;

use candidate::{best_of_pair, Candidate, PassLimits};
use support::{discard_unsupported, SupportLimits};

/// Per-pass counters.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PassStats {
    /// Gap tolerance of the pass, in rays.
    pub max_gap_rays: usize,
    /// Relative radial tolerance of the pass.
    pub radial_tolerance_rel: f64,
    /// Bridge steepness ratio of the pass.
    pub slope_ratio: f64,
    /// Live candidates evaluated during the pass.
    pub iterations: usize,
    /// Merges performed during the pass.
    pub merges: usize,
}

/// Connection engine counters.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ConnectStats {
    /// Live candidates evaluated across all passes.
    pub iterations: usize,
    /// Merges performed.
    pub merges: usize,
    /// Chains that reached `Closed` during the passes.
    pub closed_by_merge: usize,
    /// Chains discarded after the last pass.
    pub discarded: usize,
    /// Rejected candidate evaluations by reason.
    pub rejections: BTreeMap<&'static str, usize>,
    pub passes: Vec<PassStats>,
    /// `false` when the iteration cap stopped the engine.
    pub converged: bool,
}

impl ConnectStats {
    fn reject(&mut self, why: &Rejection) {
        *self.rejections.entry(why.label()).or_insert(0) += 1;
    }
}

/// Result of [`connect_chains`].
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    /// Converged chain set: every chain is `Open` (supported), `Closed` or `Discarded`.
    pub set: ChainSet,
    pub stats: ConnectStats,
    pub warnings: Vec<DetectWarning>,
}

#[derive(Debug, Clone)]
struct QueueEntry {
    cost: f64,
    lo: ChainId,
    hi: ChainId,
    x: ChainId,
    y: ChainId,
}

impl QueueEntry {
    fn from_candidate(c: &Candidate) -> Self {
        Self {
            cost: c.cost,
            lo: c.x.min(c.y),
            hi: c.x.max(c.y),
            x: c.x,
            y: c.y,
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then(self.lo.cmp(&other.lo))
            .then(self.hi.cmp(&other.hi))
    }
}

struct Engine {
    set: ChainSet,
    heap: BinaryHeap<Reverse<QueueEntry>>,
    stats: ConnectStats,
    max_iterations: usize,
    cap_hit: bool,
}

impl Engine {
    fn push_pair(&mut self, a: ChainId, b: ChainId, limits: &PassLimits) {
        match best_of_pair(&self.set, a, b, limits) {
            Ok(c) => self.heap.push(Reverse(QueueEntry::from_candidate(&c))),
            Err(why) => self.stats.reject(&why),
        }
    }

    fn seed(&mut self, limits: &PassLimits) {
        self.heap.clear();
        let open = self.set.ids_in_state(ChainState::Open);
        for (i, &a) in open.iter().enumerate() {
            for &b in &open[i + 1..] {
                self.push_pair(a, b, limits);
            }
        }
    }

    /// Run one pass to a fixed point (or the iteration cap).
    fn run_pass(&mut self, limits: &PassLimits) -> PassStats {
        let mut pass = PassStats {
            max_gap_rays: limits.max_gap,
            radial_tolerance_rel: limits.radial_rel,
            slope_ratio: limits.slope_ratio,
            iterations: 0,
            merges: 0,
        };
        self.seed(limits);

        while let Some(Reverse(entry)) = self.heap.pop() {
            // Entries naming a retired or finished chain are dropped for free.
            let live = |id| self.set.get(id).is_some_and(|c| c.is_open());
            if !live(entry.x) || !live(entry.y) {
                continue;
            }
            if self.stats.iterations >= self.max_iterations {
                self.cap_hit = true;
                break;
            }
            self.stats.iterations += 1;
            pass.iterations += 1;
            let fresh = match best_of_pair(&self.set, entry.lo, entry.hi, limits) {
                Ok(c) => c,
                Err(why) => {
                    self.stats.reject(&why);
                    continue;
                }
            };
            if fresh.cost != entry.cost || fresh.x != entry.x {
                self.heap.push(Reverse(QueueEntry::from_candidate(&fresh)));
                continue;
            }

            match self.set.merge(fresh.x, fresh.y) {
                Ok(id) => {
                    pass.merges += 1;
                    self.stats.merges += 1;
                    trace!(
                        x = fresh.x,
                        y = fresh.y,
                        merged = id,
                        gap = fresh.gap,
                        overlap = fresh.overlap,
                        discontinuity = fresh.discontinuity,
                        cost = fresh.cost,
                        "merged chains"
                    );
                    if self.set.get(id).map(|c| c.state()) == Some(ChainState::Closed) {
                        self.stats.closed_by_merge += 1;
                        continue;
                    }
                    for other in self.set.ids_in_state(ChainState::Open) {
                        if other != id {
                            self.push_pair(id, other, limits);
                        }
                    }
                }
                Err(why) => self.stats.reject(&why),
            }
        }
        pass
    }
}

/// Merge compatible chains, then discard short and unsupported ones.
///
/// Running the engine again on its own output changes nothing.
pub fn connect_chains(set: ChainSet, config: &DetectConfig) -> ConnectOutcome {
    let c = &config.connect;
    let mut engine = Engine {
        set,
        heap: BinaryHeap::new(),
        stats: ConnectStats::default(),
        max_iterations: c.max_iterations,
        cap_hit: false,
    };
    let chains_in = engine.set.len();

    for pass in &c.passes {
        let limits = PassLimits {
            max_gap: config.deg_to_rays(pass.max_angular_gap_deg),
            max_overlap: config.deg_to_rays(c.max_overlap_deg),
            radial_px: c.radial_tolerance_px,
            radial_rel: pass.radial_tolerance_rel,
            slope_ratio: pass.slope_ratio,
            slope_floor: c.slope_floor_px,
            weights: c.weights,
            max_cost: c.max_cost,
        };
        let stats = engine.run_pass(&limits);
        debug!(
            max_gap_rays = stats.max_gap_rays,
            radial_tolerance_rel = stats.radial_tolerance_rel,
            slope_ratio = stats.slope_ratio,
            iterations = stats.iterations,
            merges = stats.merges,
            open = engine.set.count_in_state(ChainState::Open),
            "connection pass done"
        );
        engine.stats.passes.push(stats);
        if engine.cap_hit {
            break;
        }
    }

    let tightest_rel = c
        .passes
        .iter()
        .map(|p| p.radial_tolerance_rel)
        .fold(f64::INFINITY, f64::min);
    let support = SupportLimits {
        min_span: config.deg_to_rays(c.min_chain_span_deg),
        window: config.deg_to_rays(c.support_window_deg),
        self_support_span: c.self_support_fraction * config.n_rays as f64,
        radial_px: c.radial_tolerance_px,
        radial_rel: if tightest_rel.is_finite() { tightest_rel } else { 0.0 },
    };
    let Engine {
        mut set,
        mut stats,
        cap_hit,
        ..
    } = engine;
    stats.discarded = discard_unsupported(&mut set, &support);
    stats.converged = !cap_hit;

    let mut warnings = Vec::new();
    if cap_hit {
        warn!(
            iterations = stats.iterations,
            "chain connection hit the iteration cap"
        );
        warnings.push(DetectWarning::IterationCapReached {
            iterations: stats.iterations,
        });
    }
    info!(
        chains_in,
        merges = stats.merges,
        open = set.count_in_state(ChainState::Open),
        closed = set.count_in_state(ChainState::Closed),
        discarded = stats.discarded,
        "chain connection done"
    );
    ConnectOutcome {
        set,
        stats,
        warnings,
    }
}
