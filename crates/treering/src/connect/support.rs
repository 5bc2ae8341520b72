//! Chain support and discard after the last connection pass.

use std::collections::BTreeMap;

use tracing::trace;

use crate::chain::{Chain, ChainId, ChainSet, ChainState};

/// Support and discard thresholds, already converted to rays.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SupportLimits {
    pub min_span: usize,
    pub window: usize,
    pub self_support_span: f64,
    pub radial_px: f64,
    pub radial_rel: f64,
}

/// Whether `chain` is corroborated by another non-discarded chain.
///
/// Chains spanning at least `self_support_span` rays support themselves.
/// Otherwise some other chain must have nodes inside the chain's domain
/// widened by `window` rays on both sides, at least half of them within
/// radial tolerance of the chain's radius on the same ray.
pub(crate) fn is_supported(set: &ChainSet, chain: &Chain, limits: &SupportLimits) -> bool {
    let n = set.n_rays();
    if chain.span() as f64 >= limits.self_support_span {
        return true;
    }
    let Some(a) = chain.first() else {
        return false;
    };
    let width = (chain.span() + 2 * limits.window).min(n);
    let start = (a.ray + n - limits.window.min(n)) % n;

    // chain id -> (nodes in window, nodes within tolerance)
    let mut votes: BTreeMap<ChainId, (usize, usize)> = BTreeMap::new();
    for j in 0..width {
        let ray = (start + j) % n;
        let Some(own) = chain.radius_near(ray) else {
            continue;
        };
        let tolerance = limits.radial_px + limits.radial_rel * own;
        for other in set.chains_at_ray(ray) {
            if other.id() == chain.id() || other.state() == ChainState::Discarded {
                continue;
            }
            let Some(node) = other.node_at(ray) else {
                continue;
            };
            let entry = votes.entry(other.id()).or_insert((0, 0));
            entry.0 += 1;
            if (node.radius - own).abs() <= tolerance {
                entry.1 += 1;
            }
        }
    }
    votes
        .values()
        .any(|&(total, within)| total > 0 && 2 * within >= total)
}

/// Recompute support for every open chain and discard short or unsupported
/// ones, repeating until no state changes. Returns the number of discarded chains.
pub(crate) fn discard_unsupported(set: &mut ChainSet, limits: &SupportLimits) -> usize {
    let mut discarded = 0;
    loop {
        let open = set.ids_in_state(ChainState::Open);
        let verdicts: Vec<(ChainId, bool, bool)> = open
            .iter()
            .filter_map(|&id| set.get(id))
            .map(|c| {
                let supported = is_supported(set, c, limits);
                let keep = supported && c.span() >= limits.min_span;
                (c.id(), supported, keep)
            })
            .collect();

        let mut changed = false;
        for (id, supported, keep) in verdicts {
            set.set_support(id, supported);
            if !keep {
                trace!(chain = id, supported, "discarding chain");
                set.set_state(id, ChainState::Discarded);
                discarded += 1;
                changed = true;
            }
        }
        if !changed {
            return discarded;
        }
    }
}
