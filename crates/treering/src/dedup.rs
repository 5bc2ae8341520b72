use crate::complete::Ring;
use crate::config::CompletionParams;

/// Fraction of rays on which two rings lie within `tolerance` of each other.
fn radial_similarity(a: &Ring, b: &Ring, tolerance: f64) -> f64 {
    let n = a.radii.len().min(b.radii.len());
    if n == 0 {
        return 0.0;
    }
    let close = a
        .radii
        .iter()
        .zip(&b.radii)
        .filter(|(ra, rb)| (*ra - *rb).abs() <= tolerance)
        .count();
    close as f64 / n as f64
}

/// `ring` sorts after `kept`. Two different closed curves with the same mean
/// radius must cross each other, so an exact tie is always a duplicate; this
/// keeps the output strictly increasing in mean radius.
fn is_duplicate(kept: &Ring, ring: &Ring, params: &CompletionParams) -> bool {
    let delta = ring.mean_radius - kept.mean_radius;
    delta <= 0.0
        || (delta < params.duplicate_radius_px
            && radial_similarity(kept, ring, params.duplicate_radius_px)
                >= params.duplicate_similarity)
}

fn sort_by_radius(rings: Vec<Ring>) -> Vec<Ring> {
    let mut rings = rings;
    rings.sort_by(|a, b| a.mean_radius.total_cmp(&b.mean_radius).then(a.id.cmp(&b.id)));
    rings
}

/// Sort rings innermost first and drop duplicates.
///
/// Each ring is compared with the last kept one; of a duplicate pair the ring
/// with fewer measured points goes (the kept one on ties).
pub(crate) fn dedup_rings(rings: Vec<Ring>, params: &CompletionParams) -> Vec<Ring> {
    let mut kept: Vec<Ring> = Vec::new();
    for ring in sort_by_radius(rings) {
        match kept.last_mut() {
            Some(last) if is_duplicate(last, &ring, params) => {
                if ring.n_measured > last.n_measured {
                    *last = ring;
                }
            }
            _ => kept.push(ring),
        }
    }
    kept
}
