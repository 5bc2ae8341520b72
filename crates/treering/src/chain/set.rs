use std::collections::{BTreeMap, BTreeSet};

use super::{ray_offset, Chain, ChainId, ChainState, Node, Rejection};

/// Arena of chains keyed by stable ids, with a per-ray index of the chains
/// whose angular domain covers each ray.
///
/// Every live node belongs to exactly one chain. Merging allocates a fresh id
/// and retires both sources, so an id never refers to two different node lists.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChainSet {
    n_rays: usize,
    center: [f64; 2],
    chains: BTreeMap<ChainId, Chain>,
    next_id: ChainId,
    retired_nodes: usize,
    #[serde(skip)]
    ray_index: Vec<BTreeSet<ChainId>>,
}

impl ChainSet {
    pub fn new(n_rays: usize, center: [f64; 2]) -> Self {
        Self {
            n_rays,
            center,
            chains: BTreeMap::new(),
            next_id: 0,
            retired_nodes: 0,
            ray_index: vec![BTreeSet::new(); n_rays],
        }
    }

    pub fn n_rays(&self) -> usize {
        self.n_rays
    }

    pub fn center(&self) -> [f64; 2] {
        self.center
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn get(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(&id)
    }

    /// Chains in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Chain> + '_ {
        self.chains.values()
    }

    pub fn ids(&self) -> Vec<ChainId> {
        self.chains.keys().copied().collect()
    }

    /// Ids of chains in `state`, ascending.
    pub fn ids_in_state(&self, state: ChainState) -> Vec<ChainId> {
        self.chains
            .values()
            .filter(|c| c.state() == state)
            .map(|c| c.id())
            .collect()
    }

    pub fn count_in_state(&self, state: ChainState) -> usize {
        self.chains.values().filter(|c| c.state() == state).count()
    }

    /// Chains whose angular domain covers `ray` (a node or a bridged gap),
    /// ascending id.
    pub fn chains_at_ray(&self, ray: usize) -> impl Iterator<Item = &Chain> + '_ {
        self.ray_index
            .get(ray)
            .into_iter()
            .flatten()
            .filter_map(|id| self.chains.get(id))
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.chains.values().map(Chain::len).sum()
    }

    /// Nodes dropped from overlapping merges so far.
    pub fn retired_node_count(&self) -> usize {
        self.retired_nodes
    }

    /// Add a chain built from `nodes`; returns its new id.
    pub(crate) fn insert(&mut self, nodes: Vec<Node>) -> ChainId {
        let id = self.next_id;
        self.next_id += 1;
        let chain = Chain::new(id, self.n_rays, nodes);
        self.index_chain(&chain);
        self.chains.insert(id, chain);
        id
    }

    /// Remove a chain and its nodes from the set.
    pub(crate) fn retire(&mut self, id: ChainId) -> Option<Chain> {
        let chain = self.chains.remove(&id)?;
        self.unindex_chain(&chain);
        Some(chain)
    }

    pub(crate) fn set_state(&mut self, id: ChainId, state: ChainState) {
        if let Some(chain) = self.chains.get_mut(&id) {
            chain.set_state(state);
        }
    }

    pub(crate) fn set_support(&mut self, id: ChainId, support: bool) {
        if let Some(chain) = self.chains.get_mut(&id) {
            chain.set_support(support);
        }
    }

    /// Replace the node list of chain `id` in place and mark it closed.
    pub(crate) fn close_with(&mut self, id: ChainId, nodes: Vec<Node>) {
        let Some(old) = self.chains.remove(&id) else {
            return;
        };
        self.unindex_chain(&old);
        let mut chain = Chain::new(id, self.n_rays, nodes);
        chain.set_support(old.is_supported());
        chain.set_state(ChainState::Closed);
        self.index_chain(&chain);
        self.chains.insert(id, chain);
    }

    /// Join `x` (whose endpoint B adjoins) with `y` (whose endpoint A adjoins).
    ///
    /// Nodes shared by the two domains are kept from the chain with more
    /// nodes. The result gets a fresh id; both sources are retired.
    pub(crate) fn merge(&mut self, x: ChainId, y: ChainId) -> Result<ChainId, Rejection> {
        let (cx, cy) = match (self.chains.get(&x), self.chains.get(&y)) {
            (Some(a), Some(b)) if x != y && a.is_open() && b.is_open() => (a, b),
            _ => return Err(Rejection::NotOpen),
        };
        let (nodes, dropped) = joined_nodes(cx, cy, self.n_rays);
        let id = self.next_id;
        let merged = Chain::new(id, self.n_rays, nodes);
        if !merged.is_angularly_monotonic() {
            return Err(Rejection::NonMonotonic);
        }

        self.next_id += 1;
        self.retired_nodes += dropped;
        self.retire(x);
        self.retire(y);
        self.index_chain(&merged);
        self.chains.insert(id, merged);
        Ok(id)
    }

    /// Check the partition and index invariants.
    pub fn is_consistent(&self) -> bool {
        let owned = self.chains.iter().all(|(&id, c)| {
            c.id() == id && c.nodes().iter().all(|n| n.chain == id) && c.is_angularly_monotonic()
        });
        if !owned {
            return false;
        }
        (0..self.n_rays).all(|ray| {
            let expected: BTreeSet<ChainId> = self
                .chains
                .values()
                .filter(|c| c.contains_ray(ray))
                .map(Chain::id)
                .collect();
            self.ray_index.get(ray) == Some(&expected)
        })
    }

    fn index_chain(&mut self, chain: &Chain) {
        for ray in chain.domain_rays() {
            if let Some(slot) = self.ray_index.get_mut(ray) {
                slot.insert(chain.id());
            }
        }
    }

    fn unindex_chain(&mut self, chain: &Chain) {
        for ray in chain.domain_rays() {
            if let Some(slot) = self.ray_index.get_mut(ray) {
                slot.remove(&chain.id());
            }
        }
    }
}

/// Concatenate `x` and `y`, dropping the overlapping nodes of the smaller one.
/// Returns the node list and the number of dropped nodes.
fn joined_nodes(x: &Chain, y: &Chain, n_rays: usize) -> (Vec<Node>, usize) {
    let Some(x_start) = x.first().map(|n| n.ray) else {
        return (y.nodes().to_vec(), 0);
    };
    let x_span = x.span();
    let overlap = y
        .nodes()
        .iter()
        .take_while(|n| ray_offset(x_start, n.ray, n_rays) < x_span)
        .count();

    if overlap == 0 || x.len() >= y.len() {
        let mut nodes = x.nodes().to_vec();
        nodes.extend_from_slice(&y.nodes()[overlap..]);
        return (nodes, overlap);
    }

    let cut = y
        .first()
        .map_or(x_span, |n| ray_offset(x_start, n.ray, n_rays));
    let keep = x
        .nodes()
        .partition_point(|n| ray_offset(x_start, n.ray, n_rays) < cut);
    let mut nodes = x.nodes()[..keep].to_vec();
    nodes.extend_from_slice(y.nodes());
    (nodes, x.len() - keep)
}
