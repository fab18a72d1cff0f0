use crate::{OutputIndex, Tinycoin, UtxoId};
use std::collections::HashSet;

/// A directed edge from a consumer candidate to the in-batch producer whose outputs it
/// spends, labeled with the specific output indices consumed.
/// The indices are kept as a set rather than collapsed into a single link: two
/// consumers may legitimately spend different outputs of the same producer, and
/// disjointness is decided per labeled (producer, output-index) pair.
#[derive(Debug)]
struct DependencyEdge {
    producer: usize,
    output_indexes: HashSet<OutputIndex>,
}

/// One candidate transaction of the batch, reduced to what the forest algorithm needs.
#[derive(Debug)]
struct DependencyNode {
    // The candidate's own fee.
    fee: Tinycoin,
    // The confirmed (not sibling-produced) UTXO identities this candidate consumes.
    confirmed_inputs: HashSet<UtxoId>,
    // Standalone-valid against the confirmed snapshot alone.
    is_leaf: bool,
    edges: Vec<DependencyEdge>,
}

/// The producer/consumer dependency graph over one batch of candidates.
///
/// Nodes live in an index-addressed arena; a candidate's node id is assigned once at
/// batch-build time and is stable for the lifetime of the graph. All traversals run on
/// an explicit work stack with claim state created per call, so the algorithm has no
/// recursion depth limit and no hidden mutable state between calls.
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
}

/// Claim state for one selection pass: which nodes belong to an accepted tree and
/// which labeled (producer, output-index) edges have been taken.
struct ClaimState {
    used: Vec<bool>,
    claimed_edges: Vec<HashSet<OutputIndex>>,
}

impl ClaimState {
    fn new(node_count: usize) -> Self {
        Self {
            used: vec![false; node_count],
            claimed_edges: vec![HashSet::new(); node_count],
        }
    }
}

impl DependencyGraph {
    pub fn new(node_count: usize) -> Self {
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            nodes.push(DependencyNode {
                fee: Tinycoin::zero(),
                confirmed_inputs: HashSet::new(),
                is_leaf: false,
                edges: Vec::new(),
            });
        }
        Self { nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_fee(&mut self, node: usize, fee: Tinycoin) {
        self.nodes[node].fee = fee;
    }

    pub fn mark_leaf(&mut self, node: usize) {
        self.nodes[node].is_leaf = true;
    }

    pub fn add_confirmed_input(&mut self, node: usize, utxo_id: UtxoId) {
        self.nodes[node].confirmed_inputs.insert(utxo_id);
    }

    pub fn add_edge(&mut self, consumer: usize, producer: usize, output_indexes: Vec<OutputIndex>) {
        let node = &mut self.nodes[consumer];
        match node.edges.iter_mut().find(|edge| edge.producer == producer) {
            Some(edge) => edge.output_indexes.extend(output_indexes),
            None => node.edges.push(DependencyEdge {
                producer,
                output_indexes: output_indexes.into_iter().collect(),
            }),
        }
    }

    /// The aggregate fee of the dependency closure rooted at `root`, or `None` when
    /// the closure is not a valid tree.
    ///
    /// The closure is invalid when, across the whole traversal, a confirmed UTXO
    /// identity is claimed twice, or a labeled (producer, output-index) edge is
    /// reached from more than one path. Each node's fee is counted once.
    pub fn tree_value(&self, root: usize) -> Option<Tinycoin> {
        let mut visited = vec![false; self.nodes.len()];
        let mut claimed_inputs: HashSet<UtxoId> = HashSet::new();
        let mut claimed_edges: Vec<HashSet<OutputIndex>> =
            vec![HashSet::new(); self.nodes.len()];

        let mut total = Tinycoin::zero();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;

            let node = &self.nodes[current];
            for utxo_id in &node.confirmed_inputs {
                if !claimed_inputs.insert(*utxo_id) {
                    return None;
                }
            }
            total = total + node.fee;

            if node.is_leaf {
                // A leaf is standalone-valid, so it depends on no sibling producer.
                continue;
            }
            for edge in &node.edges {
                for output_index in &edge.output_indexes {
                    if !claimed_edges[edge.producer].insert(*output_index) {
                        return None;
                    }
                }
                if !visited[edge.producer] {
                    stack.push(edge.producer);
                }
            }
        }
        Some(total)
    }

    /// Greedily packs disjoint acceptance trees for maximum total fee.
    ///
    /// Every node is evaluated as a candidate root; roots with an invalid or
    /// non-positive tree value are discarded. The rest are taken in descending value
    /// order (ties broken by ascending node id) and accepted whole or not at all: a
    /// root whose closure collides with an already claimed node or labeled edge is
    /// skipped entirely.
    ///
    /// Returns the claimed node ids in commit order: trees in root-selection order,
    /// each tree internally ordered producer-before-consumer.
    pub fn max_fee_forest(&self) -> Vec<usize> {
        let mut roots: Vec<(usize, Tinycoin)> = Vec::new();
        for node in 0..self.nodes.len() {
            if let Some(value) = self.tree_value(node) {
                if value > Tinycoin::zero() {
                    roots.push((node, value));
                }
            }
        }
        roots.sort_by(|(lhs_node, lhs_value), (rhs_node, rhs_value)| {
            rhs_value.cmp(lhs_value).then(lhs_node.cmp(rhs_node))
        });

        let mut claims = ClaimState::new(self.nodes.len());
        let mut order = Vec::new();
        for (root, _value) in roots {
            if claims.used[root] {
                continue;
            }
            if self.closure_is_unclaimed(root, &claims) {
                self.claim_closure(root, &mut claims, &mut order);
            }
        }
        order
    }

    /// Whether the closure rooted at `root` can be accepted without touching any node
    /// or labeled edge claimed by a previously accepted tree.
    fn closure_is_unclaimed(&self, root: usize, claims: &ClaimState) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if seen[current] {
                continue;
            }
            seen[current] = true;

            for edge in &self.nodes[current].edges {
                if claims.used[edge.producer] {
                    let collides = edge
                        .output_indexes
                        .iter()
                        .any(|index| claims.claimed_edges[edge.producer].contains(index));
                    if collides {
                        return false;
                    }
                    // The producer belongs to an earlier tree but these particular
                    // outputs are untouched, so there is no need to descend.
                } else {
                    stack.push(edge.producer);
                }
            }
        }
        true
    }

    /// Marks the whole closure rooted at `root` as claimed and appends its nodes to
    /// `order`, producers before the consumers that depend on them.
    fn claim_closure(&self, root: usize, claims: &mut ClaimState, order: &mut Vec<usize>) {
        // Two-phase stack frames: the first visit expands the node, the second visit
        // (after all of its producers are done) appends it to the commit order.
        let mut stack = vec![(root, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            if claims.used[current] {
                continue;
            }
            claims.used[current] = true;
            stack.push((current, true));

            for edge in self.nodes[current].edges.iter().rev() {
                for output_index in &edge.output_indexes {
                    claims.claimed_edges[edge.producer].insert(*output_index);
                }
                if !claims.used[edge.producer] {
                    stack.push((edge.producer, false));
                }
            }
        }
    }
}
