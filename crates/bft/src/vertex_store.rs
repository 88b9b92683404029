//! The vertex store.

use crate::{VertexStoreError, VertexStoreUpdate};
use indexmap::IndexSet;
use quorum_core::Ledger;
use quorum_types::{
    BftHeader, Hash, HighQc, PreparedVertex, QuorumCertificate, TimeoutCertificate, Vertex,
    VerifiedVertexStoreState,
};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

/// Outcome of [`VertexStore::add_qc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddQcResult {
    /// The certified vertex is in the store and the QC has been applied.
    Recorded,
    /// The certified vertex is unknown and has to be fetched first.
    MissingVertex,
    /// The QC commits a vertex that is not an ancestor of the one it
    /// certifies.
    Rejected,
}

/// DAG of prepared, uncommitted vertices above a committed root.
///
/// Invariants:
/// - every stored vertex descends from `root`
/// - `highest_committed_qc` commits `root`
/// - `highest_qc` certifies a vertex in the store (or the root)
pub struct VertexStore<L> {
    ledger: L,

    root: Vertex,
    root_id: Hash,

    /// Prepared vertices keyed by id. The root is not included.
    vertices: HashMap<Hash, PreparedVertex>,
    /// Children of every stored vertex and of the root, in insertion order.
    children: HashMap<Hash, IndexSet<Hash>>,

    highest_qc: QuorumCertificate,
    highest_committed_qc: QuorumCertificate,
    highest_tc: Option<TimeoutCertificate>,

    /// Updates not yet drained by the owner.
    updates: Vec<VertexStoreUpdate>,
}

impl<L> std::fmt::Debug for VertexStore<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexStore")
            .field("root", &self.root_id)
            .field("root_view", &self.root.view)
            .field("vertices", &self.vertices.len())
            .field("highest_qc_view", &self.highest_qc.view())
            .finish_non_exhaustive()
    }
}

impl<L: Ledger> VertexStore<L> {
    /// Restore a store from a snapshot.
    ///
    /// Vertices are re-prepared in snapshot order. Preparation stops at the
    /// first vertex the ledger refuses; the snapshot itself was validated at
    /// construction, so nothing else is checked.
    pub fn create(state: VerifiedVertexStoreState, ledger: L) -> Self {
        let root = state.root().clone();
        let root_id = root.id();
        let high_qc = state.high_qc().clone();

        let mut store = Self {
            ledger,
            root,
            root_id,
            vertices: HashMap::new(),
            children: HashMap::from([(root_id, IndexSet::new())]),
            highest_qc: high_qc.highest_qc().clone(),
            highest_committed_qc: high_qc.highest_committed_qc().clone(),
            highest_tc: state
                .highest_tc()
                .or(high_qc.highest_tc())
                .cloned(),
            updates: Vec::new(),
        };

        for vertex in state.vertices() {
            let previous = store.path_from_root(&vertex.parent_id());
            let Some(prepared) = store.ledger.prepare(&previous, vertex) else {
                warn!(
                    vertex_id = ?vertex.id(),
                    view = vertex.view.0,
                    "Ledger refused a recovered vertex, dropping the rest of the snapshot"
                );
                break;
            };
            store.attach(prepared);
        }

        info!(
            root = ?store.root_id,
            root_view = store.root.view.0,
            vertices = store.vertices.len(),
            "Vertex store created"
        );
        store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn root(&self) -> &Vertex {
        &self.root
    }

    pub fn root_id(&self) -> Hash {
        self.root_id
    }

    pub fn contains_vertex(&self, id: &Hash) -> bool {
        *id == self.root_id || self.vertices.contains_key(id)
    }

    pub fn get_prepared_vertex(&self, id: &Hash) -> Option<&PreparedVertex> {
        self.vertices.get(id)
    }

    /// Header of a stored vertex, including the root.
    pub fn header_of(&self, id: &Hash) -> Option<BftHeader> {
        if *id == self.root_id {
            return self.highest_committed_qc.committed().cloned();
        }
        self.vertices.get(id).map(PreparedVertex::header)
    }

    pub fn high_qc(&self) -> HighQc {
        HighQc::new(
            self.highest_qc.clone(),
            self.highest_committed_qc.clone(),
            self.highest_tc.clone(),
        )
    }

    pub fn highest_timeout_certificate(&self) -> Option<&TimeoutCertificate> {
        self.highest_tc.as_ref()
    }

    /// Keep `tc` if it is above the highest known TC.
    pub fn insert_timeout_certificate(&mut self, tc: TimeoutCertificate) {
        if self.highest_tc.as_ref().map_or(true, |current| current.view < tc.view) {
            trace!(view = tc.view.0, "New highest timeout certificate");
            self.highest_tc = Some(tc);
        }
    }

    /// Number of prepared vertices above the root.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Drain queued updates, oldest first.
    pub fn take_updates(&mut self) -> Vec<VertexStoreUpdate> {
        std::mem::take(&mut self.updates)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Certificates and commit
    // ═══════════════════════════════════════════════════════════════════════

    /// Record `qc`.
    ///
    /// The QC may raise the highest QC, and if it carries a committed header
    /// above the root, the path up to that header is committed and the DAG
    /// pruned. A committed header that is not a stored ancestor of the
    /// certified vertex rejects the QC without touching the store.
    pub fn add_qc(&mut self, qc: &QuorumCertificate) -> Result<AddQcResult, VertexStoreError> {
        let proposed = qc.proposed().vertex_id;
        if !self.contains_vertex(&proposed) {
            return Ok(AddQcResult::MissingVertex);
        }

        // A vertex with children already had its QC processed.
        if self.children.get(&proposed).is_some_and(|c| !c.is_empty()) {
            return Ok(AddQcResult::Recorded);
        }

        let committed = qc.committed().filter(|c| c.view > self.root.view).cloned();
        if let Some(header) = &committed {
            if !self.is_ancestor(header, &proposed) {
                warn!(
                    view = qc.view().0,
                    vertex_id = ?proposed,
                    committed = ?header.vertex_id,
                    committed_view = header.view.0,
                    "QC commits a vertex off the certified chain"
                );
                return Ok(AddQcResult::Rejected);
            }
        }

        let is_high_qc = qc.view() > self.highest_qc.view();
        if !is_high_qc && committed.is_none() {
            return Ok(AddQcResult::Recorded);
        }

        if is_high_qc {
            trace!(view = qc.view().0, vertex_id = ?proposed, "New highest QC");
            self.highest_qc = qc.clone();
        }

        match committed {
            Some(header) => self.commit(&header, qc)?,
            None => {
                let state = self.state()?;
                self.updates.push(VertexStoreUpdate::HighQcUpdated { state });
            }
        }
        Ok(AddQcResult::Recorded)
    }

    /// Whether `header` names a stored vertex on the path from the root to
    /// `descendant`, at the view it was inserted with.
    fn is_ancestor(&self, header: &BftHeader, descendant: &Hash) -> bool {
        self.path_from_root(descendant)
            .iter()
            .any(|v| v.id() == header.vertex_id && v.view() == header.view)
    }

    fn commit(
        &mut self,
        header: &BftHeader,
        commit_qc: &QuorumCertificate,
    ) -> Result<(), VertexStoreError> {
        let tip_id = header.vertex_id;
        let tip = self
            .vertices
            .get(&tip_id)
            .ok_or(VertexStoreError::MissingCommittedVertex(tip_id))?
            .vertex()
            .clone();

        let path = self.path_from_root(&tip_id);
        let old_root_id = self.root_id;

        self.root = tip;
        self.root_id = tip_id;
        self.highest_committed_qc = commit_qc.clone();

        // Walk from the new root back down to the old root, keeping only the
        // child on the committed path at each step.
        let mut chain: Vec<Hash> = Vec::with_capacity(path.len() + 1);
        chain.push(old_root_id);
        chain.extend(path.iter().map(PreparedVertex::id));

        let mut pruned = Vec::new();
        let mut keep = None;
        for id in chain.iter().rev() {
            self.remove_and_prune(*id, keep, &mut pruned);
            keep = Some(*id);
        }

        let state = self.state()?;
        let proof = state
            .root_proof()
            .ok_or(VertexStoreError::MissingCommittedVertex(tip_id))?;

        debug!(
            root = ?self.root_id,
            view = self.root.view.0,
            committed = path.len(),
            pruned = pruned.len(),
            "Committed vertices"
        );

        self.updates.push(VertexStoreUpdate::Committed {
            committed: path,
            pruned,
            proof,
            state,
        });
        Ok(())
    }

    /// Remove `id` and every descendant except the subtree under `keep`.
    ///
    /// The current root is taken out of the prepared map but keeps its
    /// children.
    fn remove_and_prune(&mut self, id: Hash, keep: Option<Hash>, pruned: &mut Vec<Hash>) {
        self.vertices.remove(&id);
        if id == self.root_id {
            return;
        }

        let children = self.children.remove(&id).unwrap_or_default();
        for child in children {
            if Some(child) != keep {
                pruned.push(child);
                self.remove_and_prune(child, None, pruned);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Insertion
    // ═══════════════════════════════════════════════════════════════════════

    /// Prepare `vertex` and attach it to its parent.
    ///
    /// Returns whether the vertex is in the store afterwards: `false` means
    /// the ledger refused to prepare it.
    pub fn insert_vertex(&mut self, vertex: &Vertex) -> Result<bool, VertexStoreError> {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return Ok(true);
        }

        let parent = vertex.parent_id();
        if !self.contains_vertex(&parent) {
            return Err(VertexStoreError::MissingParent { vertex: id, parent });
        }

        let previous = self.path_from_root(&parent);
        let Some(prepared) = self.ledger.prepare(&previous, vertex) else {
            debug!(vertex_id = ?id, view = vertex.view.0, "Ledger refused to prepare vertex");
            return Ok(false);
        };

        let siblings = self.attach(prepared.clone());
        let state = self.state()?;
        trace!(vertex_id = ?id, view = vertex.view.0, siblings, "Inserted vertex");
        self.updates.push(VertexStoreUpdate::Inserted {
            vertex: prepared,
            siblings,
            state,
        });
        Ok(true)
    }

    /// Insert a parent-linked run of vertices, oldest first.
    ///
    /// Each vertex's QC is recorded before the vertex itself, so the run's
    /// QCs commit as they go. Stops early if a QC refers to a vertex the
    /// store does not have.
    pub fn insert_vertex_chain(&mut self, chain: &[Vertex]) -> Result<(), VertexStoreError> {
        for vertex in chain {
            match self.add_qc(&vertex.qc)? {
                AddQcResult::Recorded => {}
                AddQcResult::MissingVertex => {
                    debug!(
                        vertex_id = ?vertex.id(),
                        parent = ?vertex.parent_id(),
                        "Chain does not connect to the store"
                    );
                    return Ok(());
                }
                AddQcResult::Rejected => {
                    debug!(vertex_id = ?vertex.id(), "Chain carries a rejected QC");
                    return Ok(());
                }
            }
            self.insert_vertex(vertex)?;
        }
        Ok(())
    }

    fn attach(&mut self, prepared: PreparedVertex) -> usize {
        let id = prepared.id();
        let siblings = self.children.entry(prepared.parent_id()).or_default();
        siblings.insert(id);
        let count = siblings.len();
        self.children.entry(id).or_default();
        self.vertices.insert(id, prepared);
        count
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rebuild
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace root, DAG and QCs with `state`.
    ///
    /// Refuses a root below the current root. Returns `false` without
    /// touching the store if the ledger refuses any vertex of the snapshot.
    pub fn try_rebuild(&mut self, state: VerifiedVertexStoreState) -> bool {
        if state.root().view < self.root.view {
            warn!(
                current_root_view = self.root.view.0,
                new_root_view = state.root().view.0,
                "Refusing to rebuild below the committed root"
            );
            return false;
        }

        let mut prepared: Vec<PreparedVertex> = Vec::with_capacity(state.vertices().len());
        for vertex in state.vertices() {
            match self.ledger.prepare(&prepared, vertex) {
                Some(p) => prepared.push(p),
                None => {
                    debug!(vertex_id = ?vertex.id(), "Rebuild vertex refused by ledger");
                    return false;
                }
            }
        }

        self.root = state.root().clone();
        self.root_id = self.root.id();
        self.highest_committed_qc = state.high_qc().highest_committed_qc().clone();
        self.highest_qc = state.high_qc().highest_qc().clone();
        if let Some(tc) = state.highest_tc().cloned() {
            self.insert_timeout_certificate(tc);
        }

        self.vertices.clear();
        self.children.clear();
        self.children.insert(self.root_id, IndexSet::new());
        for p in prepared {
            self.attach(p);
        }

        info!(
            root = ?self.root_id,
            root_view = self.root.view.0,
            vertices = self.vertices.len(),
            "Vertex store rebuilt"
        );
        self.updates.push(VertexStoreUpdate::Rebuilt { state });
        true
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Prepared ancestors of `id` above the root, oldest first, `id` included.
    pub fn path_from_root(&self, id: &Hash) -> Vec<PreparedVertex> {
        let mut path = Vec::new();
        let mut next = self.vertices.get(id);
        while let Some(vertex) = next {
            path.push(vertex.clone());
            next = self.vertices.get(&vertex.parent_id());
        }
        path.reverse();
        path
    }

    /// `count` vertices ending at `id`, walking parent links, oldest first.
    ///
    /// Returns `None` unless every one of them is in the store.
    pub fn get_vertices(&self, id: &Hash, count: usize) -> Option<Vec<Vertex>> {
        let mut vertices = Vec::with_capacity(count.min(self.vertices.len() + 1));
        let mut next = *id;
        for _ in 0..count {
            let vertex = if next == self.root_id {
                &self.root
            } else {
                self.vertices.get(&next)?.vertex()
            };
            next = vertex.parent_id();
            vertices.push(vertex.clone());
        }
        vertices.reverse();
        Some(vertices)
    }

    /// Snapshot of the store: root, then the DAG in depth-first order.
    pub fn state(&self) -> Result<VerifiedVertexStoreState, VertexStoreError> {
        let mut vertices = Vec::with_capacity(self.vertices.len());
        let mut stack: Vec<Hash> = self.children_of(&self.root_id).rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(prepared) = self.vertices.get(&id) {
                vertices.push(prepared.vertex().clone());
                stack.extend(self.children_of(&id).rev());
            }
        }

        Ok(VerifiedVertexStoreState::new(
            self.high_qc(),
            self.root.clone(),
            vertices,
            self.highest_tc.clone(),
        )?)
    }

    fn children_of(&self, id: &Hash) -> impl DoubleEndedIterator<Item = Hash> + '_ {
        self.children.get(id).into_iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{
        AccumulatorState, Command, Epoch, LedgerHeader, ValidatorId, View, VoteData,
    };
    use std::collections::HashSet;
    use tracing_test::traced_test;

    /// Ledger that prepares every vertex on its parent's header, unless its
    /// view is listed in `refuse`.
    #[derive(Default)]
    struct MockLedger {
        refuse: HashSet<View>,
    }

    impl Ledger for MockLedger {
        fn prepare(
            &mut self,
            _previous: &[PreparedVertex],
            vertex: &Vertex,
        ) -> Option<PreparedVertex> {
            if self.refuse.contains(&vertex.view) {
                return None;
            }
            let header = vertex
                .parent_header()
                .ledger_header
                .with_view_and_timestamp(vertex.view, vertex.timestamp_ms);
            Some(PreparedVertex::new(
                vertex.clone(),
                header,
                vertex.commands.clone(),
                Vec::new(),
            ))
        }
    }

    fn genesis() -> (Vertex, QuorumCertificate) {
        let header = LedgerHeader::genesis(AccumulatorState::genesis(), 0);
        let vertex = Vertex::genesis(header.clone());
        let qc = QuorumCertificate::of_genesis(&vertex, header);
        (vertex, qc)
    }

    fn new_store() -> (VertexStore<MockLedger>, QuorumCertificate) {
        let (vertex, qc) = genesis();
        let state = VerifiedVertexStoreState::genesis(vertex, qc.clone()).unwrap();
        (VertexStore::create(state, MockLedger::default()), qc)
    }

    fn child(qc: &QuorumCertificate, view: u64, tag: &str) -> Vertex {
        Vertex {
            epoch: Epoch(0),
            qc: qc.clone(),
            view: View(view),
            commands: vec![Command::new(tag.as_bytes())],
            proposer: Some(ValidatorId(view % 4)),
            timestamp_ms: view * 1_000,
        }
    }

    fn qc_on<L: Ledger>(store: &VertexStore<L>, vertex: &Vertex) -> QuorumCertificate {
        let header = store.header_of(&vertex.id()).unwrap();
        QuorumCertificate::new(VoteData::for_vertex(vertex, header), vec![])
    }

    /// Insert a vertex at each view in `views`, each certified before the
    /// next is built on it. Returns the vertices and the last QC.
    fn extend(
        store: &mut VertexStore<MockLedger>,
        from: &QuorumCertificate,
        views: &[u64],
    ) -> (Vec<Vertex>, QuorumCertificate) {
        let mut qc = from.clone();
        let mut vertices = Vec::new();
        for view in views {
            let vertex = child(&qc, *view, &format!("v{view}"));
            assert!(store.insert_vertex(&vertex).unwrap());
            qc = qc_on(store, &vertex);
            assert_eq!(store.add_qc(&qc).unwrap(), AddQcResult::Recorded);
            vertices.push(vertex);
        }
        (vertices, qc)
    }

    fn committed_views(updates: &[VertexStoreUpdate]) -> Vec<u64> {
        updates
            .iter()
            .filter_map(|u| match u {
                VertexStoreUpdate::Committed { committed, .. } => Some(committed),
                _ => None,
            })
            .flatten()
            .map(|v| v.view().0)
            .collect()
    }

    #[test]
    fn test_add_qc_for_unknown_vertex_needs_fetch() {
        let (mut store, genesis_qc) = new_store();
        let orphan = child(&genesis_qc, 1, "orphan");
        let qc = QuorumCertificate::new(
            VoteData::for_vertex(
                &orphan,
                BftHeader::new(
                    orphan.view,
                    orphan.id(),
                    genesis_qc.proposed().ledger_header.clone(),
                ),
            ),
            vec![],
        );
        assert_eq!(store.add_qc(&qc).unwrap(), AddQcResult::MissingVertex);
        assert!(store.take_updates().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_qc_committing_off_chain_vertex_is_rejected() {
        let (mut store, genesis_qc) = new_store();
        let (vertices, _) = extend(&mut store, &genesis_qc, &[1, 2]);
        store.take_updates();

        let tip = child(&qc_on(&store, &vertices[1]), 3, "tip");
        assert!(store.insert_vertex(&tip).unwrap());
        store.take_updates();

        let mut unknown = qc_on(&store, &tip);
        unknown.vote_data.committed = Some(BftHeader::new(
            View(1),
            Hash::from_bytes(b"nope"),
            genesis_qc.proposed().ledger_header.clone(),
        ));
        assert_eq!(store.add_qc(&unknown).unwrap(), AddQcResult::Rejected);

        // The right vertex at the wrong view is not an ancestor either.
        let mut wrong_view = qc_on(&store, &tip);
        if let Some(committed) = wrong_view.vote_data.committed.as_mut() {
            committed.view = View(2);
        }
        assert_eq!(store.add_qc(&wrong_view).unwrap(), AddQcResult::Rejected);

        assert!(store.take_updates().is_empty());
        assert_eq!(store.root().view, View(0));
        assert_eq!(store.high_qc().highest_qc().view(), View(2));

        assert_eq!(store.add_qc(&qc_on(&store, &tip)).unwrap(), AddQcResult::Recorded);
        assert_eq!(store.root().view, View(1));
    }

    #[test]
    fn test_insert_requires_parent() {
        let (mut store, genesis_qc) = new_store();
        let v1 = child(&genesis_qc, 1, "a");
        let mut v2 = child(&genesis_qc, 2, "b");
        v2.qc.vote_data.proposed.vertex_id = v1.id();

        assert!(matches!(
            store.insert_vertex(&v2),
            Err(VertexStoreError::MissingParent { parent, .. }) if parent == v1.id()
        ));
    }

    #[traced_test]
    #[test]
    fn test_three_chain_commits_each_ancestor_once() {
        let (mut store, genesis_qc) = new_store();
        let (vertices, last_qc) = extend(&mut store, &genesis_qc, &[1, 2, 3, 4, 5]);

        let updates = store.take_updates();
        assert_eq!(committed_views(&updates), vec![1, 2, 3]);
        assert_eq!(store.root().view, View(3));
        assert_eq!(store.root_id(), vertices[2].id());
        assert_eq!(store.len(), 2);

        // Replaying the QCs commits nothing new.
        for vertex in &vertices[1..] {
            store.add_qc(&vertex.qc).unwrap();
        }
        store.add_qc(&last_qc).unwrap();
        assert!(committed_views(&store.take_updates()).is_empty());
        assert_eq!(store.root().view, View(3));
    }

    #[test]
    fn test_view_gap_delays_commit() {
        let (mut store, genesis_qc) = new_store();
        let (_, qc) = extend(&mut store, &genesis_qc, &[1, 2, 4, 5]);
        assert!(committed_views(&store.take_updates()).is_empty());

        let (_, _) = extend(&mut store, &qc, &[6]);
        assert_eq!(committed_views(&store.take_updates()), vec![1, 2, 4]);
    }

    #[test]
    fn test_commit_prunes_forks() {
        let (mut store, genesis_qc) = new_store();
        let (main, _) = extend(&mut store, &genesis_qc, &[1, 2]);

        // Fork off v1 at view 3 that is never certified.
        let v1_qc = qc_on(&store, &main[0]);
        let fork = child(&v1_qc, 3, "fork");
        assert!(store.insert_vertex(&fork).unwrap());

        let v2_qc = qc_on(&store, &main[1]);
        let (_, _) = extend(&mut store, &v2_qc, &[4, 5, 6]);

        let updates = store.take_updates();
        let pruned: Vec<Hash> = updates
            .iter()
            .filter_map(|u| match u {
                VertexStoreUpdate::Committed { pruned, .. } => Some(pruned.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert!(pruned.contains(&fork.id()));
        assert!(!store.contains_vertex(&fork.id()));
    }

    #[test]
    fn test_committed_update_carries_root_proof() {
        let (mut store, genesis_qc) = new_store();
        let (_, _) = extend(&mut store, &genesis_qc, &[1, 2, 3]);

        let update = store
            .take_updates()
            .into_iter()
            .find(|u| matches!(u, VertexStoreUpdate::Committed { .. }))
            .unwrap();
        let VertexStoreUpdate::Committed { proof, state, .. } = update else {
            unreachable!();
        };
        assert_eq!(proof.view(), View(1));
        assert_eq!(state.root().view, View(1));
        assert_eq!(state.root_proof(), Some(proof));
    }

    #[test]
    fn test_get_vertices_is_ancestor_first() {
        let (mut store, genesis_qc) = new_store();
        let (vertices, _) = extend(&mut store, &genesis_qc, &[1, 2, 3]);

        let fetched = store.get_vertices(&vertices[2].id(), 3).unwrap();
        let views: Vec<u64> = fetched.iter().map(|v| v.view.0).collect();
        assert_eq!(views, vec![1, 2, 3]);

        // Older than the root is unavailable.
        assert!(store.get_vertices(&vertices[2].id(), 4).is_none());
        assert!(store.get_vertices(&Hash::from_bytes(b"unknown"), 1).is_none());
    }

    #[test]
    fn test_insert_vertex_chain_connects_from_known_parent() {
        let (mut source, genesis_qc) = new_store();
        let (vertices, _) = extend(&mut source, &genesis_qc, &[1, 2, 3]);

        let (mut target, _) = new_store();
        target.insert_vertex_chain(&vertices).unwrap();

        assert!(target.contains_vertex(&vertices[2].id()));
        // The QC in v3 certifies v2; v1 is not yet committed.
        assert_eq!(target.high_qc().highest_qc().view(), View(2));
        assert_eq!(target.root().view, View(0));
    }

    #[test]
    fn test_state_round_trips_through_create() {
        let (mut store, genesis_qc) = new_store();
        let (vertices, _) = extend(&mut store, &genesis_qc, &[1, 2, 3, 4]);
        let state = store.state().unwrap();

        let restored = VertexStore::create(state.clone(), MockLedger::default());
        assert_eq!(restored.root_id(), store.root_id());
        assert!(restored.contains_vertex(&vertices[3].id()));
        assert_eq!(restored.high_qc(), store.high_qc());
        assert_eq!(restored.state().unwrap(), state);
    }

    #[test]
    fn test_try_rebuild_refuses_rollback_and_ledger_refusal() {
        let (mut store, genesis_qc) = new_store();
        let (_, qc4) = extend(&mut store, &genesis_qc, &[1, 2, 3, 4]);
        let at_view_2 = store.state().unwrap();
        assert_eq!(at_view_2.root().view, View(2));

        let (_, _) = extend(&mut store, &qc4, &[5]);
        assert_eq!(store.root().view, View(3));
        assert!(!store.try_rebuild(at_view_2.clone()));

        let (mut fresh, _) = new_store();
        fresh.ledger_mut().refuse.insert(View(3));
        assert!(!fresh.try_rebuild(at_view_2.clone()));
        assert_eq!(fresh.root().view, View(0));

        fresh.ledger_mut().refuse.clear();
        assert!(fresh.try_rebuild(at_view_2.clone()));
        assert_eq!(fresh.root().view, View(2));
        assert_eq!(fresh.high_qc(), *at_view_2.high_qc());
        assert!(matches!(
            fresh.take_updates().as_slice(),
            [VertexStoreUpdate::Rebuilt { state }] if *state == at_view_2
        ));
    }

    #[test]
    fn test_timeout_certificate_keeps_highest() {
        let (mut store, _) = new_store();
        let tc = |view| TimeoutCertificate {
            epoch: Epoch(0),
            view: View(view),
            signatures: vec![],
        };
        store.insert_timeout_certificate(tc(5));
        store.insert_timeout_certificate(tc(3));
        assert_eq!(store.highest_timeout_certificate().map(|t| t.view), Some(View(5)));
        store.insert_timeout_certificate(tc(7));
        assert_eq!(store.highest_timeout_certificate().map(|t| t.view), Some(View(7)));
    }
}
