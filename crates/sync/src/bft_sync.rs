//! Vertex synchronization state machine.
//!
//! Brings the local vertex store up to a HighQC learned from a peer. A sync
//! that cannot be satisfied locally fetches the missing vertices, either
//! walking back one vertex per round-trip from the certified vertex (QC sync)
//! or, when the store is behind the committed header, fetching the 3-vertex
//! window ending at the committing QC and rebuilding the store from it once
//! the ledger has caught up (committed sync).
//!
//! # Bookkeeping
//!
//! - `syncing`: one [`SyncState`] per target vertex id
//! - `bft_syncing`: outstanding vertex requests, each shared by every sync
//!   waiting on the same `(vertex id, count)`
//! - `ledger_syncing`: syncs parked until the ledger reaches their committed
//!   header
//!
//! Output is buffered and drained with [`BftSync::take_actions`].

use crate::{RequestRateLimiter, SyncConfig, SyncCounters, SyncError};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use quorum_bft::{AddQcResult, VertexStore, VertexStoreUpdate};
use quorum_core::{Action, Event, Ledger, OutboundMessage, TimerId};
use quorum_messages::{GetVerticesErrorResponse, GetVerticesRequest, GetVerticesResponse};
use quorum_types::{
    BftHeader, Hash, HighQc, LedgerProof, LedgerSyncTarget, LedgerUpdate, LocalSyncRequest,
    ValidatorId, Vertex, VerifiedVertexStoreState,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Outcome of [`BftSync::sync_to_qc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResult {
    /// The store already holds the certified vertex.
    Synced,
    /// Vertices are being fetched.
    InProgress,
    /// The target is stale or malformed and will not be retried.
    Invalid,
}

/// Progress of one sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Preparing,
    /// Fetching the window ending at the committing QC.
    GetCommittedVertices,
    /// Waiting for the ledger to reach the committed header.
    SyncToCommit,
    /// Fetching back from the certified vertex.
    GetQcVertices,
}

/// One outstanding attempt to sync to a HighQC.
#[derive(Debug, Clone)]
struct SyncState {
    high_qc: HighQc,
    committed_header: BftHeader,
    committed_proof: LedgerProof,
    author: ValidatorId,
    stage: SyncStage,
    /// Vertices fetched so far, oldest first.
    fetched: VecDeque<Vertex>,
}

/// One outstanding vertex request.
#[derive(Debug, Clone)]
struct SyncRequestState {
    /// Peers to ask, preferred first.
    authors: Vec<ValidatorId>,
    /// Syncs waiting on this request, in arrival order.
    sync_ids: Vec<Hash>,
    /// Timeouts this request has gone through.
    timeout_count: u32,
}

/// Vertex synchronization for one replica.
pub struct BftSync {
    local: ValidatorId,
    config: SyncConfig,

    syncing: IndexMap<Hash, SyncState>,
    bft_syncing: IndexMap<GetVerticesRequest, SyncRequestState>,
    ledger_syncing: BTreeMap<LedgerSyncTarget, Vec<Hash>>,

    /// Last committed ledger proof this state machine has been told about.
    current_ledger_header: LedgerProof,

    rate_limiter: RequestRateLimiter,
    rng: ChaCha8Rng,
    now: Duration,
    counters: SyncCounters,

    outbox: Vec<Action>,
}

impl std::fmt::Debug for BftSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BftSync")
            .field("local", &self.local)
            .field("syncing", &self.syncing.len())
            .field("requests", &self.bft_syncing.len())
            .field("ledger_syncing", &self.ledger_syncing.len())
            .finish_non_exhaustive()
    }
}

impl BftSync {
    /// Create a sync state machine.
    ///
    /// `seed` drives retry peer and victim selection.
    pub fn new(
        local: ValidatorId,
        config: SyncConfig,
        current_ledger_header: LedgerProof,
        seed: u64,
    ) -> Self {
        let rate_limiter =
            RequestRateLimiter::new(config.request_rate_per_sec, config.request_burst);
        Self {
            local,
            config,
            syncing: IndexMap::new(),
            bft_syncing: IndexMap::new(),
            ledger_syncing: BTreeMap::new(),
            current_ledger_header,
            rate_limiter,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: Duration::ZERO,
            counters: SyncCounters::default(),
            outbox: Vec::new(),
        }
    }

    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    /// Drain buffered actions, oldest first.
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.outbox)
    }

    pub fn counters(&self) -> SyncCounters {
        self.counters
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn current_ledger_header(&self) -> &LedgerProof {
        &self.current_ledger_header
    }

    pub fn is_syncing(&self, vertex_id: &Hash) -> bool {
        self.syncing.contains_key(vertex_id)
    }

    pub fn sync_stage(&self, vertex_id: &Hash) -> Option<SyncStage> {
        self.syncing.get(vertex_id).map(|s| s.stage)
    }

    /// Outstanding vertex requests, oldest first.
    pub fn pending_requests(&self) -> impl Iterator<Item = &GetVerticesRequest> + '_ {
        self.bft_syncing.keys()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Sync entry point
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bring `store` up to `high_qc`.
    ///
    /// `author` is the peer that showed us `high_qc` and is asked first. It
    /// may be `None` only when the target is expected to be local already.
    /// `timeout_count` is the number of timeouts that led to this call.
    pub fn sync_to_qc<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        high_qc: HighQc,
        author: Option<ValidatorId>,
        timeout_count: u32,
    ) -> Result<SyncResult, SyncError> {
        let proposed = high_qc.highest_qc().proposed();
        let vertex_id = proposed.vertex_id;
        let view = proposed.view;

        if view < store.root().view {
            trace!(view = view.0, root_view = store.root().view.0, "Sync target below root");
            self.counters.invalid_targets += 1;
            return Ok(SyncResult::Invalid);
        }

        if view < self.current_ledger_header.view() {
            trace!(
                view = view.0,
                ledger_view = self.current_ledger_header.view().0,
                "Sync target below committed ledger"
            );
            self.counters.invalid_targets += 1;
            return Ok(SyncResult::Invalid);
        }

        if let Some(tc) = high_qc.highest_tc() {
            store.insert_timeout_certificate(tc.clone());
        }

        match store.add_qc(high_qc.highest_qc())? {
            AddQcResult::Recorded => {
                self.outbox.push(Action::ProcessHighQc {
                    high_qc: store.high_qc(),
                });
                return Ok(SyncResult::Synced);
            }
            AddQcResult::Rejected => {
                self.counters.invalid_targets += 1;
                return Ok(SyncResult::Invalid);
            }
            AddQcResult::MissingVertex => {}
        }

        if high_qc.highest_qc().view().is_genesis() {
            warn!(vertex_id = ?vertex_id, "Bad genesis QC, ignoring");
            self.counters.invalid_targets += 1;
            return Ok(SyncResult::Invalid);
        }

        if self.syncing.contains_key(&vertex_id) {
            return Ok(SyncResult::InProgress);
        }

        let author = author.ok_or(SyncError::MissingAuthor(vertex_id))?;

        let Some((committed_header, committed_proof)) =
            high_qc.highest_committed_qc().committed_and_ledger_proof()
        else {
            warn!(vertex_id = ?vertex_id, "Committed QC of sync target commits nothing");
            self.counters.invalid_targets += 1;
            return Ok(SyncResult::Invalid);
        };

        debug!(
            vertex_id = ?vertex_id,
            view = view.0,
            author = %author,
            timeout_count,
            "Starting vertex sync"
        );

        let state = SyncState {
            high_qc,
            committed_header,
            committed_proof,
            author,
            stage: SyncStage::Preparing,
            fetched: VecDeque::new(),
        };
        let committed_sync = requires_ledger_sync(store, &state);
        self.syncing.insert(vertex_id, state);

        if committed_sync {
            self.do_committed_sync(vertex_id, timeout_count);
        } else {
            self.do_qc_sync(vertex_id, timeout_count);
        }
        Ok(SyncResult::InProgress)
    }

    fn do_qc_sync(&mut self, sync_id: Hash, timeout_count: u32) {
        let Some(state) = self.syncing.get_mut(&sync_id) else {
            return;
        };
        state.stage = SyncStage::GetQcVertices;

        let qc = state.high_qc.highest_qc();
        let request = GetVerticesRequest::new(qc.proposed().vertex_id, 1);
        let authors = author_list(self.local, state.author, qc.signers());

        trace!(sync_id = ?sync_id, request = %request, "QC sync");
        self.send_sync_request(request, authors, sync_id, timeout_count);
    }

    fn do_committed_sync(&mut self, sync_id: Hash, timeout_count: u32) {
        let Some(state) = self.syncing.get_mut(&sync_id) else {
            return;
        };
        state.stage = SyncStage::GetCommittedVertices;

        // The committing QC plus its two ancestors form a valid root window.
        let committed_qc = state.high_qc.highest_committed_qc();
        let request = GetVerticesRequest::new(committed_qc.proposed().vertex_id, 3);
        let authors = author_list(self.local, state.author, committed_qc.signers());

        trace!(sync_id = ?sync_id, request = %request, "Committed sync");
        self.send_sync_request(request, authors, sync_id, timeout_count);
    }

    fn send_sync_request(
        &mut self,
        request: GetVerticesRequest,
        authors: Vec<ValidatorId>,
        sync_id: Hash,
        timeout_count: u32,
    ) {
        let Some(&first) = authors.first() else {
            warn!(sync_id = ?sync_id, request = %request, "No peer to request vertices from");
            self.syncing.shift_remove(&sync_id);
            return;
        };

        let send = match self.bft_syncing.entry(request) {
            Entry::Vacant(entry) => {
                entry.insert(SyncRequestState {
                    authors,
                    sync_ids: vec![sync_id],
                    timeout_count,
                });
                true
            }
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                if !state.sync_ids.contains(&sync_id) {
                    state.sync_ids.push(sync_id);
                }
                // A retry of a request still shared with other syncs.
                if timeout_count > state.timeout_count {
                    state.timeout_count = timeout_count;
                    state.authors = authors;
                    true
                } else {
                    false
                }
            }
        };

        if send {
            self.outbox.push(Action::SetTimer {
                id: TimerId::VertexRequest(request),
                duration: self.config.backoff(timeout_count),
            });
            self.dispatch_request(first, request);
        }
    }

    fn dispatch_request(&mut self, to: ValidatorId, request: GetVerticesRequest) {
        if !self.rate_limiter.try_acquire(self.now) {
            warn!(request = %request, to = %to, "Vertex request rate limited");
            self.counters.requests_rate_limited += 1;
            return;
        }
        self.counters.requests_sent += 1;
        self.outbox.push(Action::SendMessage {
            to,
            message: OutboundMessage::GetVerticesRequest(request),
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Responses
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle vertices fetched from `from`.
    pub fn on_get_vertices_response<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        from: ValidatorId,
        response: GetVerticesResponse,
    ) -> Result<(), SyncError> {
        let Some(request) = response.correlation_key() else {
            debug!(from = %from, "Empty vertices response");
            self.counters.responses_dropped += 1;
            return Ok(());
        };

        if !Vertex::is_linked_chain(&response.vertices) {
            warn!(
                from = %from,
                request = %request,
                "Vertices response is not a parent-linked chain"
            );
            self.counters.responses_dropped += 1;
            return Ok(());
        }

        let Some(request_state) = self.bft_syncing.shift_remove(&request) else {
            trace!(from = %from, request = %request, "Response to untracked request");
            self.counters.responses_dropped += 1;
            return Ok(());
        };

        self.outbox.push(Action::CancelTimer {
            id: TimerId::VertexRequest(request),
        });
        self.counters.responses_processed += 1;
        debug!(
            from = %from,
            request = %request,
            waiting = request_state.sync_ids.len(),
            "Vertices received"
        );

        for sync_id in request_state.sync_ids {
            // Another sync may have already satisfied this one.
            let Some(stage) = self.syncing.get(&sync_id).map(|s| s.stage) else {
                continue;
            };
            match stage {
                SyncStage::GetCommittedVertices => {
                    self.process_committed_vertices(store, sync_id, &response.vertices)?
                }
                SyncStage::GetQcVertices => {
                    self.process_qc_vertices(store, sync_id, &response.vertices)?
                }
                SyncStage::Preparing | SyncStage::SyncToCommit => {
                    debug!(sync_id = ?sync_id, ?stage, "Vertices response for sync not fetching");
                }
            }
        }
        Ok(())
    }

    fn process_qc_vertices<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        sync_id: Hash,
        vertices: &[Vertex],
    ) -> Result<(), SyncError> {
        let Some(state) = self.syncing.get_mut(&sync_id) else {
            return Ok(());
        };
        for vertex in vertices.iter().rev() {
            state.fetched.push_front(vertex.clone());
        }
        let Some(oldest) = state.fetched.front() else {
            return Ok(());
        };
        let parent_id = oldest.parent_id();

        if !store.contains_vertex(&parent_id) {
            let authors = author_list(self.local, state.author, oldest.qc.signers());
            trace!(
                sync_id = ?sync_id,
                fetched = state.fetched.len(),
                root_view = store.root().view.0,
                "Fetching further ancestor"
            );
            self.send_sync_request(GetVerticesRequest::new(parent_id, 1), authors, sync_id, 0);
            return Ok(());
        }

        let chain: Vec<Vertex> = state.fetched.iter().cloned().collect();
        let high_qc = state.high_qc.clone();
        let author = state.author;

        store.insert_vertex_chain(&chain)?;
        self.syncing.shift_remove(&sync_id);
        self.sync_to_qc(store, high_qc, Some(author), 0)?;
        Ok(())
    }

    fn process_committed_vertices<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        sync_id: Hash,
        vertices: &[Vertex],
    ) -> Result<(), SyncError> {
        let Some(state) = self.syncing.get_mut(&sync_id) else {
            return Ok(());
        };
        state.fetched.extend(vertices.iter().cloned());

        if state.committed_proof.state_version() <= self.current_ledger_header.state_version() {
            return self.rebuild_and_sync_qc(store, sync_id);
        }

        state.stage = SyncStage::SyncToCommit;
        let target = state.committed_proof.clone();
        let target_nodes = author_list(self.local, state.author, target.signers());

        debug!(
            sync_id = ?sync_id,
            target_version = target.state_version(),
            current_version = self.current_ledger_header.state_version(),
            "Waiting for ledger to reach committed header"
        );

        self.ledger_syncing
            .entry(target.ledger_header.sync_target())
            .or_default()
            .push(sync_id);
        self.counters.ledger_sync_requests += 1;
        self.outbox.push(Action::EnqueueInternal {
            event: Event::LocalSyncRequested {
                request: LocalSyncRequest {
                    target,
                    target_nodes,
                },
            },
        });
        Ok(())
    }

    /// Rebuild the store from a committed sync's window, if still needed,
    /// then restart the sync from scratch.
    fn rebuild_and_sync_qc<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        sync_id: Hash,
    ) -> Result<(), SyncError> {
        let Some(state) = self.syncing.shift_remove(&sync_id) else {
            return Ok(());
        };

        if requires_ledger_sync(store, &state) {
            let mut fetched: Vec<Vertex> = state.fetched.iter().cloned().collect();
            fetched.sort_by_key(|v| v.view);

            if let Some((root, rest)) = fetched.split_first() {
                let committed_qc = state.high_qc.highest_committed_qc().clone();
                let highest_tc = store.highest_timeout_certificate().cloned();
                let high_qc = HighQc::new(committed_qc.clone(), committed_qc, highest_tc.clone());

                let snapshot =
                    VerifiedVertexStoreState::new(high_qc, root.clone(), rest.to_vec(), highest_tc);
                match snapshot {
                    Ok(snapshot) => {
                        let high_qc = snapshot.high_qc().clone();
                        if store.try_rebuild(snapshot) {
                            info!(
                                sync_id = ?sync_id,
                                root_view = store.root().view.0,
                                "Rebuilt vertex store from committed window"
                            );
                            self.counters.rebuilds += 1;
                            self.outbox.push(Action::ProcessHighQc { high_qc });
                        } else {
                            warn!(sync_id = ?sync_id, "Vertex store refused rebuild");
                        }
                    }
                    Err(e) => {
                        warn!(
                            sync_id = ?sync_id,
                            error = %e,
                            "Fetched window is not a valid snapshot"
                        );
                    }
                }
            }
        } else {
            debug!(sync_id = ?sync_id, "Store reaches committed header, skipping rebuild");
        }

        self.sync_to_qc(store, state.high_qc, Some(state.author), 0)?;
        Ok(())
    }

    /// Handle a responder that lacked the requested vertices.
    pub fn on_get_vertices_error_response<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        from: ValidatorId,
        response: GetVerticesErrorResponse,
    ) -> Result<(), SyncError> {
        self.counters.error_responses += 1;
        if !self.bft_syncing.contains_key(&response.request) {
            trace!(
                from = %from,
                request = %response.request,
                "Error response to untracked request"
            );
            return Ok(());
        }

        let theirs = response.high_qc.highest_qc().view();
        let ours = store.high_qc().highest_qc().view();
        debug!(from = %from, theirs = theirs.0, ours = ours.0, "Vertices error response");

        // The responder has moved on: follow its HighQC instead.
        if theirs > ours {
            self.sync_to_qc(store, response.high_qc, Some(from), 0)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Timeouts
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle a vertex request that ran out of patience.
    ///
    /// Retries one sync picked at random from every outstanding request, not
    /// necessarily one waiting on `request`, against a different peer.
    pub fn on_request_timeout<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        request: GetVerticesRequest,
    ) -> Result<(), SyncError> {
        if !self.bft_syncing.contains_key(&request) {
            return Ok(());
        }
        self.counters.request_timeouts += 1;

        let candidates: Vec<Hash> = self
            .bft_syncing
            .values()
            .flat_map(|r| r.sync_ids.iter().copied())
            .filter(|id| self.syncing.contains_key(id))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        if candidates.is_empty() {
            debug!(request = %request, "Timed out request has no live syncs");
            self.bft_syncing.shift_remove(&request);
            return Ok(());
        }

        let victim = candidates[self.rng.gen_range(0..candidates.len())];

        // Detach the victim from every request it waits on.
        let mut victim_request: Option<(Vec<ValidatorId>, u32)> = None;
        for state in self.bft_syncing.values_mut() {
            if let Some(pos) = state.sync_ids.iter().position(|id| *id == victim) {
                state.sync_ids.remove(pos);
                victim_request.get_or_insert_with(|| (state.authors.clone(), state.timeout_count));
            }
        }
        let emptied: Vec<GetVerticesRequest> = self
            .bft_syncing
            .iter()
            .filter(|(_, state)| state.sync_ids.is_empty())
            .map(|(key, _)| *key)
            .collect();
        for key in emptied {
            self.bft_syncing.shift_remove(&key);
            if key != request {
                self.outbox.push(Action::CancelTimer {
                    id: TimerId::VertexRequest(key),
                });
            }
        }

        let (Some(state), Some((authors, timeout_count))) =
            (self.syncing.shift_remove(&victim), victim_request)
        else {
            return Ok(());
        };

        let next = self
            .pick_retry_author(&authors, state.author)
            .ok_or(SyncError::NoPeers(victim))?;

        debug!(
            request = %request,
            victim = ?victim,
            next = %next,
            timeout_count = timeout_count + 1,
            "Retrying sync after timeout"
        );

        let before = self.bft_syncing.get(&request).map(|r| r.timeout_count);
        self.sync_to_qc(store, state.high_qc, Some(next), timeout_count + 1)?;

        // Keep the timed-out request alive for its remaining waiters unless
        // the retry already re-armed it.
        if let Some(remaining) = self.bft_syncing.get(&request) {
            if before == Some(remaining.timeout_count) && !remaining.sync_ids.is_empty() {
                self.outbox.push(Action::SetTimer {
                    id: TimerId::VertexRequest(request),
                    duration: self.config.backoff(remaining.timeout_count),
                });
            }
        }
        Ok(())
    }

    fn pick_retry_author(
        &mut self,
        authors: &[ValidatorId],
        original: ValidatorId,
    ) -> Option<ValidatorId> {
        let mut candidates: Vec<ValidatorId> = authors
            .iter()
            .copied()
            .filter(|a| *a != self.local && *a != original)
            .collect();
        if candidates.is_empty() {
            candidates = authors.iter().copied().filter(|a| *a != self.local).collect();
        }
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Ledger and store updates
    // ═══════════════════════════════════════════════════════════════════════════

    /// Track a new committed ledger tail.
    ///
    /// Resumes every sync parked on a header the tail now covers, then drops
    /// syncs whose target is at or below the tail's view.
    pub fn process_ledger_update<L: Ledger>(
        &mut self,
        store: &mut VertexStore<L>,
        update: &LedgerUpdate,
    ) -> Result<(), SyncError> {
        let tail = update.tail();
        trace!(
            state_version = tail.state_version(),
            view = tail.view().0,
            "Ledger update"
        );
        self.current_ledger_header = tail.clone();

        let covered = tail.ledger_header.sync_target();
        let mut pending = self.ledger_syncing.split_off(&covered);
        let exact = pending.remove(&covered);
        let resumed = std::mem::replace(&mut self.ledger_syncing, pending);

        for sync_id in resumed.into_values().chain(exact).flatten() {
            if self.syncing.contains_key(&sync_id) {
                self.rebuild_and_sync_qc(store, sync_id)?;
            }
        }

        let tail_view = self.current_ledger_header.view();
        self.syncing.retain(|sync_id, state| {
            let keep = state.high_qc.highest_qc().view() > tail_view;
            if !keep {
                trace!(sync_id = ?sync_id, "Sync superseded by ledger");
            }
            keep
        });
        Ok(())
    }

    /// Reserved hook for vertex store updates. Has no effect.
    pub fn process_bft_update(&mut self, _update: &VertexStoreUpdate) {}

    // ═══════════════════════════════════════════════════════════════════════════
    // Responder
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serve a peer's vertex request from `store`.
    ///
    /// Answers with the requested window, or with our HighQC if any vertex of
    /// it is missing.
    pub fn handle_get_vertices_request<L: Ledger>(
        &mut self,
        store: &VertexStore<L>,
        from: ValidatorId,
        request: GetVerticesRequest,
    ) {
        let vertices = (request.count > 0)
            .then(|| store.get_vertices(&request.vertex_id, request.count as usize))
            .flatten();

        let message = match vertices {
            Some(vertices) => {
                trace!(from = %from, request = %request, "Serving vertices");
                OutboundMessage::GetVerticesResponse(GetVerticesResponse::new(vertices))
            }
            None => {
                trace!(from = %from, request = %request, "Missing requested vertices");
                OutboundMessage::GetVerticesErrorResponse(Box::new(GetVerticesErrorResponse {
                    high_qc: store.high_qc(),
                    request,
                }))
            }
        };
        self.outbox.push(Action::SendMessage { to: from, message });
    }
}

/// The store cannot reach the committed header by chaining.
fn requires_ledger_sync<L: Ledger>(store: &VertexStore<L>, state: &SyncState) -> bool {
    !store.contains_vertex(&state.committed_header.vertex_id)
        && store.root().view < state.committed_header.view
}

/// `author` followed by `signers`, without duplicates or `local`.
fn author_list(
    local: ValidatorId,
    author: ValidatorId,
    signers: impl Iterator<Item = ValidatorId>,
) -> Vec<ValidatorId> {
    std::iter::once(author)
        .chain(signers)
        .filter(|v| *v != local)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}
