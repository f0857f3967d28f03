//! Reference Service - Reconciliation Engine
//!
//! This module provides the core orchestration of the reference engine: on
//! every note save it brings the directed reference graph and the annotated
//! content of referenced notes back into agreement with the note's current
//! text.
//!
//! # Reconciliation algorithm
//!
//! 1. Strip forward markers left by a prior pass (backlink annotation lines
//!    belong to *other* notes' reconciliations and are left alone)
//! 2. Parse candidate references from the normalized text
//! 3. Resolve candidates against the Note Store, owner-scoped; dangling
//!    links are dropped silently
//! 4. Replace the source note's outgoing edge set wholesale, inside one
//!    transaction - no add/remove diffing, the edge set is always a pure
//!    function of current content. Re-insert forward markers and persist
//!    the marked content.
//! 5. Append a backlink annotation to each resolved target that does not
//!    already carry one for this source. A leaf mutation: it never
//!    re-triggers reconciliation of the target.
//! 6. Report the source plus every mutated target as affected.
//!
//! # Locking discipline
//!
//! Exclusive scope per `(user_id, note_id)`: the edge-replace step locks
//! the source key, each backlink append locks its target key. The two
//! scopes are never held at the same time, so mutual references cannot
//! deadlock, and unrelated notes reconcile fully in parallel.
//!
//! # Failure model
//!
//! A failed edge replace aborts the call (the transaction leaves no
//! partial state). A failed backlink append is logged and skipped; the
//! resulting missing annotation is display-only and self-heals on the next
//! save of the source note.

use crate::db::{NoteStore, ReferenceStore};
use crate::models::{MarkerScan, NoteReferences, ReconcileOutcome, ReferenceEdge};
use crate::services::error::ReferenceServiceError;
use crate::utils::links::{parse_references, ParsedReference};
use crate::utils::markers;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Key for the per-note lock table: `(user_id, note_id)`
type NoteKey = (String, String);

/// The reconciliation engine and its sibling reference operations
///
/// Holds its collaborators behind injected interfaces - no global state.
/// Cheap to share via `Arc`; all methods take `&self`.
pub struct ReferenceService {
    note_store: Arc<dyn NoteStore>,
    reference_store: Arc<ReferenceStore>,
    /// Per-(owner, note) mutexes serializing edge replaces and backlink
    /// appends. Entries are created on demand and retained; the table is
    /// bounded by the number of notes touched in this process lifetime.
    note_locks: DashMap<NoteKey, Arc<Mutex<()>>>,
}

impl ReferenceService {
    /// Create a new ReferenceService with injected stores
    pub fn new(note_store: Arc<dyn NoteStore>, reference_store: Arc<ReferenceStore>) -> Self {
        Self {
            note_store,
            reference_store,
            note_locks: DashMap::new(),
        }
    }

    /// Reconcile a note's reference graph with its just-saved content
    ///
    /// Idempotent: calling again with identical content changes neither the
    /// edge set nor any target's annotation. Safe under concurrency per the
    /// locking discipline above.
    ///
    /// # Errors
    ///
    /// Only store failures surface here; dangling links, duplicate edges,
    /// and per-target annotation failures are expected states handled
    /// internally.
    pub async fn reconcile(
        &self,
        user_id: &str,
        source_note_id: &str,
        new_content: &str,
    ) -> Result<ReconcileOutcome, ReferenceServiceError> {
        // Steps 1-2: normalize and parse (pure, cannot fail)
        let normalized = markers::strip_forward_markers(new_content);
        let candidates = parse_references(&normalized, source_note_id);

        // A source that no longer resolves has no content, so its derived
        // edge set is empty; clear any stale edges and stop.
        if self
            .note_store
            .get_by_id(source_note_id, user_id)
            .await?
            .is_none()
        {
            warn!(
                "reconcile called for missing note {}; clearing its outgoing edges",
                source_note_id
            );
            let lock = self.note_lock(user_id, source_note_id);
            let _guard = lock.lock().await;
            self.reference_store
                .replace_outgoing_edges(user_id, source_note_id, &[])
                .await?;
            return Ok(ReconcileOutcome {
                created_edge_count: 0,
                annotated_target_count: 0,
                affected_note_ids: vec![source_note_id.to_string()],
            });
        }

        // Step 3: resolve candidates; dangling links are normal
        let mut resolved = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self
                .note_store
                .get_by_id(&candidate.target_note_id, user_id)
                .await?
            {
                Some(_) => resolved.push(candidate),
                None => debug!(
                    "dropping dangling link to note {}",
                    candidate.target_note_id
                ),
            }
        }

        let edges: Vec<ReferenceEdge> = resolved
            .iter()
            .map(|c| ReferenceEdge::new(user_id, source_note_id, &c.target_note_id, &c.label))
            .collect();

        // Step 4: wholesale edge replace plus cosmetic forward-marker
        // rewrite, serialized on the source note
        let created_edge_count = {
            let lock = self.note_lock(user_id, source_note_id);
            let _guard = lock.lock().await;

            let created = self
                .reference_store
                .replace_outgoing_edges(user_id, source_note_id, &edges)
                .await?;
            // The graph is committed at this point; the marker rewrite is
            // cosmetic and must not undo a successful replace
            if let Err(e) = self
                .rewrite_forward_markers(user_id, source_note_id, &normalized, &resolved)
                .await
            {
                warn!(
                    "failed to rewrite forward markers for note {}: {}",
                    source_note_id, e
                );
            }
            created
        };

        // Step 5: annotate targets; per-target failures reduce the count
        // but never abort the pass
        let mut affected_note_ids = vec![source_note_id.to_string()];
        let mut annotated_target_count = 0;
        for candidate in &resolved {
            match self
                .append_backlink(user_id, &candidate.target_note_id, source_note_id)
                .await
            {
                Ok(true) => {
                    annotated_target_count += 1;
                    affected_note_ids.push(candidate.target_note_id.clone());
                }
                Ok(false) => {}
                Err(e) => warn!(
                    "failed to annotate note {}: {}",
                    candidate.target_note_id, e
                ),
            }
        }

        info!(
            "reconciled note {}: {} edges, {} targets annotated",
            source_note_id, created_edge_count, annotated_target_count
        );

        Ok(ReconcileOutcome {
            created_edge_count,
            annotated_target_count,
            affected_note_ids,
        })
    }

    /// Get both directions of the reference graph around a note
    ///
    /// Not an error for a missing note: edges may legitimately outlive
    /// their endpoints until the orphan sweep runs.
    pub async fn get_references(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> Result<NoteReferences, ReferenceServiceError> {
        Ok(self.reference_store.get_by_note(user_id, note_id).await?)
    }

    /// Delete every edge between an ordered pair of notes
    pub async fn delete_reference(
        &self,
        user_id: &str,
        from_note_id: &str,
        to_note_id: &str,
    ) -> Result<u64, ReferenceServiceError> {
        let deleted = self
            .reference_store
            .delete_edge(user_id, from_note_id, to_note_id)
            .await?;
        if deleted > 0 {
            info!(
                "deleted {} reference(s) {} -> {}",
                deleted, from_note_id, to_note_id
            );
        }
        Ok(deleted)
    }

    /// Count markers in a note's stored content
    ///
    /// # Errors
    ///
    /// Returns `NoteNotFound` when the note does not resolve - unlike edge
    /// queries, this operation has to read content.
    pub async fn detect_markers(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> Result<MarkerScan, ReferenceServiceError> {
        let note = self
            .note_store
            .get_by_id(note_id, user_id)
            .await?
            .ok_or_else(|| ReferenceServiceError::note_not_found(note_id))?;

        Ok(markers::detect_markers(&note.content))
    }

    /// Delete edges whose endpoints no longer resolve in the Note Store
    ///
    /// Repairs drift left by deletions that bypassed reconciliation.
    /// Idempotent and safe to call at any time; touches only the Reference
    /// Store. A note created between the existence check and the delete is
    /// benign: deletion is restricted to endpoints that were checked and
    /// found missing, so an edge with live endpoints can never be removed.
    pub async fn sweep_orphans(&self, user_id: &str) -> Result<u64, ReferenceServiceError> {
        let endpoint_ids = self.reference_store.distinct_endpoint_ids(user_id).await?;

        let mut dead = Vec::new();
        for note_id in endpoint_ids {
            if self
                .note_store
                .get_by_id(&note_id, user_id)
                .await?
                .is_none()
            {
                dead.push(note_id);
            }
        }

        if dead.is_empty() {
            return Ok(0);
        }

        let deleted = self
            .reference_store
            .delete_edges_touching(user_id, &dead)
            .await?;
        info!(
            "orphan sweep removed {} edge(s) for {} dead note(s)",
            deleted,
            dead.len()
        );
        Ok(deleted)
    }

    /// Re-insert forward markers before each resolved link span and persist
    /// the marked content
    ///
    /// Cosmetic and strictly best-effort: if the stored content no longer
    /// matches what was saved (a concurrent backlink append landed on this
    /// note), the rewrite is skipped and the markers catch up on the next
    /// save. Must be called with the source note's key lock held.
    async fn rewrite_forward_markers(
        &self,
        user_id: &str,
        source_note_id: &str,
        normalized: &str,
        resolved: &[ParsedReference],
    ) -> Result<(), ReferenceServiceError> {
        let stored = match self.note_store.get_by_id(source_note_id, user_id).await? {
            Some(note) => note,
            None => return Ok(()),
        };

        if markers::strip_forward_markers(&stored.content) != normalized {
            debug!(
                "note {} content moved on; skipping marker rewrite",
                source_note_id
            );
            return Ok(());
        }

        // Descending offsets keep earlier spans valid while inserting
        let mut marked = normalized.to_string();
        for candidate in resolved.iter().rev() {
            marked = markers::encode_forward_marker(&marked, candidate.offset);
        }

        if marked != stored.content {
            self.note_store
                .update_content(source_note_id, user_id, &marked)
                .await?;
        }

        Ok(())
    }

    /// Append the backlink annotation for one source to one target
    ///
    /// Returns `true` when the target's content was actually mutated. The
    /// append is a read-modify-write on target content, serialized on the
    /// target's key; a target that vanished mid-flight is a soft skip.
    async fn append_backlink(
        &self,
        user_id: &str,
        target_note_id: &str,
        source_note_id: &str,
    ) -> Result<bool, ReferenceServiceError> {
        let lock = self.note_lock(user_id, target_note_id);
        let _guard = lock.lock().await;

        let target = match self.note_store.get_by_id(target_note_id, user_id).await? {
            Some(note) => note,
            None => {
                debug!("target note {} vanished before annotation", target_note_id);
                return Ok(false);
            }
        };

        if markers::has_backlink(&target.content, source_note_id) {
            return Ok(false);
        }

        let mut content = target.content;
        content.push_str(&markers::encode_backlink(source_note_id));

        Ok(self
            .note_store
            .update_content(target_note_id, user_id, &content)
            .await?
            .is_some())
    }

    fn note_lock(&self, user_id: &str, note_id: &str) -> Arc<Mutex<()>> {
        self.note_locks
            .entry((user_id.to_string(), note_id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
