//! Participant snapshots and change detection.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::extract::{Extractor, ObservedParticipant};
use crate::page::{HostPage, MutationBatch, MutationWatch, Selector};
use crate::protocol::Participant;

/// Watches the participant container and reports value-level changes.
pub struct ParticipantObserver {
    container: Selector,
    extractor: Arc<Extractor>,
    watch: Option<MutationWatch>,
    last: Option<Vec<Participant>>,
}

impl ParticipantObserver {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self {
            container: Selector::attr("data-participants-container"),
            extractor,
            watch: None,
            last: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.watch.is_some()
    }

    /// Start watching the container. `false` when it is not on the page yet.
    pub fn attach(&mut self, page: &dyn HostPage) -> bool {
        if self.watch.is_none() {
            self.watch = page.observe(&self.container);
            if self.watch.is_some() {
                debug!("Participant observer attached");
            }
        }
        self.watch.is_some()
    }

    /// Stop watching and forget the last snapshot.
    pub fn halt(&mut self) {
        self.watch = None;
        self.last = None;
    }

    /// Take a snapshot and treat it as already emitted.
    pub fn prime(&mut self, page: &dyn HostPage) -> Vec<Participant> {
        let snapshot = self.snapshot(page);
        self.last = Some(snapshot.clone());
        snapshot
    }

    /// Take a snapshot and return it only if it differs from the last one.
    pub fn recompute(&mut self, page: &dyn HostPage) -> Option<Vec<Participant>> {
        let snapshot = self.snapshot(page);
        if self.last.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Wait for the next mutation batch. Pending forever while detached;
    /// `None` means the container went away and the observer detached.
    pub async fn next_batch(&mut self) -> Option<MutationBatch> {
        let Some(watch) = self.watch.as_mut() else {
            return std::future::pending().await;
        };

        let batch = watch.recv().await;
        if batch.is_none() {
            debug!("Participant container disconnected");
            self.watch = None;
        }
        batch
    }

    fn snapshot(&self, page: &dyn HostPage) -> Vec<Participant> {
        let observed = self.extractor.participants(page);
        stamp(observed, self.last.as_deref().unwrap_or_default())
    }
}

/// Reuse the join time of participants already seen under the same id.
fn stamp(observed: Vec<ObservedParticipant>, previous: &[Participant]) -> Vec<Participant> {
    let now = Utc::now();
    observed
        .into_iter()
        .map(|p| {
            let join_time = previous
                .iter()
                .find(|prev| prev.id == p.id)
                .map_or(now, |prev| prev.join_time);
            Participant {
                id: p.id,
                name: p.name,
                is_host: p.is_host,
                is_muted: p.is_muted,
                has_camera: p.has_camera,
                is_camera_on: p.is_camera_on,
                join_time,
            }
        })
        .collect()
}
