//! Source set tracking.
//!
//! Maintains the live set of signal-emitting sources and guarantees each
//! live source has exactly one active subscription set. Grab interfaces and
//! subscriptions are created and torn down in lock-step with registry
//! membership, which is what makes double release impossible.

use crate::host::{
    GrabHandle, Host, HostError, OUTPUT_EVENT_KINDS, OutputEventKind, OutputId, SubscriptionId,
    VIEW_EVENT_KINDS, ViewEventKind, ViewId,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Result of a track call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The source was newly tracked.
    Tracked,
    /// The source was already tracked; nothing changed.
    AlreadyTracked,
}

/// Result of an untrack call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrackOutcome {
    /// The source was tracked and is now fully torn down.
    Untracked,
    /// The source was not tracked; nothing changed.
    NotTracked,
}

/// Per-output input-grab capability, held while the output is tracked.
#[derive(Debug)]
struct GrabInterface {
    handle: GrabHandle,
}

/// Tracks outputs and views and their subscription sets.
#[derive(Debug, Default)]
pub struct SourceTracker {
    /// Live source registry: currently-tracked output ids.
    outputs: HashSet<OutputId>,
    grabs: HashMap<OutputId, GrabInterface>,
    output_subs: HashMap<(OutputId, OutputEventKind), SubscriptionId>,
    view_subs: HashMap<(ViewId, ViewEventKind), SubscriptionId>,
}

impl SourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracked(&self, output: OutputId) -> bool {
        self.outputs.contains(&output)
    }

    pub fn tracked_outputs(&self) -> Vec<OutputId> {
        self.outputs.iter().copied().collect()
    }

    pub fn has_grab(&self, output: OutputId) -> bool {
        self.grabs.contains_key(&output)
    }

    /// Number of active output-level subscriptions for one output.
    pub fn output_subscription_count(&self, output: OutputId) -> usize {
        self.output_subs.keys().filter(|(o, _)| *o == output).count()
    }

    /// Number of active view-level subscriptions for one view.
    pub fn view_subscription_count(&self, view: ViewId) -> usize {
        self.view_subs.keys().filter(|(v, _)| *v == view).count()
    }

    /// Track an output: claim its grab interface, subscribe the full fixed
    /// event kind list, and insert it into the registry.
    ///
    /// A no-op when the output is already tracked; the registry snapshot is
    /// what decides, not the number of added notifications seen.
    pub async fn track_output<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        output: OutputId,
    ) -> Result<TrackOutcome, HostError> {
        if self.outputs.contains(&output) {
            debug!("{} already tracked", output);
            return Ok(TrackOutcome::AlreadyTracked);
        }

        let grab = host.claim_input_grab(output).await?;
        let mut subscribed = Vec::with_capacity(OUTPUT_EVENT_KINDS.len());
        for &kind in OUTPUT_EVENT_KINDS {
            match host.subscribe_output(output, kind).await {
                Ok(id) => subscribed.push((kind, id)),
                Err(e) => {
                    // Keep registry ⇔ subscriptions coupled: roll back the
                    // partial set before reporting the failure.
                    for (_, id) in subscribed {
                        let _ = host.unsubscribe(id).await;
                    }
                    let _ = host.release_input_grab(grab).await;
                    return Err(e);
                }
            }
        }

        for (kind, id) in subscribed {
            self.output_subs.insert((output, kind), id);
        }
        self.grabs.insert(output, GrabInterface { handle: grab });
        self.outputs.insert(output);
        debug!("{} tracked", output);

        Ok(TrackOutcome::Tracked)
    }

    /// Untrack an output: unsubscribe every event kind, release its grab
    /// interface, and remove it from the registry. No-op when untracked.
    pub async fn untrack_output<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        output: OutputId,
    ) -> Result<UntrackOutcome, HostError> {
        if !self.outputs.remove(&output) {
            debug!("{} not tracked, nothing to untrack", output);
            return Ok(UntrackOutcome::NotTracked);
        }

        for &kind in OUTPUT_EVENT_KINDS {
            if let Some(id) = self.output_subs.remove(&(output, kind)) {
                if let Err(e) = host.unsubscribe(id).await {
                    warn!("Failed to unsubscribe {} {:?}: {}", output, kind, e);
                }
            }
        }

        if let Some(grab) = self.grabs.remove(&output) {
            if let Err(e) = host.release_input_grab(grab.handle).await {
                warn!("Failed to release grab for {}: {}", output, e);
            }
        }

        debug!("{} untracked", output);
        Ok(UntrackOutcome::Untracked)
    }

    /// Subscribe a view to the full fixed event kind list, idempotently per
    /// (view, kind) pair.
    pub async fn track_view<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        view: ViewId,
    ) -> Result<TrackOutcome, HostError> {
        let mut added = false;
        for &kind in VIEW_EVENT_KINDS {
            if self.view_subs.contains_key(&(view, kind)) {
                continue;
            }
            let id = host.subscribe_view(view, kind).await?;
            self.view_subs.insert((view, kind), id);
            added = true;
        }

        if added {
            debug!("{} tracked", view);
            Ok(TrackOutcome::Tracked)
        } else {
            Ok(TrackOutcome::AlreadyTracked)
        }
    }

    /// Tear down all subscriptions of a view.
    pub async fn untrack_view<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        view: ViewId,
    ) -> Result<UntrackOutcome, HostError> {
        let mut removed = false;
        for &kind in VIEW_EVENT_KINDS {
            if let Some(id) = self.view_subs.remove(&(view, kind)) {
                removed = true;
                if let Err(e) = host.unsubscribe(id).await {
                    warn!("Failed to unsubscribe {} {:?}: {}", view, kind, e);
                }
            }
        }

        if removed {
            debug!("{} untracked", view);
            Ok(UntrackOutcome::Untracked)
        } else {
            Ok(UntrackOutcome::NotTracked)
        }
    }

    /// Re-derive the view list of an output from the host and idempotently
    /// (re-)establish each view's subscriptions. Used when views move
    /// between outputs or outputs are re-enumerated.
    pub async fn resync_views<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        output: OutputId,
    ) -> Result<(), HostError> {
        for view in host.views_on_output(output).await? {
            self.track_view(host, view).await?;
        }
        Ok(())
    }

    /// Tear everything down: all view subscriptions, then every tracked
    /// output. Called at shutdown before the bus is released.
    pub async fn shutdown<H: Host + ?Sized>(&mut self, host: &mut H) {
        let views: HashSet<ViewId> = self.view_subs.keys().map(|(v, _)| *v).collect();
        for view in views {
            if let Err(e) = self.untrack_view(host, view).await {
                warn!("Shutdown untrack of {} failed: {}", view, e);
            }
        }

        for output in self.tracked_outputs() {
            if let Err(e) = self.untrack_output(host, output).await {
                warn!("Shutdown untrack of {} failed: {}", output, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    #[tokio::test]
    async fn test_track_is_idempotent() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();
        let output = OutputId(1);

        assert_eq!(
            tracker.track_output(&mut host, output).await.unwrap(),
            TrackOutcome::Tracked
        );
        assert_eq!(
            tracker.track_output(&mut host, output).await.unwrap(),
            TrackOutcome::AlreadyTracked
        );

        // Exactly one subscription set and one grab interface
        assert_eq!(tracker.output_subscription_count(output), OUTPUT_EVENT_KINDS.len());
        assert_eq!(host.subscribe_calls, OUTPUT_EVENT_KINDS.len());
        assert_eq!(host.grab_claims, 1);
        assert_eq!(host.claimed_grabs.len(), 1);
    }

    #[tokio::test]
    async fn test_untrack_after_double_track_is_full_teardown() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();
        let output = OutputId(1);

        tracker.track_output(&mut host, output).await.unwrap();
        tracker.track_output(&mut host, output).await.unwrap();
        assert_eq!(
            tracker.untrack_output(&mut host, output).await.unwrap(),
            UntrackOutcome::Untracked
        );

        // Not a reference-counted partial teardown
        assert!(!tracker.is_tracked(output));
        assert!(!tracker.has_grab(output));
        assert_eq!(tracker.output_subscription_count(output), 0);
        assert!(host.active_subscriptions.is_empty());
        assert!(host.claimed_grabs.is_empty());
    }

    #[tokio::test]
    async fn test_untrack_unknown_is_noop() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();

        assert_eq!(
            tracker.untrack_output(&mut host, OutputId(9)).await.unwrap(),
            UntrackOutcome::NotTracked
        );
    }

    #[tokio::test]
    async fn test_registry_subscription_grab_coupling() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();

        for id in [1, 2, 3] {
            tracker.track_output(&mut host, OutputId(id)).await.unwrap();
        }
        tracker.untrack_output(&mut host, OutputId(2)).await.unwrap();

        for id in [1, 2, 3] {
            let output = OutputId(id);
            let tracked = tracker.is_tracked(output);
            assert_eq!(tracker.has_grab(output), tracked);
            assert_eq!(
                tracker.output_subscription_count(output),
                if tracked { OUTPUT_EVENT_KINDS.len() } else { 0 }
            );
        }
    }

    #[tokio::test]
    async fn test_hot_plug_round_trip() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();
        let output = OutputId(5);

        tracker.track_output(&mut host, output).await.unwrap();
        tracker.untrack_output(&mut host, output).await.unwrap();
        assert_eq!(
            tracker.track_output(&mut host, output).await.unwrap(),
            TrackOutcome::Tracked
        );

        assert_eq!(tracker.output_subscription_count(output), OUTPUT_EVENT_KINDS.len());
        assert_eq!(host.claimed_grabs.len(), 1);
        assert_eq!(host.active_subscriptions.len(), OUTPUT_EVENT_KINDS.len());
    }

    #[tokio::test]
    async fn test_view_tracking_idempotent() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();
        let view = ViewId(10);

        assert_eq!(
            tracker.track_view(&mut host, view).await.unwrap(),
            TrackOutcome::Tracked
        );
        assert_eq!(
            tracker.track_view(&mut host, view).await.unwrap(),
            TrackOutcome::AlreadyTracked
        );
        assert_eq!(tracker.view_subscription_count(view), VIEW_EVENT_KINDS.len());
        assert_eq!(host.subscribe_calls, VIEW_EVENT_KINDS.len());

        tracker.untrack_view(&mut host, view).await.unwrap();
        assert_eq!(tracker.view_subscription_count(view), 0);
        assert!(host.active_subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_resync_views_is_idempotent() {
        let mut host = MockHost::new();
        host.views_by_output
            .insert(OutputId(1), vec![ViewId(10), ViewId(11)]);
        let mut tracker = SourceTracker::new();

        tracker.resync_views(&mut host, OutputId(1)).await.unwrap();
        tracker.resync_views(&mut host, OutputId(1)).await.unwrap();

        assert_eq!(tracker.view_subscription_count(ViewId(10)), VIEW_EVENT_KINDS.len());
        assert_eq!(tracker.view_subscription_count(ViewId(11)), VIEW_EVENT_KINDS.len());
        assert_eq!(host.subscribe_calls, 2 * VIEW_EVENT_KINDS.len());
    }

    #[tokio::test]
    async fn test_shutdown_tears_everything_down() {
        let mut host = MockHost::new();
        let mut tracker = SourceTracker::new();

        tracker.track_output(&mut host, OutputId(1)).await.unwrap();
        tracker.track_output(&mut host, OutputId(2)).await.unwrap();
        tracker.track_view(&mut host, ViewId(10)).await.unwrap();

        tracker.shutdown(&mut host).await;

        assert!(tracker.tracked_outputs().is_empty());
        assert!(host.active_subscriptions.is_empty());
        assert!(host.claimed_grabs.is_empty());
    }
}
