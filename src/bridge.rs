//! Bridge orchestration.
//!
//! Owns the host connection, the source tracker, the derived state and the
//! publisher, and drives one host event at a time through an explicit
//! event-kind dispatch table. Every handler completes before the next event
//! is taken; steady-state failures are logged and the event dropped, so one
//! stale source never stalls the bridge.

use crate::bus::{BusSignal, Publisher};
use crate::host::{Host, HostError, HostEvent, OutputId, ViewId, ViewRole};
use crate::state::SharedState;
use crate::tracker::{SourceTracker, TrackOutcome, UntrackOutcome};
use crate::translate;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// The event bridge core.
pub struct Bridge<H: Host, P: Publisher> {
    host: H,
    publisher: P,
    tracker: SourceTracker,
    state: SharedState,
}

impl<H: Host, P: Publisher> Bridge<H, P> {
    pub fn new(host: H, publisher: P, state: SharedState) -> Self {
        Self {
            host,
            publisher,
            tracker: SourceTracker::new(),
            state,
        }
    }

    /// Shared handle to the derived state, e.g. for the bus query interface.
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Wait for the next host event.
    pub async fn next_event(&mut self) -> Result<HostEvent, HostError> {
        self.host.next_event().await
    }

    /// Enumerate pre-existing outputs and views and track them silently,
    /// then run the startup-notify command. Only topology changes observed
    /// after this full scan are announced on the bus.
    pub async fn startup(&mut self) -> Result<()> {
        let outputs = self
            .host
            .outputs()
            .await
            .context("Failed to enumerate outputs")?;
        for output in outputs {
            self.tracker
                .track_output(&mut self.host, output)
                .await
                .with_context(|| format!("Failed to track {output}"))?;
        }

        let views = self.host.views().await.context("Failed to enumerate views")?;
        for view in views {
            self.tracker
                .track_view(&mut self.host, view)
                .await
                .with_context(|| format!("Failed to track {view}"))?;
        }

        info!(
            "Tracking {} outputs after initial scan",
            self.tracker.tracked_outputs().len()
        );

        let command = self.state.lock().startup_notify().to_string();
        if !command.is_empty() {
            debug!("Running startup notify: {}", command);
            self.host
                .run_command(&command)
                .await
                .context("Failed to run startup-notify command")?;
        }

        Ok(())
    }

    /// Untrack every source, then release the bus. That order avoids
    /// dangling publishes during teardown.
    pub async fn shutdown(&mut self) {
        info!("Shutting down bridge");
        self.tracker.shutdown(&mut self.host).await;
        if let Err(e) = self.publisher.unload().await {
            warn!("Failed to unload bus backend: {}", e);
        }
    }

    /// Dispatch one host event.
    pub async fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::OutputAdded { output } => self.on_output_added(output).await,
            HostEvent::OutputRemoved { output } => self.on_output_removed(output).await,
            HostEvent::OutputConfigurationChanged { output: _ } => {
                self.publish(translate::output_configuration_changed()).await;
            }
            HostEvent::OutputWorkspaceChanged {
                output,
                horizontal,
                vertical,
            } => {
                self.publish(translate::output_workspace_changed(output, horizontal, vertical))
                    .await;
            }
            HostEvent::ViewMapped { view, output: _ } => self.on_view_mapped(view).await,
            HostEvent::ViewUnmapped { view } => self.on_view_unmapped(view).await,
            HostEvent::ViewAppIdChanged { view, app_id } => {
                self.publish(translate::app_id_changed(view, app_id)).await;
            }
            HostEvent::ViewTitleChanged { view, role, title } => {
                self.publish_opt(translate::title_changed(view, role, title)).await;
            }
            HostEvent::ViewGeometryChanged { view, geometry } => {
                let signal = translate::geometry_changed(&self.state.lock(), view, geometry);
                self.publish_opt(signal).await;
            }
            HostEvent::ViewTiled { view, role, edges } => {
                self.publish_opt(translate::tiling_changed(view, role, edges)).await;
            }
            HostEvent::ViewPingTimeout { view } => {
                self.publish(translate::view_timeout(view)).await;
            }
            HostEvent::ViewRoleChanged { view, role } => {
                self.publish(translate::role_changed(view, role)).await;
            }
            HostEvent::ViewWorkspaceChanged { view, role } => {
                self.publish_opt(translate::workspaces_changed(view, role)).await;
            }
            HostEvent::ViewMoveRequest { view, role } => {
                self.publish_opt(translate::moving_changed(view, role)).await;
            }
            HostEvent::ViewResizeRequest { view, role } => {
                self.publish_opt(translate::resizing_changed(view, role)).await;
            }
            HostEvent::ViewMinimizeRequest {
                view,
                role,
                minimized,
            } => {
                self.publish_opt(translate::minimized_changed(view, role, minimized)).await;
            }
            HostEvent::ViewTileRequest { view, role, edges } => {
                self.publish_opt(translate::maximized_changed(view, role, edges)).await;
            }
            HostEvent::ViewFullscreenChanged { view, fullscreen } => {
                self.publish(translate::fullscreen_changed(view, fullscreen)).await;
            }
            HostEvent::ViewFocused {
                view,
                role,
                activated,
            } => {
                let signal = translate::focus_changed(&mut self.state.lock(), view, role, activated);
                self.publish_opt(signal).await;
            }
            HostEvent::ViewKeepAboveChanged { view, role, above } => {
                self.publish_opt(translate::keep_above_changed(view, role, above)).await;
            }
            HostEvent::ViewHintsChanged {
                view,
                role,
                demands_attention,
            } => {
                self.publish_opt(translate::attention_changed(view, role, demands_attention))
                    .await;
            }
            HostEvent::ViewOutputMoveRequested {
                view,
                old_output,
                new_output,
            } => {
                self.publish(translate::output_move_requested(view, old_output, new_output))
                    .await;
            }
            HostEvent::ViewOutputMoved {
                view,
                role,
                old_output,
                new_output,
            } => {
                self.publish_opt(translate::output_moved(view, role, old_output, new_output))
                    .await;
                // The view list of the target output changed under us
                if let Err(e) = self.tracker.resync_views(&mut self.host, new_output).await {
                    warn!("Failed to resync views on {}: {}", new_output, e);
                }
            }
            HostEvent::ViewFocusRequest {
                view,
                role,
                serial,
                self_request,
                carried_out,
            } => {
                self.on_focus_request(view, role, serial, self_request, carried_out).await;
            }
            HostEvent::PointerButton {
                x,
                y,
                button,
                released,
            } => self.on_pointer_button(x, y, button, released).await,
            HostEvent::TabletButton => {
                self.publish(translate::tablet_touched()).await;
            }
            HostEvent::SettingChanged { key, value } => {
                self.state.lock().apply_setting(&key, &value);
            }
        }
    }

    /// A new output appeared after the initial scan; newly tracked outputs
    /// are announced, duplicates are a benign no-op.
    async fn on_output_added(&mut self, output: OutputId) {
        match self.tracker.track_output(&mut self.host, output).await {
            Ok(TrackOutcome::Tracked) => {
                self.publish(translate::output_added(output)).await;
            }
            Ok(TrackOutcome::AlreadyTracked) => {}
            Err(e) => warn!("Failed to track {}: {}", output, e),
        }
    }

    async fn on_output_removed(&mut self, output: OutputId) {
        match self.tracker.untrack_output(&mut self.host, output).await {
            Ok(UntrackOutcome::Untracked) => {
                self.publish(translate::output_removed(output)).await;
            }
            Ok(UntrackOutcome::NotTracked) => {}
            Err(e) => warn!("Failed to untrack {}: {}", output, e),
        }
    }

    async fn on_view_mapped(&mut self, view: ViewId) {
        self.publish(translate::view_added(view)).await;
        if let Err(e) = self.tracker.track_view(&mut self.host, view).await {
            warn!("Failed to track {}: {}", view, e);
        }
    }

    async fn on_view_unmapped(&mut self, view: ViewId) {
        self.publish(translate::view_closed(view)).await;
        if let Err(e) = self.tracker.untrack_view(&mut self.host, view).await {
            warn!("Failed to untrack {}: {}", view, e);
        }
        self.state.lock().clear_focus_if(view);
    }

    /// Focus-request state machine: {unresolved, carried_out}. The
    /// transition happens at most once per request instance, only for
    /// self-originated requests on toplevel views.
    async fn on_focus_request(
        &mut self,
        view: ViewId,
        role: ViewRole,
        serial: u64,
        self_request: bool,
        carried_out: bool,
    ) {
        if carried_out {
            debug!("Focus request {} already carried out", serial);
            return;
        }
        if !self_request {
            debug!("Focus request {} not self-originated, ignoring", serial);
            return;
        }
        if !role.is_toplevel() {
            debug!("Focus request {} for non-toplevel {}, ignoring", serial, view);
            return;
        }

        if let Err(e) = self.host.set_activated(view, true).await {
            warn!("Failed to activate {}: {}", view, e);
            return;
        }
        if let Err(e) = self.host.request_focus(view).await {
            warn!("Failed to focus {}: {}", view, e);
            return;
        }
        if let Err(e) = self.host.complete_focus_request(serial).await {
            warn!("Failed to complete focus request {}: {}", serial, e);
        }
    }

    async fn on_pointer_button(&mut self, x: f64, y: f64, button: u32, released: bool) {
        self.publish(translate::pointer_clicked(x, y, button, released)).await;

        let resolve_target = released && self.state.lock().find_view_under_cursor();
        if resolve_target {
            match self.host.view_at_cursor().await {
                Ok(view) => self.publish(translate::view_pressed(view)).await,
                Err(e) => warn!("Failed to resolve view under cursor: {}", e),
            }
        }
    }

    /// Hand one message to the publisher; a failed publish is a lost
    /// notification, not an error.
    async fn publish(&mut self, signal: BusSignal) {
        let topic = signal.topic;
        if let Err(e) = self.publisher.emit(signal).await {
            warn!("Failed to publish {}: {}", topic, e);
        }
    }

    async fn publish_opt(&mut self, signal: Option<BusSignal>) {
        if let Some(signal) = signal {
            self.publish(signal).await;
        }
    }
}
