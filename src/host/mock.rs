//! In-memory host used by unit tests.

use super::{
    GrabHandle, Host, HostError, HostEvent, OutputEventKind, OutputId, SubscriptionId,
    ViewEventKind, ViewId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};

/// Scriptable [`Host`] that records every call the bridge makes.
#[derive(Debug, Default)]
pub struct MockHost {
    pub outputs: Vec<OutputId>,
    pub views: Vec<ViewId>,
    pub views_by_output: HashMap<OutputId, Vec<ViewId>>,
    pub view_under_cursor: Option<ViewId>,
    pub events: VecDeque<HostEvent>,

    next_handle: u64,
    pub active_subscriptions: HashSet<SubscriptionId>,
    pub subscribe_calls: usize,
    pub claimed_grabs: HashSet<GrabHandle>,
    pub grab_claims: usize,
    pub activations: Vec<(ViewId, bool)>,
    pub focus_requests: Vec<ViewId>,
    pub completed_serials: Vec<u64>,
    pub commands: Vec<String>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(outputs: &[u32]) -> Self {
        Self {
            outputs: outputs.iter().copied().map(OutputId).collect(),
            ..Self::default()
        }
    }

    pub fn push_event(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[async_trait]
impl Host for MockHost {
    async fn next_event(&mut self) -> Result<HostEvent, HostError> {
        self.events.pop_front().ok_or(HostError::ConnectionClosed)
    }

    async fn outputs(&mut self) -> Result<Vec<OutputId>, HostError> {
        Ok(self.outputs.clone())
    }

    async fn views(&mut self) -> Result<Vec<ViewId>, HostError> {
        Ok(self.views.clone())
    }

    async fn views_on_output(&mut self, output: OutputId) -> Result<Vec<ViewId>, HostError> {
        Ok(self.views_by_output.get(&output).cloned().unwrap_or_default())
    }

    async fn view_at_cursor(&mut self) -> Result<Option<ViewId>, HostError> {
        Ok(self.view_under_cursor)
    }

    async fn subscribe_output(
        &mut self,
        _output: OutputId,
        _kind: OutputEventKind,
    ) -> Result<SubscriptionId, HostError> {
        self.subscribe_calls += 1;
        let id = SubscriptionId(self.next_handle());
        self.active_subscriptions.insert(id);
        Ok(id)
    }

    async fn subscribe_view(
        &mut self,
        _view: ViewId,
        _kind: ViewEventKind,
    ) -> Result<SubscriptionId, HostError> {
        self.subscribe_calls += 1;
        let id = SubscriptionId(self.next_handle());
        self.active_subscriptions.insert(id);
        Ok(id)
    }

    async fn unsubscribe(&mut self, subscription: SubscriptionId) -> Result<(), HostError> {
        self.active_subscriptions.remove(&subscription);
        Ok(())
    }

    async fn claim_input_grab(&mut self, _output: OutputId) -> Result<GrabHandle, HostError> {
        self.grab_claims += 1;
        let grab = GrabHandle(self.next_handle());
        self.claimed_grabs.insert(grab);
        Ok(grab)
    }

    async fn release_input_grab(&mut self, grab: GrabHandle) -> Result<(), HostError> {
        self.claimed_grabs.remove(&grab);
        Ok(())
    }

    async fn set_activated(&mut self, view: ViewId, activated: bool) -> Result<(), HostError> {
        self.activations.push((view, activated));
        Ok(())
    }

    async fn request_focus(&mut self, view: ViewId) -> Result<(), HostError> {
        self.focus_requests.push(view);
        Ok(())
    }

    async fn complete_focus_request(&mut self, serial: u64) -> Result<(), HostError> {
        self.completed_serials.push(serial);
        Ok(())
    }

    async fn run_command(&mut self, command: &str) -> Result<(), HostError> {
        self.commands.push(command.to_string());
        Ok(())
    }
}
