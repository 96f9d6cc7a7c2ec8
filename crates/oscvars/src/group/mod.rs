mod dispatcher;
mod propagator;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;

use crate::host::{FieldFlags, View};
use crate::net::{
    BoundState, Connection, ConnectionOptions, Endpoint, Mode, NetworkStats, OpenSocket,
    OscMessage,
};
use crate::variable::{Value, Variable, VariableDirectory, VariableError, VariableSpec};

pub use dispatcher::{TickReport, apply_batch, coalesce};
pub use propagator::{Propagator, outbound_address, outbound_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GroupError {
    #[error("group '{0}' has been deleted")]
    Inactive(String),
    #[error("group '{0}' is a receiver and has no host")]
    NotSender(String),
    #[error("group '{name}' cannot switch from {from} to {to} in place")]
    ModeChange { name: String, from: Mode, to: Mode },
    #[error(transparent)]
    Variable(#[from] VariableError),
}

struct AttachedView {
    id: ViewId,
    view: Box<dyn View>,
}

struct GroupState {
    variables: VariableDirectory,
    propagator: Propagator,
    views: Vec<AttachedView>,
    next_view_id: u64,
}

/// One endpoint plus one schema of typed variables.
///
/// Lock order is `state` before `connection`. The dispatcher drains the socket
/// before it takes the state lock, so a tick never holds both.
pub struct Group {
    id: GroupId,
    name: String,
    active: AtomicBool,
    state: Mutex<GroupState>,
    connection: Mutex<Connection>,
    reset_lock: Mutex<()>,
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Group {
    pub(crate) fn new(
        id: GroupId,
        name: impl Into<String>,
        endpoint: Endpoint,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            active: AtomicBool::new(true),
            state: Mutex::new(GroupState {
                variables: VariableDirectory::new(),
                propagator: Propagator::new(),
                views: Vec::new(),
                next_view_id: 0,
            }),
            connection: Mutex::new(Connection::new(endpoint, options)),
            reset_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> Mode {
        self.connection.lock().mode()
    }

    pub fn endpoint(&self) -> Endpoint {
        self.connection.lock().endpoint().clone()
    }

    pub fn bound_state(&self) -> BoundState {
        self.connection.lock().state()
    }

    pub fn stats(&self) -> NetworkStats {
        self.connection.lock().stats().clone()
    }

    /// Unbinds, waits out the settle delay for receivers, then binds again.
    ///
    /// Drains running concurrently see no socket until the new one is attached.
    pub fn reset_connection(&self) -> BoundState {
        let _serial = self.reset_lock.lock();

        let (endpoint, delay) = {
            let mut conn = self.connection.lock();
            conn.unbind();
            (conn.endpoint().clone(), conn.settle_delay())
        };

        if !self.is_active() {
            return BoundState::Unbound;
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let opened = OpenSocket::open(&endpoint);

        let mut conn = self.connection.lock();
        if !self.is_active() {
            return BoundState::Unbound;
        }
        if conn.endpoint() != &endpoint {
            return conn.state();
        }
        conn.attach(opened)
    }

    pub fn set_port(&self, port: u16) -> Result<BoundState, GroupError> {
        let endpoint = match self.endpoint() {
            Endpoint::Sender { host, .. } => Endpoint::Sender { host, port },
            Endpoint::Receiver { .. } => Endpoint::Receiver { port },
        };
        self.reconfigure(endpoint)
    }

    pub fn set_host(&self, host: impl Into<String>) -> Result<BoundState, GroupError> {
        match self.endpoint() {
            Endpoint::Sender { port, .. } => self.reconfigure(Endpoint::Sender {
                host: host.into(),
                port,
            }),
            Endpoint::Receiver { .. } => Err(GroupError::NotSender(self.name.clone())),
        }
    }

    /// Changes host or port. Mode changes go through the group directory, which
    /// also re-keys the host schema.
    pub fn reconfigure(&self, endpoint: Endpoint) -> Result<BoundState, GroupError> {
        let current = self.mode();
        if endpoint.mode() != current {
            return Err(GroupError::ModeChange {
                name: self.name.clone(),
                from: current,
                to: endpoint.mode(),
            });
        }
        self.switch_endpoint(endpoint)
    }

    pub(crate) fn switch_endpoint(&self, endpoint: Endpoint) -> Result<BoundState, GroupError> {
        if !self.is_active() {
            return Err(GroupError::Inactive(self.name.clone()));
        }

        {
            let mut state = self.state.lock();
            let mut conn = self.connection.lock();
            if conn.endpoint() == &endpoint {
                return Ok(conn.state());
            }

            let mode_changed = conn.mode() != endpoint.mode();
            conn.set_endpoint(endpoint.clone());
            drop(conn);

            let flags = self.field_flags();
            let GroupState {
                variables, views, ..
            } = &mut *state;
            for attached in views.iter_mut() {
                attached.view.set_endpoint(&endpoint, FieldFlags::ENDPOINT);
                if mode_changed {
                    for variable in variables.iter() {
                        attached.view.remove_field(variable.name());
                        attached.view.add_field(variable, flags);
                    }
                }
            }
        }

        Ok(self.reset_connection())
    }

    fn field_flags(&self) -> FieldFlags {
        match self.mode() {
            Mode::Sender => FieldFlags::DISABLE_SAVE_PRESET,
            Mode::Receiver => FieldFlags::DISABLE_SAVE_PRESET | FieldFlags::READ_ONLY,
        }
    }

    pub fn add_variable(&self, spec: VariableSpec) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        if !self.is_active() {
            return Err(GroupError::Inactive(self.name.clone()));
        }

        let flags = self.field_flags();
        let GroupState {
            variables,
            propagator,
            views,
            ..
        } = &mut *state;

        let variable = variables.insert(spec)?;
        for attached in views.iter_mut() {
            attached.view.add_field(variable, flags);
        }

        if propagator.subscribe(variable.name()) && !propagator.is_suppressed() {
            self.send(&outbound_message(&self.name, variable));
        }

        log::debug!(
            "Added {} variable '{}' to group '{}'",
            variable.kind(),
            variable.name(),
            self.name
        );
        Ok(())
    }

    /// Returns false if no variable of that name exists.
    pub fn remove_variable(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        if !state.variables.contains(name) {
            return false;
        }

        for attached in state.views.iter_mut() {
            attached.view.remove_field(name);
        }
        state.variables.remove(name);
        state.propagator.unsubscribe(name);
        true
    }

    /// Local mutation. The stored value is not clamped; the outbound message is.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        let GroupState {
            variables,
            propagator,
            ..
        } = &mut *state;

        let variable = variables.set_value(name, value.into())?;
        if propagator.should_send(name) {
            self.send(&outbound_message(&self.name, variable));
        }
        Ok(())
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.state
            .lock()
            .variables
            .get(name)
            .map(|v| v.value().clone())
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.state.lock().variables.get(name).cloned()
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.state.lock().variables.iter().cloned().collect()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.state.lock().variables.names()
    }

    pub fn attach_view(&self, mut view: Box<dyn View>) -> Result<ViewId, GroupError> {
        let mut state = self.state.lock();
        if !self.is_active() {
            return Err(GroupError::Inactive(self.name.clone()));
        }

        view.set_endpoint(&self.endpoint(), FieldFlags::ENDPOINT);
        let flags = self.field_flags();
        for variable in state.variables.iter() {
            view.add_field(variable, flags);
        }

        let id = ViewId(state.next_view_id);
        state.next_view_id += 1;
        state.views.push(AttachedView { id, view });
        Ok(id)
    }

    pub fn detach_view(&self, id: ViewId) -> bool {
        let mut state = self.state.lock();
        let Some(pos) = state.views.iter().position(|v| v.id == id) else {
            return false;
        };

        let mut attached = state.views.remove(pos);
        for variable in state.variables.iter() {
            attached.view.remove_field(variable.name());
        }
        attached.view.destroy();
        true
    }

    pub fn view_count(&self) -> usize {
        self.state.lock().views.len()
    }

    pub fn is_suppressed(&self) -> bool {
        self.state.lock().propagator.is_suppressed()
    }

    /// Opens a suppression window for a bulk update. Mutations inside the window
    /// send nothing; closing the last window resends every variable once.
    pub fn suppress(&self) -> BulkUpdate<'_> {
        self.state.lock().propagator.suppress();
        BulkUpdate {
            group: self,
            finished: false,
        }
    }

    fn end_suppression(&self) -> usize {
        let mut state = self.state.lock();
        if state.propagator.suppression_depth() != 1 {
            state.propagator.release();
            return 0;
        }
        // Setters stay suppressed until the resend pass completes.
        let sent = self.resend_locked(&state);
        state.propagator.release();
        sent
    }

    /// Sends one message per variable, in schema order. Returns the number sent.
    pub fn resend_all(&self) -> usize {
        let state = self.state.lock();
        self.resend_locked(&state)
    }

    fn resend_locked(&self, state: &GroupState) -> usize {
        state
            .variables
            .iter()
            .filter(|variable| self.send(&outbound_message(&self.name, variable)))
            .count()
    }

    fn send(&self, message: &OscMessage) -> bool {
        if !self.is_active() {
            return false;
        }
        let mut conn = self.connection.lock();
        if conn.mode() != Mode::Sender {
            return false;
        }
        conn.send(message)
    }

    /// One processing tick: drain, coalesce, then apply under the directory lock.
    pub fn tick(&self) -> TickReport {
        if !self.is_active() {
            return TickReport::default();
        }

        let messages = {
            let mut conn = self.connection.lock();
            if conn.mode() != Mode::Receiver {
                return TickReport::default();
            }
            conn.drain()
        };
        if messages.is_empty() {
            return TickReport::default();
        }

        let drained = messages.len();
        let batch = coalesce(messages);

        let mut state = self.state.lock();
        if !self.is_active() {
            return TickReport {
                drained,
                ..Default::default()
            };
        }

        let mut report = apply_batch(&mut state.variables, &batch);
        report.drained = drained;
        report
    }

    /// Marks the group inactive, releases the socket and tears down every view.
    pub(crate) fn teardown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.connection.lock().unbind();

        let mut state = self.state.lock();
        let names = state.variables.names();
        for mut attached in state.views.drain(..) {
            for name in &names {
                attached.view.remove_field(name);
            }
            attached.view.destroy();
        }
        state.propagator.clear();
    }
}

/// Guard returned by [`Group::suppress`]. Finishing or dropping it closes the window.
#[must_use = "the suppression window closes when the guard is dropped"]
pub struct BulkUpdate<'a> {
    group: &'a Group,
    finished: bool,
}

impl BulkUpdate<'_> {
    /// Closes the window. Returns the number of messages sent by the resend pass.
    pub fn finish(mut self) -> usize {
        self.finished = true;
        self.group.end_suppression()
    }
}

impl Drop for BulkUpdate<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.group.end_suppression();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::host::endpoint_fields;
    use crate::variable::{Bounds, VariableKind};

    #[derive(Default)]
    struct Fields {
        names: Vec<(String, FieldFlags)>,
        endpoint: Vec<(&'static str, String)>,
        destroyed: bool,
    }

    struct SharedView(Arc<Mutex<Fields>>);

    impl View for SharedView {
        fn add_field(&mut self, variable: &Variable, flags: FieldFlags) {
            self.0.lock().names.push((variable.name().to_string(), flags));
        }

        fn remove_field(&mut self, name: &str) {
            self.0.lock().names.retain(|(n, _)| n != name);
        }

        fn set_endpoint(&mut self, endpoint: &Endpoint, flags: FieldFlags) {
            assert_eq!(flags, FieldFlags::ENDPOINT);
            self.0.lock().endpoint = endpoint_fields(endpoint);
        }

        fn destroy(&mut self) {
            self.0.lock().destroyed = true;
        }
    }

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn sender_group() -> Group {
        Group::new(GroupId(1), "synth", Endpoint::sender("127.0.0.1", 9), options())
    }

    #[test]
    fn views_follow_schema_changes() {
        let group = sender_group();
        group
            .add_variable(VariableSpec::new("cutoff", VariableKind::Float))
            .unwrap();

        let fields = Arc::new(Mutex::new(Fields::default()));
        let id = group
            .attach_view(Box::new(SharedView(fields.clone())))
            .unwrap();
        assert_eq!(
            fields.lock().names,
            vec![("cutoff".to_string(), FieldFlags::DISABLE_SAVE_PRESET)]
        );

        group
            .add_variable(VariableSpec::new("res", VariableKind::Int))
            .unwrap();
        assert_eq!(fields.lock().names.len(), 2);

        assert!(group.remove_variable("cutoff"));
        assert!(!group.remove_variable("cutoff"));
        assert_eq!(fields.lock().names[0].0, "res");

        assert!(group.detach_view(id));
        assert!(fields.lock().destroyed);
        assert!(fields.lock().names.is_empty());
        assert!(!group.detach_view(id));
    }

    #[test]
    fn receiver_fields_are_read_only() {
        let group = Group::new(GroupId(2), "lights", Endpoint::receiver(0), options());
        group
            .add_variable(VariableSpec::new("dim", VariableKind::Float))
            .unwrap();

        let fields = Arc::new(Mutex::new(Fields::default()));
        group
            .attach_view(Box::new(SharedView(fields.clone())))
            .unwrap();
        assert!(fields.lock().names[0].1.contains(FieldFlags::READ_ONLY));
    }

    #[test]
    fn mode_change_is_rejected_in_place() {
        let group = sender_group();
        assert!(matches!(
            group.reconfigure(Endpoint::receiver(9000)),
            Err(GroupError::ModeChange { .. })
        ));
        assert_eq!(
            group.set_host("localhost").map(|_| group.endpoint()),
            Ok(Endpoint::sender("localhost", 9))
        );
    }

    #[test]
    fn views_show_the_current_endpoint() {
        let group = sender_group();
        let fields = Arc::new(Mutex::new(Fields::default()));
        group
            .attach_view(Box::new(SharedView(fields.clone())))
            .unwrap();
        assert_eq!(
            fields.lock().endpoint,
            vec![
                ("Host IP", "127.0.0.1".to_string()),
                ("Sender Port", "9".to_string())
            ]
        );

        group.set_port(10).unwrap();
        group.set_host("localhost").unwrap();
        assert_eq!(
            fields.lock().endpoint,
            vec![
                ("Host IP", "localhost".to_string()),
                ("Sender Port", "10".to_string())
            ]
        );

        group.switch_endpoint(Endpoint::receiver(0)).unwrap();
        assert_eq!(
            fields.lock().endpoint,
            vec![("Receiver Port", "0".to_string())]
        );
    }

    #[test]
    fn readded_variable_is_subscribed_once() {
        let group = sender_group();
        group.reset_connection();
        group
            .add_variable(VariableSpec::new("a", VariableKind::Float))
            .unwrap();
        assert!(group.remove_variable("a"));
        assert_eq!(group.state.lock().propagator.subscription_count(), 0);

        let before = group.stats().packets_sent;
        group
            .add_variable(VariableSpec::new("a", VariableKind::Float))
            .unwrap();
        assert_eq!(group.stats().packets_sent, before + 1);
        assert_eq!(group.state.lock().propagator.subscription_count(), 1);

        group.set_value("a", 0.5f32).unwrap();
        assert_eq!(group.stats().packets_sent, before + 2);
    }

    #[test]
    fn receiver_has_no_host() {
        let group = Group::new(GroupId(3), "rx", Endpoint::receiver(0), options());
        assert_eq!(
            group.set_host("10.0.0.1"),
            Err(GroupError::NotSender("rx".into()))
        );
    }

    #[test]
    fn nested_windows_resend_once() {
        let group = sender_group();
        group.reset_connection();
        group
            .add_variable(VariableSpec::new("a", VariableKind::Float))
            .unwrap();
        group
            .add_variable(
                VariableSpec::new("b", VariableKind::Int).with_bounds(Bounds::int(0, 3)),
            )
            .unwrap();
        let before = group.stats().packets_sent;

        let outer = group.suppress();
        let inner = group.suppress();
        group.set_value("a", 2.0f32).unwrap();
        group.set_value("b", 7).unwrap();
        assert_eq!(inner.finish(), 0);
        assert!(group.is_suppressed());
        assert_eq!(group.stats().packets_sent, before);

        assert_eq!(outer.finish(), 2);
        assert!(!group.is_suppressed());
        assert_eq!(group.stats().packets_sent, before + 2);
    }

    #[test]
    fn dropped_guard_closes_window() {
        let group = sender_group();
        {
            let _bulk = group.suppress();
            assert!(group.is_suppressed());
        }
        assert!(!group.is_suppressed());
    }

    #[test]
    fn teardown_rejects_further_use() {
        let group = sender_group();
        let fields = Arc::new(Mutex::new(Fields::default()));
        group
            .attach_view(Box::new(SharedView(fields.clone())))
            .unwrap();

        group.teardown();
        assert!(!group.is_active());
        assert!(fields.lock().destroyed);
        assert_eq!(group.view_count(), 0);
        assert_eq!(
            group.add_variable(VariableSpec::new("x", VariableKind::Float)),
            Err(GroupError::Inactive("synth".into()))
        );
        assert_eq!(group.tick(), TickReport::default());
        assert_eq!(group.bound_state(), BoundState::Unbound);
    }
}
