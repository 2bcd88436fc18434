// The server state machine (C5): cluster-lifecycle state, view/sync/
// connect dispatch, pause/desync bookkeeping, and the per-origin
// streaming-applier map shared with the dispatcher (C6).

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use wsrep_base::{Gtid, Seqno, ServerId, TransactionId, View};

use crate::error::Fatal;
use crate::traits::{HighPriorityService, LogLevel, Provider, ServerService, Status};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum RollbackDiscipline {
    Async,
    Sync,
}

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum ServerState {
    Disconnected,
    Initializing,
    Initialized,
    Connected,
    Joiner,
    Joined,
    Donor,
    Synced,
    Disconnecting,
}

impl ServerState {
    const COUNT: usize = 9;

    fn index(self) -> usize {
        match self {
            ServerState::Disconnected => 0,
            ServerState::Initializing => 1,
            ServerState::Initialized => 2,
            ServerState::Connected => 3,
            ServerState::Joiner => 4,
            ServerState::Joined => 5,
            ServerState::Donor => 6,
            ServerState::Synced => 7,
            ServerState::Disconnecting => 8,
        }
    }
}

// Row = current state, column = target state.
#[rustfmt::skip]
const ALLOWED: [[bool; ServerState::COUNT]; ServerState::COUNT] = [
    // dis    ing    ized   cted   jer    jed    dor    sed    ding
    [false, true,  false, true,  false, false, false, false, false], // disconnected
    [true,  false, true,  false, false, false, false, false, false], // initializing
    [true,  false, false, true,  false, true,  false, false, false], // initialized
    [true,  false, false, true,  true,  false, false, true,  false], // connected
    [true,  true,  false, false, false, true,  false, false, false], // joiner
    [true,  false, false, true,  false, false, false, true,  true ], // joined
    [true,  false, false, false, false, true,  false, false, true ], // donor
    [true,  false, false, true,  false, true,  true,  false, true ], // synced
    [true,  false, false, false, false, false, false, false, false], // disconnecting
];

fn is_allowed(from: ServerState, to: ServerState) -> bool {
    ALLOWED[from.index()][to.index()]
}

struct ServerInner {
    id: ServerId,
    address: String,
    working_dir: String,
    state: ServerState,
    bootstrap: bool,
    bootstrap_fired: bool,
    connected_gtid: Gtid,
    view: Option<View>,
    last_committed: Gtid,
    desync_count: u32,
    pause_count: u32,
    pause_seqno: Option<Seqno>,
    streaming_appliers: HashMap<(ServerId, TransactionId), Box<dyn HighPriorityService>>,
    state_waiters: HashMap<ServerState, u32>,
}

pub struct ServerShared {
    name: String,
    max_protocol_version: i32,
    rollback_discipline: RollbackDiscipline,
    provider: Arc<dyn Provider>,
    service: Arc<dyn ServerService>,
    inner: Mutex<ServerInner>,
    cond: Condvar,
}

/// Owns the provider for its lifetime. Cheaply cloneable: internally
/// an `Arc<ServerShared>`, so every `Client` on this server can hold
/// one without the server itself needing a back-reference to its
/// clients (see the arena-and-handle design note).
#[derive(Clone)]
pub struct Server {
    shared: Arc<ServerShared>,
}

impl Server {
    pub fn new(
        name: impl Into<String>,
        working_dir: impl Into<String>,
        max_protocol_version: i32,
        rollback_discipline: RollbackDiscipline,
        bootstrap: bool,
        provider: Arc<dyn Provider>,
        service: Arc<dyn ServerService>,
    ) -> Self {
        let inner = ServerInner {
            id: ServerId::UNDEFINED,
            address: String::new(),
            working_dir: working_dir.into(),
            state: ServerState::Disconnected,
            bootstrap,
            bootstrap_fired: false,
            connected_gtid: Gtid::UNDEFINED,
            view: None,
            last_committed: Gtid::UNDEFINED,
            desync_count: 0,
            pause_count: 0,
            pause_seqno: None,
            streaming_appliers: HashMap::new(),
            state_waiters: HashMap::new(),
        };
        Server {
            shared: Arc::new(ServerShared {
                name: name.into(),
                max_protocol_version,
                rollback_discipline,
                provider,
                service,
                inner: Mutex::new(inner),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn rollback_discipline(&self) -> RollbackDiscipline {
        self.shared.rollback_discipline
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.shared.provider
    }

    pub fn service(&self) -> &Arc<dyn ServerService> {
        &self.shared.service
    }

    pub(crate) fn shared(&self) -> &Arc<ServerShared> {
        &self.shared
    }

    pub fn id(&self) -> ServerId {
        self.shared.inner.lock().unwrap().id
    }

    pub fn state(&self) -> ServerState {
        self.shared.inner.lock().unwrap().state
    }

    pub fn last_committed(&self) -> Gtid {
        self.shared.inner.lock().unwrap().last_committed
    }

    pub fn note_committed(&self, gtid: Gtid) {
        self.shared.inner.lock().unwrap().last_committed = gtid;
    }

    /// Low-level transition primitive; `on_connect`/`on_view`/`on_sync`
    /// are thin wrappers around it for the common cases.
    pub fn set_state(&self, to: ServerState) -> Result<(), Fatal> {
        let mut inner = self.shared.inner.lock().unwrap();
        self.transition_locked(&mut inner, to)
    }

    fn transition_locked(
        &self,
        inner: &mut MutexGuard<'_, ServerInner>,
        to: ServerState,
    ) -> Result<(), Fatal> {
        let from = inner.state;
        if !is_allowed(from, to) {
            return Err(Fatal::illegal_transition("server", from, to));
        }
        self.shared
            .service
            .log_state_change(&format!("{from:?}"), &format!("{to:?}"));
        inner.state = to;
        self.shared.cond.notify_all();
        Ok(())
    }

    pub fn on_connect(&self, gtid: Gtid) -> Result<(), Fatal> {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.connected_gtid = gtid;
        match inner.state {
            ServerState::Disconnected | ServerState::Initialized => {
                self.transition_locked(&mut inner, ServerState::Connected)
            }
            _ => Ok(()),
        }
    }

    pub fn begin_initializing(&self) -> Result<(), Fatal> {
        self.set_state(ServerState::Initializing)
    }

    pub fn finish_initializing(&self) -> Result<(), Fatal> {
        let mut inner = self.shared.inner.lock().unwrap();
        let target = if is_allowed(inner.state, ServerState::Joined) {
            ServerState::Joined
        } else {
            ServerState::Initialized
        };
        self.transition_locked(&mut inner, target)
    }

    pub fn on_view(&self, view: View) -> Result<(), Fatal> {
        self.shared.service.log_view(&view);
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(idx) = usize::try_from(view.own_index()).ok() {
            if let Some(member) = view.members().get(idx) {
                inner.id = member.id();
            }
        }
        let is_bootstrap_view =
            !inner.bootstrap_fired && inner.bootstrap && view.is_primary() && view.members().len() == 1;
        inner.view = Some(view.clone());
        if view.is_final() {
            self.transition_locked(&mut inner, ServerState::Disconnected)?;
        } else if view.is_primary() {
            if is_bootstrap_view {
                inner.bootstrap_fired = true;
                drop(inner);
                self.shared.service.bootstrap();
                return Ok(());
            }
            if is_allowed(inner.state, ServerState::Joiner) {
                self.transition_locked(&mut inner, ServerState::Joiner)?;
            }
        } else if is_allowed(inner.state, ServerState::Connected) {
            self.transition_locked(&mut inner, ServerState::Connected)?;
        }
        Ok(())
    }

    pub fn on_sync(&self) -> Result<(), Fatal> {
        self.set_state(ServerState::Synced)
    }

    pub fn disconnect(&self) -> Status {
        if self.set_state(ServerState::Disconnecting).is_err() {
            return Status::ErrorFatal;
        }
        self.shared.provider.disconnect()
    }

    pub fn wait_until_state(&self, target: ServerState) {
        let mut inner = self.shared.inner.lock().unwrap();
        *inner.state_waiters.entry(target).or_insert(0) += 1;
        while inner.state != target {
            inner = self.shared.cond.wait(inner).unwrap();
        }
        if let Some(count) = inner.state_waiters.get_mut(&target) {
            *count -= 1;
        }
        self.shared.cond.notify_all();
    }

    pub fn waiters_for(&self, target: ServerState) -> u32 {
        *self
            .shared
            .inner
            .lock()
            .unwrap()
            .state_waiters
            .get(&target)
            .unwrap_or(&0)
    }

    pub fn pause(&self) -> Result<Seqno, Fatal> {
        let mut inner = self.shared.inner.lock().unwrap();
        match self.shared.provider.pause() {
            Ok(seqno) => {
                inner.pause_count += 1;
                inner.pause_seqno = Some(seqno);
                Ok(seqno)
            }
            Err(_) => Err(Fatal::new("provider refused pause")),
        }
    }

    pub fn resume(&self) -> Result<(), Fatal> {
        let mut inner = self.shared.inner.lock().unwrap();
        if !self.shared.provider.resume().is_success() {
            return Err(Fatal::new("provider refused resume"));
        }
        inner.pause_count = inner.pause_count.saturating_sub(1);
        if inner.pause_count == 0 {
            inner.pause_seqno = None;
        }
        Ok(())
    }

    pub fn desync_and_pause(&self) -> Result<Seqno, Fatal> {
        if !self.shared.provider.desync().is_success() {
            return Err(Fatal::new("provider refused desync"));
        }
        let mut inner = self.shared.inner.lock().unwrap();
        inner.desync_count += 1;
        drop(inner);
        self.pause()
    }

    pub fn resume_and_resync(&self) -> Result<(), Fatal> {
        self.resume()?;
        if !self.shared.provider.resync().is_success() {
            return Err(Fatal::new("provider refused resync"));
        }
        let mut inner = self.shared.inner.lock().unwrap();
        inner.desync_count = inner.desync_count.saturating_sub(1);
        Ok(())
    }

    pub fn status(&self) -> Vec<(String, String)> {
        self.shared.provider.status()
    }

    pub fn log_message(&self, level: LogLevel, msg: &str) {
        self.shared.service.log_message(level, msg);
    }

    pub fn wait_committing_transactions(&self, timeout: Duration) -> Status {
        self.shared.service.wait_committing_transactions(timeout)
    }

    /// Inserts a new streaming applier; a duplicate key is a fatal
    /// programming error (a map-invariant violation).
    pub fn start_streaming_applier(
        &self,
        key: (ServerId, TransactionId),
        service: Box<dyn HighPriorityService>,
    ) -> Result<(), Fatal> {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.streaming_appliers.contains_key(&key) {
            return Err(Fatal::new(format!(
                "duplicate streaming applier insert for {:?}",
                key
            )));
        }
        inner.streaming_appliers.insert(key, service);
        Ok(())
    }

    pub fn has_streaming_applier(&self, key: (ServerId, TransactionId)) -> bool {
        self.shared.inner.lock().unwrap().streaming_appliers.contains_key(&key)
    }

    /// Runs `f` against the applier for `key` while holding the server
    /// lock, so the dispatcher can drive it without racing a
    /// concurrent `stop_streaming_applier`.
    pub fn with_streaming_applier<R>(
        &self,
        key: (ServerId, TransactionId),
        f: impl FnOnce(&mut dyn HighPriorityService) -> R,
    ) -> Option<R> {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.streaming_appliers.get_mut(&key).map(|svc| f(svc.as_mut()))
    }

    /// Removes the applier for `key`. A missing entry is logged as a
    /// warning, not an error: this can happen benignly on rapid
    /// membership changes racing the dispatcher.
    pub fn stop_streaming_applier(
        &self,
        key: (ServerId, TransactionId),
    ) -> Option<Box<dyn HighPriorityService>> {
        let removed = self.shared.inner.lock().unwrap().streaming_appliers.remove(&key);
        if removed.is_none() {
            tracing::warn!(target: "wsrep", origin = ?key.0, tx = ?key.1, "stop_streaming_applier: no such applier");
        }
        removed
    }

    pub fn release_high_priority_service(&self, svc: Box<dyn HighPriorityService>) {
        self.shared.service.release_high_priority_service(svc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockServerService};
    use test_log::test;
    use wsrep_base::ViewMember;
    use wsrep_base::ViewStatus;

    fn new_server() -> Server {
        Server::new(
            "s1",
            "/tmp",
            4,
            RollbackDiscipline::Sync,
            true,
            Arc::new(MockProvider::new()),
            Arc::new(MockServerService::new()),
        )
    }

    #[test]
    fn init_before_sst_ordering() {
        let s = new_server();
        s.begin_initializing().unwrap();
        s.finish_initializing().unwrap();
        assert_eq!(s.state(), ServerState::Initialized);
        s.on_connect(Gtid::UNDEFINED).unwrap();
        assert_eq!(s.state(), ServerState::Connected);
        let member = ViewMember::new(wsrep_base::ServerId::from_bytes(b"s1").unwrap(), "s1", "a");
        let view = View::new(Gtid::UNDEFINED, 1, ViewStatus::Primary, 0, 0, 4, vec![member.clone(), member]);
        s.on_view(view).unwrap();
        assert_eq!(s.state(), ServerState::Joiner);
        s.set_state(ServerState::Joined).unwrap();
        s.on_sync().unwrap();
        assert_eq!(s.state(), ServerState::Synced);
    }

    #[test]
    fn sst_before_init_ordering() {
        let s = new_server();
        s.on_connect(Gtid::UNDEFINED).unwrap();
        assert_eq!(s.state(), ServerState::Connected);
        let member = ViewMember::new(wsrep_base::ServerId::from_bytes(b"s1").unwrap(), "s1", "a");
        let view = View::new(Gtid::UNDEFINED, 1, ViewStatus::Primary, 0, 0, 4, vec![member.clone(), member]);
        s.on_view(view).unwrap();
        assert_eq!(s.state(), ServerState::Joiner);
        s.begin_initializing().unwrap();
        s.finish_initializing().unwrap();
        assert_eq!(s.state(), ServerState::Joined);
        s.on_sync().unwrap();
        assert_eq!(s.state(), ServerState::Synced);
    }

    #[test]
    fn streaming_applier_duplicate_insert_is_fatal() {
        let s = new_server();
        let key = (wsrep_base::ServerId::from_bytes(b"s2").unwrap(), TransactionId::new(1));
        s.start_streaming_applier(key, Box::new(crate::mock::MockHighPriorityService::new()))
            .unwrap();
        assert!(s
            .start_streaming_applier(key, Box::new(crate::mock::MockHighPriorityService::new()))
            .is_err());
        assert!(s.has_streaming_applier(key));
        let removed = s.stop_streaming_applier(key);
        assert!(removed.is_some());
        assert!(!s.has_streaming_applier(key));
    }

    #[test]
    fn final_view_disconnects() {
        let s = new_server();
        s.on_connect(Gtid::UNDEFINED).unwrap();
        let member = ViewMember::new(wsrep_base::ServerId::from_bytes(b"s1").unwrap(), "s1", "a");
        s.on_view(View::new(Gtid::UNDEFINED, 1, ViewStatus::Primary, 0, 0, 4, vec![member])).unwrap();
        let final_view = View::new(Gtid::UNDEFINED, 2, ViewStatus::NonPrimary, 0, -1, 4, vec![]);
        s.on_view(final_view).unwrap();
        assert_eq!(s.state(), ServerState::Disconnected);
    }
}
