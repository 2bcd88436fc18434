// The high-priority apply dispatcher (C6): routes one incoming,
// commit-ordered write set to TOI execution, a fresh or existing
// per-origin streaming applier, or a one-shot 1PC applier, against the
// server's streaming-applier map (see server.rs).

use wsrep_base::{ServerId, TransactionId, WsFlags, WsHandle, WsMeta};

use crate::error::Fatal;
use crate::server::Server;
use crate::traits::{HighPriorityService, Status};

#[derive(Debug)]
pub enum DispatchError {
    NotImplemented,
    Fatal(Fatal),
}

impl From<Fatal> for DispatchError {
    fn from(f: Fatal) -> Self {
        DispatchError::Fatal(f)
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::NotImplemented => write!(f, "dispatch: not implemented"),
            DispatchError::Fatal(e) => write!(f, "dispatch: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Extension point for TOI apply failures: the
/// source has no error-voting layer, so failures are just recorded
/// here rather than rolling back commit order.
pub trait ErrorVotingHook: Send + Sync {
    fn on_toi_apply_error(&self, meta: &WsMeta, status: Status);
}

pub struct NoopErrorVotingHook;

impl ErrorVotingHook for NoopErrorVotingHook {
    fn on_toi_apply_error(&self, _meta: &WsMeta, _status: Status) {}
}

pub struct Dispatcher {
    server: Server,
    error_voting: Box<dyn ErrorVotingHook>,
}

impl Dispatcher {
    pub fn new(server: Server) -> Self {
        Dispatcher {
            server,
            error_voting: Box::new(NoopErrorVotingHook),
        }
    }

    pub fn with_error_voting_hook(server: Server, hook: Box<dyn ErrorVotingHook>) -> Self {
        Dispatcher {
            server,
            error_voting: hook,
        }
    }

    pub fn dispatch(
        &self,
        origin: ServerId,
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), DispatchError> {
        let flags = meta.flags();
        if flags.contains(WsFlags::ISOLATION) {
            return self.dispatch_toi(handle, meta, data, dispatching);
        }
        if flags.contains(WsFlags::COMMUTATIVE) || flags.contains(WsFlags::NATIVE) {
            return Err(DispatchError::NotImplemented);
        }
        self.dispatch_regular(origin, handle, meta, data, dispatching)
    }

    fn dispatch_toi(
        &self,
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), DispatchError> {
        self.server.provider().commit_order_enter(handle, meta);
        let status = dispatching.apply_toi(meta, data);
        if !status.is_success() {
            self.error_voting.on_toi_apply_error(meta, status);
        }
        self.server.provider().commit_order_leave(handle, meta);
        dispatching.after_apply();
        Ok(())
    }

    fn dispatch_regular(
        &self,
        origin: ServerId,
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), DispatchError> {
        let flags = meta.flags();
        let start = flags.contains(WsFlags::START_TRANSACTION);
        let commit = flags.contains(WsFlags::COMMIT);
        let rollback = flags.contains(WsFlags::ROLLBACK);
        let key = (origin, handle.transaction());

        self.server.provider().commit_order_enter(handle, meta);

        if start && commit && rollback {
            self.server.service().log_dummy_write_set(meta);
        } else if start && commit {
            dispatching.start_transaction(handle, meta);
            let status = dispatching.apply_write_set(meta, data);
            if status.is_success() {
                dispatching.commit(handle, meta);
            } else {
                dispatching.rollback(handle, meta);
            }
            dispatching.after_apply();
        } else if start {
            self.first_fragment(key, handle, meta, data, dispatching)?;
        } else if !commit && !rollback {
            self.continuation_fragment(key, handle, meta, data, dispatching)?;
        } else if commit {
            self.final_fragment(key, handle, meta, data, dispatching)?;
        } else {
            self.rollback_fragment(key, handle, meta, dispatching)?;
        }

        self.server.provider().commit_order_leave(handle, meta);
        Ok(())
    }

    fn first_fragment(
        &self,
        key: (ServerId, TransactionId),
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), Fatal> {
        let mut streaming = self.server.service().streaming_applier_service_from_high_priority();
        streaming.start_transaction(handle, meta);
        self.server.start_streaming_applier(key, streaming)?;
        self.apply_on_streaming_and_log(key, handle, meta, data, dispatching);
        Ok(())
    }

    fn continuation_fragment(
        &self,
        key: (ServerId, TransactionId),
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), Fatal> {
        if !self.server.has_streaming_applier(key) {
            tracing::warn!(target: "wsrep", origin = ?key.0, tx = ?key.1, "continuation fragment: no streaming applier");
            self.server.service().log_dummy_write_set(meta);
            return Ok(());
        }
        self.apply_on_streaming_and_log(key, handle, meta, data, dispatching);
        Ok(())
    }

    fn apply_on_streaming_and_log(
        &self,
        key: (ServerId, TransactionId),
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) {
        let status = self.server.with_streaming_applier(key, |svc| {
            svc.store_globals();
            let status = svc.apply_write_set(meta, data);
            svc.reset_globals();
            status
        });
        if !matches!(status, Some(s) if s.is_success()) {
            tracing::warn!(target: "wsrep", origin = ?key.0, tx = ?key.1, "streaming fragment apply failed or applier missing");
        }
        dispatching.append_fragment(meta, data);
        dispatching.commit(handle, meta);
    }

    fn final_fragment(
        &self,
        key: (ServerId, TransactionId),
        handle: &WsHandle,
        meta: &WsMeta,
        data: &[u8],
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), Fatal> {
        if dispatching.is_replaying() {
            dispatching.apply_write_set(meta, data);
            dispatching.commit(handle, meta);
            dispatching.after_apply();
            return Ok(());
        }
        let applied = self.server.with_streaming_applier(key, |svc| {
            svc.store_globals();
            svc.apply_write_set(meta, data);
            svc.commit(handle, meta);
            svc.reset_globals();
        });
        if applied.is_none() {
            tracing::warn!(target: "wsrep", origin = ?key.0, tx = ?key.1, "final fragment: no streaming applier");
            self.server.service().log_dummy_write_set(meta);
        }
        if let Some(svc) = self.server.stop_streaming_applier(key) {
            self.server.release_high_priority_service(svc);
        }
        dispatching.after_apply();
        Ok(())
    }

    fn rollback_fragment(
        &self,
        key: (ServerId, TransactionId),
        handle: &WsHandle,
        meta: &WsMeta,
        dispatching: &mut dyn HighPriorityService,
    ) -> Result<(), Fatal> {
        dispatching.adopt_transaction(key.1);
        let found = self.server.with_streaming_applier(key, |svc| {
            svc.rollback(handle, meta);
        });
        if found.is_none() {
            tracing::warn!(target: "wsrep", origin = ?key.0, tx = ?key.1, "rollback fragment: no streaming applier");
            self.server.service().log_dummy_write_set(meta);
        }
        if let Some(svc) = self.server.stop_streaming_applier(key) {
            self.server.release_high_priority_service(svc);
        }
        dispatching.remove_fragments(meta);
        dispatching.commit(handle, meta);
        dispatching.after_apply();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHighPriorityService, MockProvider, MockServerService};
    use crate::server::RollbackDiscipline;
    use std::sync::Arc;
    use test_log::test;
    use wsrep_base::{ClientId, Gtid, Seqno, Stid};

    fn new_server() -> Server {
        Server::new(
            "s1",
            "/tmp",
            4,
            RollbackDiscipline::Async,
            false,
            Arc::new(MockProvider::new()),
            Arc::new(MockServerService::new()),
        )
    }

    fn meta(origin: ServerId, tx: TransactionId, seqno: i64, flags: WsFlags) -> WsMeta {
        WsMeta::new(
            Gtid::new(origin, Seqno::new(seqno)),
            Stid::new(origin, tx, ClientId::new(1)),
            Seqno::UNDEFINED,
            flags,
        )
    }

    #[test]
    fn routes_three_fragment_cross_server_transaction() {
        let server = new_server();
        let dispatcher = Dispatcher::new(server.clone());
        let origin = ServerId::from_bytes(b"s2").unwrap();
        let tx = TransactionId::new(42);
        let mut dispatching = MockHighPriorityService::new();

        let handle = WsHandle::new(tx);
        let first = meta(origin, tx, 1, WsFlags::START_TRANSACTION);
        dispatcher.dispatch(origin, &handle, &first, b"a", &mut dispatching).unwrap();
        assert!(server.has_streaming_applier((origin, tx)));

        let second = meta(origin, tx, 2, WsFlags::EMPTY);
        dispatcher.dispatch(origin, &handle, &second, b"b", &mut dispatching).unwrap();
        assert!(server.has_streaming_applier((origin, tx)));

        let third = meta(origin, tx, 3, WsFlags::COMMIT);
        dispatcher.dispatch(origin, &handle, &third, b"c", &mut dispatching).unwrap();
        assert!(!server.has_streaming_applier((origin, tx)));
    }

    #[test]
    fn commutative_write_set_is_not_implemented() {
        let server = new_server();
        let dispatcher = Dispatcher::new(server);
        let origin = ServerId::from_bytes(b"s2").unwrap();
        let tx = TransactionId::new(1);
        let handle = WsHandle::new(tx);
        let m = meta(origin, tx, 1, WsFlags::COMMUTATIVE);
        let mut dispatching = MockHighPriorityService::new();
        assert!(matches!(
            dispatcher.dispatch(origin, &handle, &m, b"", &mut dispatching),
            Err(DispatchError::NotImplemented)
        ));
    }

    #[test]
    fn full_1pc_write_set_applies_and_commits() {
        let server = new_server();
        let dispatcher = Dispatcher::new(server);
        let origin = ServerId::from_bytes(b"s3").unwrap();
        let tx = TransactionId::new(7);
        let handle = WsHandle::new(tx);
        let m = meta(origin, tx, 1, WsFlags::START_TRANSACTION | WsFlags::COMMIT);
        let mut dispatching = MockHighPriorityService::new();
        dispatcher.dispatch(origin, &handle, &m, b"data", &mut dispatching).unwrap();
    }

    #[test]
    fn missing_streaming_applier_on_rollback_logs_dummy() {
        let server = new_server();
        let dispatcher = Dispatcher::new(server);
        let origin = ServerId::from_bytes(b"s4").unwrap();
        let tx = TransactionId::new(9);
        let handle = WsHandle::new(tx);
        let m = meta(origin, tx, 1, WsFlags::ROLLBACK);
        let mut dispatching = MockHighPriorityService::new();
        dispatcher.dispatch(origin, &handle, &m, b"", &mut dispatching).unwrap();
    }
}
