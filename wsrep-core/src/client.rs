// The client state machine (C4) and the command/statement envelope
// that drives the owned `Transaction` (C3) through its lifecycle,
// including the BF-abort and replay protocol (C7) and the streaming
// fragment policy. One `Client` per DBMS connection.

use std::sync::{Condvar, Mutex, MutexGuard};

use wsrep_base::{Seqno, TransactionId, WsFlags};

use crate::error::{override_error, ClientError, Fatal};
use crate::server::{RollbackDiscipline, Server};
use crate::streaming::FragmentUnit;
use crate::traits::{ClientService, Status};
use crate::transaction::{Transaction, TxState};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Mode {
    Local,
    Replicating,
    HighPriority,
    Toi,
    Nbo,
    Rsu,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ClientState {
    Idle,
    Exec,
    Result,
    Quitting,
}

impl ClientState {
    fn index(self) -> usize {
        match self {
            ClientState::Idle => 0,
            ClientState::Exec => 1,
            ClientState::Result => 2,
            ClientState::Quitting => 3,
        }
    }
}

#[rustfmt::skip]
const CLIENT_ALLOWED: [[bool; 4]; 4] = [
    // idle   exec   result quitting
    [false, true,  false, true ], // idle
    [true,  false, true,  false], // exec
    [true,  false, false, true ], // result
    [false, false, false, false], // quitting
];

fn client_state_allowed(from: ClientState, to: ClientState) -> bool {
    CLIENT_ALLOWED[from.index()][to.index()]
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum AfterStatementResult {
    Success,
    Error,
    MayRetry,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum RollbackCause {
    Voluntary,
    BfAbort,
}

struct ClientInner {
    mode: Mode,
    state: ClientState,
    current_error: ClientError,
    debug_level: i32,
    transaction: Transaction,
    replays: u64,
}

pub struct Client {
    id: wsrep_base::ClientId,
    server: Server,
    client_service: Box<dyn ClientService>,
    inner: Mutex<ClientInner>,
    cond: Condvar,
}

impl Client {
    pub fn new(
        id: wsrep_base::ClientId,
        server: Server,
        client_service: Box<dyn ClientService>,
        mode: Mode,
    ) -> Self {
        Client {
            id,
            server,
            client_service,
            inner: Mutex::new(ClientInner {
                mode,
                state: ClientState::Idle,
                current_error: ClientError::Success,
                debug_level: 0,
                transaction: Transaction::new(),
                replays: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn id(&self) -> wsrep_base::ClientId {
        self.id
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn mode(&self) -> Mode {
        self.inner.lock().unwrap().mode
    }

    pub fn set_mode(&self, mode: Mode) {
        self.inner.lock().unwrap().mode = mode;
    }

    pub fn client_state(&self) -> ClientState {
        self.inner.lock().unwrap().state
    }

    pub fn current_error(&self) -> ClientError {
        self.inner.lock().unwrap().current_error
    }

    pub fn transaction_state(&self) -> TxState {
        self.inner.lock().unwrap().transaction.state()
    }

    pub fn transaction_active(&self) -> bool {
        self.inner.lock().unwrap().transaction.is_active()
    }

    pub fn replays(&self) -> u64 {
        self.inner.lock().unwrap().replays
    }

    pub fn debug_level(&self) -> i32 {
        self.inner.lock().unwrap().debug_level
    }

    pub fn set_debug_level(&self, level: i32) {
        self.inner.lock().unwrap().debug_level = level;
    }

    fn set_client_state(
        &self,
        inner: &mut ClientInner,
        to: ClientState,
    ) -> Result<(), Fatal> {
        if !client_state_allowed(inner.state, to) {
            return Err(Fatal::illegal_transition("client", inner.state, to));
        }
        inner.state = to;
        Ok(())
    }

    // ---- scoped context guards ----

    pub fn enter_high_priority(&self) -> HighPriorityContext<'_> {
        let previous = self.mode();
        self.set_mode(Mode::HighPriority);
        HighPriorityContext {
            client: self,
            previous,
        }
    }

    pub fn enter_toi(&self) -> ToiMode<'_> {
        let previous = self.mode();
        self.set_mode(Mode::Toi);
        ToiMode {
            client: self,
            previous,
        }
    }

    pub fn switch_context(&self) -> ClientContextSwitch<'_> {
        self.client_service.store_globals();
        ClientContextSwitch { client: self }
    }

    // ---- C3 lifecycle, driven from the client envelope ----

    pub fn start_transaction(&self, id: TransactionId) {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.start(id);
        self.server.provider().start_transaction(inner.transaction.handle_mut());
    }

    pub fn append_key(&self, key: &[u8]) -> Result<(), Fatal> {
        let mut inner = self.inner.lock().unwrap();
        if inner.transaction.state() != TxState::Executing {
            return Err(Fatal::new("append_key is only legal while executing"));
        }
        self.server.provider().append_key(inner.transaction.handle_mut(), key);
        Ok(())
    }

    pub fn append_data(&self, data: &[u8]) -> Result<(), Fatal> {
        let mut inner = self.inner.lock().unwrap();
        if inner.transaction.state() != TxState::Executing {
            return Err(Fatal::new("append_data is only legal while executing"));
        }
        self.server.provider().append_data(inner.transaction.handle_mut(), data);
        Ok(())
    }

    /// Adopts an applier's externally-assigned metadata, bypassing the
    /// certify path entirely (high-priority mode).
    pub fn adopt_applied_transaction(&self, handle: wsrep_base::WsHandle, meta: wsrep_base::WsMeta) {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.start(handle.transaction());
        *inner.transaction.handle_mut() = handle;
        *inner.transaction.meta_mut() = meta;
        inner.transaction.set_certified(true);
    }

    pub fn before_prepare(&self) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        if inner.transaction.transition(TxState::Preparing).is_err() {
            return 1;
        }
        if !inner.transaction.streaming().stored_seqnos().is_empty() {
            self.client_service.debug_crash("before_fragment_removal");
            self.client_service.remove_fragments();
            self.client_service.debug_crash("after_fragment_removal");
        }
        0
    }

    pub fn after_prepare(&self) -> i32 {
        self.certify_commit()
    }

    fn certify_commit(&self) -> i32 {
        self.client_service.wait_for_replayers();
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.flags_mut().insert(WsFlags::COMMIT);
        self.client_service
            .prepare_data_for_replication(inner.transaction.handle_mut());
        if self.client_service.interrupted() {
            override_error(&mut inner.current_error, ClientError::InterruptedError);
            inner.transaction.transition(TxState::MustAbort).ok();
            return 1;
        }
        if inner.transaction.state() == TxState::Preparing {
            inner
                .transaction
                .transition(TxState::Certifying)
                .expect("preparing -> certifying is always allowed");
        }
        let flags = inner.transaction.flags();
        let mut handle = *inner.transaction.handle();
        let mut meta = *inner.transaction.meta();
        drop(inner);

        let status = self.server.provider().certify(self.id, &mut handle, flags, &mut meta);

        let mut inner = self.inner.lock().unwrap();
        *inner.transaction.handle_mut() = handle;
        if status.is_success() {
            *inner.transaction.meta_mut() = meta;
        }
        self.map_certify_status(&mut inner, status);
        if inner.transaction.state() == TxState::Committing {
            0
        } else {
            1
        }
    }

    fn map_certify_status(&self, inner: &mut ClientInner, status: Status) {
        use Status::*;
        match status {
            Success => {
                if inner.transaction.state() == TxState::Certifying {
                    inner.transaction.transition(TxState::Committing).ok();
                    inner.transaction.set_certified(true);
                } else if inner.transaction.state() == TxState::MustAbort {
                    inner.transaction.transition(TxState::MustReplay).ok();
                }
            }
            ErrorBfAbort => {
                if inner.transaction.state() != TxState::MustAbort {
                    inner.transaction.transition(TxState::MustAbort).ok();
                }
                inner.transaction.transition(TxState::MustReplay).ok();
            }
            ErrorCertificationFailed => {
                inner.transaction.transition(TxState::CertFailed).ok();
                override_error(&mut inner.current_error, ClientError::DeadlockError);
            }
            ErrorFatal => {
                if inner.transaction.state() != TxState::MustAbort {
                    inner.transaction.transition(TxState::MustAbort).ok();
                }
                override_error(&mut inner.current_error, ClientError::ErrorDuringCommit);
                self.client_service.emergency_shutdown();
            }
            ErrorWarning | ErrorTransactionMissing | ErrorSizeExceeded | ErrorConnectionFailed
            | ErrorProviderFailed | ErrorNotImplemented | ErrorNotAllowed | ErrorUnknown => {
                if inner.transaction.state() != TxState::MustAbort {
                    inner.transaction.transition(TxState::MustAbort).ok();
                }
                override_error(&mut inner.current_error, ClientError::ErrorDuringCommit);
            }
        }
    }

    pub fn before_commit(&self) -> i32 {
        {
            let inner = self.inner.lock().unwrap();
            if matches!(inner.transaction.state(), TxState::MustAbort | TxState::Aborting) {
                return 1;
            }
        }
        if !self.client_service.do_2pc() {
            if self.before_prepare() != 0 {
                return 1;
            }
            if self.after_prepare() != 0 {
                return 1;
            }
        }
        let (handle, meta) = {
            let inner = self.inner.lock().unwrap();
            if inner.transaction.state() != TxState::Committing {
                return 1;
            }
            (*inner.transaction.handle(), *inner.transaction.meta())
        };
        let status = self.server.provider().commit_order_enter(&handle, &meta);
        let mut inner = self.inner.lock().unwrap();
        match status {
            Status::Success => 0,
            Status::ErrorBfAbort => {
                if inner.transaction.state() != TxState::MustAbort {
                    inner.transaction.transition(TxState::MustAbort).ok();
                }
                inner.transaction.transition(TxState::MustReplay).ok();
                1
            }
            other => {
                tracing::error!(target: "wsrep", status = ?other, "commit_order_enter returned an unexpected status");
                self.client_service.emergency_shutdown();
                1
            }
        }
    }

    pub fn ordered_commit(&self) -> i32 {
        let (handle, meta) = {
            let inner = self.inner.lock().unwrap();
            (*inner.transaction.handle(), *inner.transaction.meta())
        };
        self.server.provider().commit_order_leave(&handle, &meta);
        let mut inner = self.inner.lock().unwrap();
        match inner.transaction.transition(TxState::OrderedCommit) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }

    pub fn after_commit(&self) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        if inner.transaction.streaming().is_enabled() || inner.transaction.streaming().fragments() > 0 {
            inner.transaction.streaming_mut().cleanup();
        }
        let mut handle = *inner.transaction.handle();
        let gtid = inner.transaction.meta().gtid();
        drop(inner);

        self.server.provider().release(&mut handle);
        self.server.note_committed(gtid);

        let mut inner = self.inner.lock().unwrap();
        *inner.transaction.handle_mut() = handle;
        match inner.transaction.transition(TxState::Committed) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }

    /// Voluntary rollback, e.g. a DBMS-issued `ROLLBACK` statement.
    pub fn rollback(&self) -> AfterStatementResult {
        self.drive_rollback(RollbackCause::Voluntary)
    }

    pub fn after_statement(&self) -> AfterStatementResult {
        let state = self.inner.lock().unwrap().transaction.state();
        let result = match state {
            TxState::MustAbort | TxState::CertFailed => self.drive_rollback(RollbackCause::BfAbort),
            TxState::MustReplay => self.do_replay(),
            _ => {
                let mut inner = self.inner.lock().unwrap();
                if inner.transaction.state().is_terminal() {
                    inner.transaction.cleanup();
                }
                AfterStatementResult::Success
            }
        };
        if result == AfterStatementResult::Error && self.client_service.is_autocommit() {
            AfterStatementResult::MayRetry
        } else {
            result
        }
    }

    fn drive_rollback(&self, cause: RollbackCause) -> AfterStatementResult {
        let mut inner = self.inner.lock().unwrap();
        match inner.transaction.state() {
            TxState::Executing | TxState::CertFailed => {
                inner.transaction.transition(TxState::Aborting).ok();
            }
            TxState::MustAbort if inner.transaction.certified() => {
                inner.transaction.transition(TxState::MustReplay).ok();
            }
            TxState::MustAbort => {
                inner.transaction.transition(TxState::Aborting).ok();
            }
            _ => {}
        }

        if inner.transaction.state() == TxState::MustReplay {
            drop(inner);
            let result = self.do_replay();
            self.cond.notify_all();
            return result;
        }

        let tx_id = inner.transaction.id();
        let streaming_active = inner.transaction.streaming().is_enabled()
            || !inner.transaction.streaming().stored_seqnos().is_empty();
        if streaming_active {
            self.run_streaming_rollback(&mut inner, tx_id);
        }

        self.server.provider().rollback(tx_id);
        self.client_service.rollback();
        inner.transaction.transition(TxState::Aborted).ok();
        if cause == RollbackCause::BfAbort {
            override_error(&mut inner.current_error, ClientError::DeadlockError);
        }
        let result = if inner.current_error.is_success() {
            AfterStatementResult::Success
        } else {
            AfterStatementResult::Error
        };
        inner.transaction.cleanup();
        self.cond.notify_all();
        result
    }

    fn run_streaming_rollback(&self, inner: &mut MutexGuard<'_, ClientInner>, tx_id: TransactionId) {
        let server_id = self.server.id();
        let mut hps = self.server.service().streaming_applier_service_from_client();
        hps.adopt_transaction(tx_id);
        if self
            .server
            .start_streaming_applier((server_id, tx_id), hps)
            .is_err()
        {
            tracing::error!(target: "wsrep", tx = ?tx_id, "duplicate streaming applier on rollback");
        }
        inner.transaction.streaming_mut().rolled_back(tx_id);
        inner.transaction.streaming_mut().cleanup();
    }

    fn do_replay(&self) -> AfterStatementResult {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transaction.state() == TxState::MustReplay {
                inner.transaction.transition(TxState::Replaying).ok();
            }
        }
        let mut hps = self.server.service().streaming_applier_service_from_client();
        let handle = {
            let inner = self.inner.lock().unwrap();
            *inner.transaction.handle()
        };
        let status = self.client_service.replay(&handle, hps.as_mut());
        self.server.release_high_priority_service(hps);

        let mut inner = self.inner.lock().unwrap();
        inner.replays += 1;
        match status {
            Status::Success => {
                inner.transaction.transition(TxState::Committing).ok();
                inner.transaction.transition(TxState::OrderedCommit).ok();
                inner.transaction.transition(TxState::Committed).ok();
                let mut handle = handle;
                drop(inner);
                self.server.provider().release(&mut handle);
                let mut inner = self.inner.lock().unwrap();
                inner.transaction.cleanup();
                AfterStatementResult::Success
            }
            Status::ErrorCertificationFailed => {
                override_error(&mut inner.current_error, ClientError::DeadlockError);
                inner.transaction.transition(TxState::Aborted).ok();
                inner.transaction.cleanup();
                AfterStatementResult::Error
            }
            other => {
                tracing::error!(target: "wsrep", status = ?other, "transaction replay failed unexpectedly");
                self.client_service.emergency_shutdown();
                AfterStatementResult::Error
            }
        }
    }

    // ---- C7: BF-abort entry point ----

    /// Preempts a locally-executing transaction. The caller (the
    /// dispatcher or provider callback) is understood to be acting on
    /// behalf of a higher-priority ordered write set; this method is
    /// the single serialization point, internally taking the client
    /// mutex for its whole body (see design notes on cyclic refs).
    pub fn bf_abort(&self, bf_seqno: Seqno) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.transaction.is_active() {
            return false;
        }
        let victim_seqno_known = !inner.transaction.meta().seqno().is_undefined();
        if victim_seqno_known && !inner.transaction.meta().seqno().lt(&bf_seqno) {
            return false;
        }
        if !matches!(
            inner.transaction.state(),
            TxState::Executing | TxState::Preparing | TxState::Certifying | TxState::Committing
        ) {
            return false;
        }

        let tx_id = inner.transaction.id();
        let mut victim_seqno = Seqno::UNDEFINED;
        let status = self.server.provider().bf_abort(bf_seqno, tx_id, &mut victim_seqno);
        if !status.is_success() {
            return false;
        }

        inner.transaction.snapshot_for_bf_abort();
        inner.transaction.transition(TxState::MustAbort).ok();

        let idle_at_dbms = inner.state == ClientState::Idle;
        let sync_mode = self.server.rollback_discipline() == RollbackDiscipline::Sync;
        if idle_at_dbms && sync_mode {
            inner.transaction.transition(TxState::Aborting).ok();
            let client_id = self.id;
            drop(inner);
            self.server.service().background_rollback(client_id);
        }
        true
    }

    // ---- C4: command/statement envelope ----

    pub fn before_command(&self) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        if self.server.rollback_discipline() == RollbackDiscipline::Sync {
            while inner.transaction.state() == TxState::Aborting {
                inner = self.cond.wait(inner).unwrap();
            }
        }
        self.set_client_state(&mut inner, ClientState::Exec).ok();
        match inner.transaction.state() {
            TxState::MustAbort => {
                override_error(&mut inner.current_error, ClientError::DeadlockError);
                drop(inner);
                self.drive_rollback(RollbackCause::BfAbort);
                1
            }
            TxState::Aborted => {
                override_error(&mut inner.current_error, ClientError::DeadlockError);
                inner.transaction.cleanup();
                1
            }
            _ => 0,
        }
    }

    pub fn before_statement(&self) -> i32 {
        let inner = self.inner.lock().unwrap();
        if inner.transaction.state() == TxState::MustAbort {
            1
        } else {
            0
        }
    }

    pub fn after_command_before_result(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.transaction.state() == TxState::MustAbort {
            drop(inner);
            self.drive_rollback(RollbackCause::BfAbort);
            inner = self.inner.lock().unwrap();
        }
        self.set_client_state(&mut inner, ClientState::Result).ok();
    }

    pub fn after_command_after_result(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.transaction.state() == TxState::MustAbort {
            drop(inner);
            self.drive_rollback(RollbackCause::BfAbort);
            inner = self.inner.lock().unwrap();
        } else if !inner.transaction.is_active() {
            inner.current_error = ClientError::Success;
        }
        self.set_client_state(&mut inner, ClientState::Idle).ok();
    }

    pub fn quit(&self) {
        let mut inner = self.inner.lock().unwrap();
        let target = ClientState::Quitting;
        let _ = self.set_client_state(&mut inner, target);
    }

    // ---- streaming fragment policy ----

    pub fn enable_streaming(&self, unit: FragmentUnit, size: u64) -> wsrep_base::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.mode != Mode::Replicating {
            return Err(wsrep_base::err("enable_streaming is only legal in replicating mode"));
        }
        if let Some(current) = inner.transaction.streaming().unit() {
            if inner.transaction.is_active() && current != unit {
                return Err(wsrep_base::err(
                    "fragment unit cannot change while a transaction is active",
                ));
            }
        }
        inner.transaction.streaming_mut().enable(unit, size);
        Ok(())
    }

    pub fn after_row(&self) -> Result<i32, Fatal> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transaction.streaming().unit() != Some(FragmentUnit::Row) {
                return Ok(0);
            }
            inner.transaction.streaming_mut().increment_unit_counter(1);
            let due = inner.transaction.streaming().unit_counter() >= inner.transaction.streaming().size();
            if !due {
                return Ok(0);
            }
            inner.transaction.streaming_mut().reset_unit_counter();
        }
        self.certify_fragment()
    }

    pub fn after_statement_streaming_check(&self) -> Result<i32, Fatal> {
        let due = {
            let inner = self.inner.lock().unwrap();
            inner.transaction.streaming().unit() == Some(FragmentUnit::Statement)
        };
        if due {
            self.certify_fragment()
        } else {
            Ok(0)
        }
    }

    pub fn maybe_certify_byte_fragment(&self) -> Result<i32, Fatal> {
        let due = {
            let inner = self.inner.lock().unwrap();
            inner.transaction.streaming().unit() == Some(FragmentUnit::Bytes)
                && self.client_service.bytes_generated()
                    >= inner.transaction.streaming().bytes_certified() + inner.transaction.streaming().size()
        };
        if due {
            self.certify_fragment()
        } else {
            Ok(0)
        }
    }

    fn certify_fragment(&self) -> Result<i32, Fatal> {
        if !self.client_service.statement_allowed_for_streaming() {
            return Ok(0);
        }
        let mut buf = Vec::new();
        if !self.client_service.prepare_fragment_for_replication(&mut buf).is_success() {
            let mut inner = self.inner.lock().unwrap();
            override_error(&mut inner.current_error, ClientError::AppendFragmentError);
            inner.transaction.transition(TxState::MustAbort).ok();
            return Ok(1);
        }

        let mut storage = self.server.service().storage_service();
        let (mut handle, flags, tx_id, server_id) = {
            let inner = self.inner.lock().unwrap();
            (
                *inner.transaction.handle(),
                inner.transaction.flags(),
                inner.transaction.id(),
                self.server.id(),
            )
        };
        storage.start_transaction(&mut handle);
        storage.append_fragment(server_id, tx_id, flags, &buf);
        self.client_service.append_fragment(tx_id, flags, &buf);

        let mut meta = {
            let inner = self.inner.lock().unwrap();
            *inner.transaction.meta()
        };
        let status = self.server.provider().certify(self.id, &mut handle, flags, &mut meta);

        let mut inner = self.inner.lock().unwrap();
        *inner.transaction.handle_mut() = handle;
        if status.is_success() {
            let seqno = meta.seqno();
            *inner.transaction.meta_mut() = meta;
            inner.transaction.streaming_mut().stored(seqno)?;
            inner.transaction.streaming_mut().certified(buf.len() as u64);
            inner.transaction.flags_mut().remove(WsFlags::START_TRANSACTION);
            storage.update_fragment_meta(&meta);
            storage.commit(&handle, &meta);
            self.server.service().release_storage_service(storage);
            Ok(0)
        } else {
            inner.transaction.transition(TxState::MustAbort).ok();
            storage.rollback(&handle, &meta);
            self.server.service().release_storage_service(storage);
            Ok(1)
        }
    }
}

pub struct HighPriorityContext<'a> {
    client: &'a Client,
    previous: Mode,
}

impl<'a> Drop for HighPriorityContext<'a> {
    fn drop(&mut self) {
        self.client.set_mode(self.previous);
    }
}

pub struct ToiMode<'a> {
    client: &'a Client,
    previous: Mode,
}

impl<'a> Drop for ToiMode<'a> {
    fn drop(&mut self) {
        self.client.set_mode(self.previous);
    }
}

pub struct ClientContextSwitch<'a> {
    client: &'a Client,
}

impl<'a> Drop for ClientContextSwitch<'a> {
    fn drop(&mut self) {
        self.client.client_service.reset_globals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClientService, MockProvider, MockServerService};
    use crate::server::RollbackDiscipline;
    use std::sync::Arc;
    use test_log::test;
    use wsrep_base::ClientId;

    fn new_client(provider: Arc<MockProvider>) -> Client {
        let server = Server::new(
            "s1",
            "/tmp",
            4,
            RollbackDiscipline::Sync,
            false,
            provider,
            Arc::new(MockServerService::new()),
        );
        Client::new(
            ClientId::new(1),
            server,
            Box::new(MockClientService::new()),
            Mode::Replicating,
        )
    }

    #[test]
    fn scenario_1pc_success() {
        let provider = Arc::new(MockProvider::new());
        let client = new_client(provider.clone());
        client.start_transaction(TransactionId::new(1));
        assert_eq!(client.before_commit(), 0);
        assert_eq!(client.ordered_commit(), 0);
        assert_eq!(client.after_commit(), 0);
        assert_eq!(client.after_statement(), AfterStatementResult::Success);
        assert_eq!(provider.certify_count(), 1);
        assert_eq!(client.current_error(), ClientError::Success);
    }

    #[test]
    fn scenario_bf_abort_before_certify() {
        let provider = Arc::new(MockProvider::new());
        let client = new_client(provider);
        client.start_transaction(TransactionId::new(1));
        assert_eq!(client.before_command(), 0);
        assert!(client.bf_abort(Seqno::new(1)));
        assert_eq!(client.transaction_state(), TxState::MustAbort);
        assert_eq!(client.before_commit(), 1);
        assert_eq!(client.after_statement(), AfterStatementResult::Error);
        assert_eq!(client.current_error(), ClientError::DeadlockError);
    }

    #[test]
    fn scenario_bf_abort_after_certify_replays() {
        let provider = Arc::new(MockProvider::new());
        provider.set_certify_result(Status::ErrorBfAbort);
        let client = new_client(provider);
        client.start_transaction(TransactionId::new(1));
        assert_eq!(client.before_commit(), 1);
        assert_eq!(client.transaction_state(), TxState::MustReplay);
        assert_eq!(client.after_statement(), AfterStatementResult::Success);
        assert_eq!(client.replays(), 1);
        assert_eq!(client.current_error(), ClientError::Success);
    }

    #[test]
    fn scenario_streaming_by_rows() {
        let provider = Arc::new(MockProvider::new());
        let client = new_client(provider.clone());
        client.enable_streaming(FragmentUnit::Row, 1).unwrap();
        client.start_transaction(TransactionId::new(1));
        assert_eq!(client.after_row().unwrap(), 0);
        assert_eq!(client.after_row().unwrap(), 0);
        assert_eq!(client.before_commit(), 0);
        assert_eq!(client.ordered_commit(), 0);
        assert_eq!(client.after_commit(), 0);
        assert_eq!(provider.certify_count(), 3);
    }

    #[test]
    fn scenario_streaming_rollback() {
        let provider = Arc::new(MockProvider::new());
        let client = new_client(provider.clone());
        client.enable_streaming(FragmentUnit::Row, 1).unwrap();
        client.start_transaction(TransactionId::new(1));
        assert_eq!(client.after_row().unwrap(), 0);
        assert_eq!(client.rollback(), AfterStatementResult::Success);
        assert_eq!(client.transaction_state(), TxState::Executing);
        assert_eq!(client.current_error(), ClientError::Success);
        assert_eq!(provider.rollback_count(), 1);
    }

    #[test]
    fn bf_abort_on_terminal_transaction_is_noop() {
        let provider = Arc::new(MockProvider::new());
        let client = new_client(provider);
        assert!(!client.bf_abort(Seqno::new(5)));
    }
}
