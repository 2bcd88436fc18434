// Mock implementations of the five external-collaborator traits,
// mirroring the source's `mock_provider`/`fake_client_context` style:
// enough behavior to drive the state machines through their happy and
// unhappy paths in tests, with a few inspectable counters so tests can
// assert on what the core actually called.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use wsrep_base::{ClientId, Gtid, Seqno, ServerId, TransactionId, View, WsFlags, WsHandle, WsMeta};

use crate::traits::{ClientService, HighPriorityService, LogLevel, Provider, ServerService, Status, StorageService};

pub struct MockProvider {
    certify_result: Mutex<Status>,
    certify_count: AtomicU64,
    rollback_count: AtomicU64,
    next_seqno: AtomicI64,
}

impl MockProvider {
    pub fn new() -> Self {
        MockProvider {
            certify_result: Mutex::new(Status::Success),
            certify_count: AtomicU64::new(0),
            rollback_count: AtomicU64::new(0),
            next_seqno: AtomicI64::new(1),
        }
    }

    pub fn set_certify_result(&self, status: Status) {
        *self.certify_result.lock().unwrap() = status;
    }

    pub fn certify_count(&self) -> u64 {
        self.certify_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> u64 {
        self.rollback_count.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MockProvider {
    fn connect(&self, _cluster_address: &str, _bootstrap: bool) -> Status {
        Status::Success
    }

    fn disconnect(&self) -> Status {
        Status::Success
    }

    fn run_applier(&self) -> Status {
        Status::Success
    }

    fn start_transaction(&self, handle: &mut WsHandle) -> Status {
        handle.set_opaque(1);
        Status::Success
    }

    fn append_key(&self, _handle: &mut WsHandle, _key: &[u8]) -> Status {
        Status::Success
    }

    fn append_data(&self, _handle: &mut WsHandle, _data: &[u8]) -> Status {
        Status::Success
    }

    fn certify(
        &self,
        _client_id: ClientId,
        _handle: &mut WsHandle,
        _flags: WsFlags,
        meta: &mut WsMeta,
    ) -> Status {
        self.certify_count.fetch_add(1, Ordering::SeqCst);
        let status = *self.certify_result.lock().unwrap();
        if status.is_success() {
            let seqno = self.next_seqno.fetch_add(1, Ordering::SeqCst);
            meta.set_gtid(Gtid::new(ServerId::UNDEFINED, Seqno::new(seqno)));
        }
        status
    }

    fn bf_abort(&self, _bf_seqno: Seqno, _victim: TransactionId, victim_seqno: &mut Seqno) -> Status {
        *victim_seqno = Seqno::UNDEFINED;
        Status::Success
    }

    fn rollback(&self, _tx: TransactionId) -> Status {
        self.rollback_count.fetch_add(1, Ordering::SeqCst);
        Status::Success
    }

    fn commit_order_enter(&self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn commit_order_leave(&self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn release(&self, _handle: &mut WsHandle) -> Status {
        Status::Success
    }

    fn replay(&self, _handle: &WsHandle, _hps: &mut dyn HighPriorityService) -> Status {
        Status::Success
    }

    fn sst_sent(&self, _gtid: Gtid, _error: i32) -> Status {
        Status::Success
    }

    fn sst_received(&self, _gtid: Gtid, _error: i32) -> Status {
        Status::Success
    }

    fn status(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn pause(&self) -> Result<Seqno, Status> {
        Ok(Seqno::UNDEFINED)
    }

    fn resume(&self) -> Status {
        Status::Success
    }

    fn desync(&self) -> Status {
        Status::Success
    }

    fn resync(&self) -> Status {
        Status::Success
    }
}

pub struct MockServerService;

impl MockServerService {
    pub fn new() -> Self {
        MockServerService
    }
}

impl Default for MockServerService {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerService for MockServerService {
    fn storage_service(&self) -> Box<dyn StorageService> {
        Box::new(MockStorageService::new())
    }

    fn release_storage_service(&self, _svc: Box<dyn StorageService>) {}

    fn streaming_applier_service_from_client(&self) -> Box<dyn HighPriorityService> {
        Box::new(MockHighPriorityService::new())
    }

    fn streaming_applier_service_from_high_priority(&self) -> Box<dyn HighPriorityService> {
        Box::new(MockHighPriorityService::new())
    }

    fn release_high_priority_service(&self, _svc: Box<dyn HighPriorityService>) {}

    fn background_rollback(&self, _client_id: ClientId) {}

    fn bootstrap(&self) {}

    fn log_message(&self, _level: LogLevel, _msg: &str) {}

    fn log_dummy_write_set(&self, _meta: &WsMeta) {}

    fn log_view(&self, _view: &View) {}

    fn log_state_change(&self, _prev: &str, _cur: &str) {}

    fn sst_before_init(&self) -> bool {
        false
    }

    fn sst_request(&self) -> String {
        String::new()
    }

    fn start_sst(&self, _request: &str, _gtid: Gtid, _bypass: bool) -> Status {
        Status::Success
    }

    fn wait_committing_transactions(&self, _timeout: std::time::Duration) -> Status {
        Status::Success
    }

    fn debug_sync(&self, _point: &str) {}
}

pub struct MockClientService;

impl MockClientService {
    pub fn new() -> Self {
        MockClientService
    }
}

impl Default for MockClientService {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientService for MockClientService {
    fn do_2pc(&self) -> bool {
        false
    }

    fn is_autocommit(&self) -> bool {
        false
    }

    fn interrupted(&self) -> bool {
        false
    }

    fn store_globals(&self) {}

    fn reset_globals(&self) {}

    fn prepare_data_for_replication(&self, _handle: &mut WsHandle) -> Status {
        Status::Success
    }

    fn cleanup_transaction(&self) {}

    fn statement_allowed_for_streaming(&self) -> bool {
        true
    }

    fn bytes_generated(&self) -> u64 {
        0
    }

    fn prepare_fragment_for_replication(&self, buf: &mut Vec<u8>) -> Status {
        buf.extend_from_slice(b"fragment");
        Status::Success
    }

    fn remove_fragments(&self) -> Status {
        Status::Success
    }

    fn commit(&self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn rollback(&self) -> Status {
        Status::Success
    }

    fn emergency_shutdown(&self) {
        tracing::error!(target: "wsrep", "mock emergency shutdown invoked");
    }

    fn will_replay(&self) -> bool {
        false
    }

    fn replay(&self, _handle: &WsHandle, _hps: &mut dyn HighPriorityService) -> Status {
        Status::Success
    }

    fn wait_for_replayers(&self) {}

    fn append_fragment(&self, _tx: TransactionId, _flags: WsFlags, _buf: &[u8]) -> Status {
        Status::Success
    }

    fn debug_sync(&self, _point: &str) {}

    fn debug_crash(&self, _point: &str) {}
}

pub struct MockHighPriorityService {
    adopted: Option<TransactionId>,
}

impl MockHighPriorityService {
    pub fn new() -> Self {
        MockHighPriorityService { adopted: None }
    }
}

impl Default for MockHighPriorityService {
    fn default() -> Self {
        Self::new()
    }
}

impl HighPriorityService for MockHighPriorityService {
    fn start_transaction(&mut self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn adopt_transaction(&mut self, tx_id: TransactionId) {
        self.adopted = Some(tx_id);
    }

    fn apply_write_set(&mut self, _meta: &WsMeta, _data: &[u8]) -> Status {
        Status::Success
    }

    fn append_fragment(&mut self, _meta: &WsMeta, _data: &[u8]) -> Status {
        Status::Success
    }

    fn commit(&mut self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn rollback(&mut self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn remove_fragments(&mut self, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn apply_toi(&mut self, _meta: &WsMeta, _data: &[u8]) -> Status {
        Status::Success
    }

    fn after_apply(&mut self) {}

    fn store_globals(&mut self) {}

    fn reset_globals(&mut self) {}

    fn switch_execution_context(&mut self, _origin: &dyn HighPriorityService) {}

    fn log_dummy_write_set(&mut self, _meta: &WsMeta) {}

    fn is_replaying(&self) -> bool {
        false
    }

    fn must_exit(&self) -> bool {
        false
    }
}

pub struct MockStorageService;

impl MockStorageService {
    pub fn new() -> Self {
        MockStorageService
    }
}

impl Default for MockStorageService {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageService for MockStorageService {
    fn start_transaction(&mut self, _handle: &mut WsHandle) -> Status {
        Status::Success
    }

    fn append_fragment(
        &mut self,
        _server_id: ServerId,
        _tx: TransactionId,
        _flags: WsFlags,
        _buf: &[u8],
    ) -> Status {
        Status::Success
    }

    fn update_fragment_meta(&mut self, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn commit(&mut self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn rollback(&mut self, _handle: &WsHandle, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn store_globals(&mut self) {}

    fn reset_globals(&mut self) {}
}
