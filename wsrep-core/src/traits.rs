// The five external collaborators, modeled as
// object-safe traits so the embedder can hand the core
// `Arc<dyn Provider>` / `Box<dyn ...Service>` values built however it
// likes. The core never downcasts these or assumes a concrete type.

use std::time::Duration;

use wsrep_base::{ClientId, Gtid, Seqno, TransactionId, WsFlags, WsHandle, WsMeta};

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Status {
    Success,
    ErrorWarning,
    ErrorTransactionMissing,
    ErrorCertificationFailed,
    ErrorBfAbort,
    ErrorSizeExceeded,
    ErrorConnectionFailed,
    ErrorProviderFailed,
    ErrorFatal,
    ErrorNotImplemented,
    ErrorNotAllowed,
    ErrorUnknown,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

/// The write-set replication provider (Galera-style). Consumed, never
/// implemented, by this crate outside of tests.
pub trait Provider: Send + Sync {
    fn connect(&self, cluster_address: &str, bootstrap: bool) -> Status;
    fn disconnect(&self) -> Status;
    fn run_applier(&self) -> Status;

    fn start_transaction(&self, handle: &mut WsHandle) -> Status;
    fn append_key(&self, handle: &mut WsHandle, key: &[u8]) -> Status;
    fn append_data(&self, handle: &mut WsHandle, data: &[u8]) -> Status;

    fn certify(
        &self,
        client_id: ClientId,
        handle: &mut WsHandle,
        flags: WsFlags,
        meta: &mut WsMeta,
    ) -> Status;

    fn bf_abort(&self, bf_seqno: Seqno, victim: TransactionId, victim_seqno: &mut Seqno) -> Status;
    fn rollback(&self, tx: TransactionId) -> Status;

    fn commit_order_enter(&self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn commit_order_leave(&self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn release(&self, handle: &mut WsHandle) -> Status;

    fn replay(&self, handle: &WsHandle, hps: &mut dyn HighPriorityService) -> Status;

    fn sst_sent(&self, gtid: Gtid, error: i32) -> Status;
    fn sst_received(&self, gtid: Gtid, error: i32) -> Status;

    fn status(&self) -> Vec<(String, String)>;

    fn pause(&self) -> Result<Seqno, Status>;
    fn resume(&self) -> Status;
    fn desync(&self) -> Status;
    fn resync(&self) -> Status;
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Services consumed by the `Server`: SST orchestration, streaming
/// applier provisioning, logging sinks the embedder wires up.
pub trait ServerService: Send + Sync {
    fn storage_service(&self) -> Box<dyn StorageService>;
    fn release_storage_service(&self, svc: Box<dyn StorageService>);

    fn streaming_applier_service_from_client(&self) -> Box<dyn HighPriorityService>;
    fn streaming_applier_service_from_high_priority(&self) -> Box<dyn HighPriorityService>;
    fn release_high_priority_service(&self, svc: Box<dyn HighPriorityService>);

    fn background_rollback(&self, client_id: ClientId);
    fn bootstrap(&self);

    fn log_message(&self, level: LogLevel, msg: &str);
    fn log_dummy_write_set(&self, meta: &WsMeta);
    fn log_view(&self, view: &wsrep_base::View);
    fn log_state_change(&self, prev: &str, cur: &str);

    fn sst_before_init(&self) -> bool;
    fn sst_request(&self) -> String;
    fn start_sst(&self, request: &str, gtid: Gtid, bypass: bool) -> Status;

    fn wait_committing_transactions(&self, timeout: Duration) -> Status;
    fn debug_sync(&self, point: &str);
}

/// Services consumed by the per-connection `Client`/`Transaction`.
pub trait ClientService: Send + Sync {
    fn do_2pc(&self) -> bool;
    fn is_autocommit(&self) -> bool;
    fn interrupted(&self) -> bool;

    fn store_globals(&self);
    fn reset_globals(&self);

    fn prepare_data_for_replication(&self, handle: &mut WsHandle) -> Status;
    fn cleanup_transaction(&self);

    fn statement_allowed_for_streaming(&self) -> bool;
    fn bytes_generated(&self) -> u64;
    fn prepare_fragment_for_replication(&self, buf: &mut Vec<u8>) -> Status;

    fn remove_fragments(&self) -> Status;
    fn commit(&self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn rollback(&self) -> Status;

    fn emergency_shutdown(&self);

    fn will_replay(&self) -> bool;
    fn replay(&self, handle: &WsHandle, hps: &mut dyn HighPriorityService) -> Status;
    fn wait_for_replayers(&self);

    fn append_fragment(&self, tx: TransactionId, flags: WsFlags, buf: &[u8]) -> Status;

    fn debug_sync(&self, point: &str);
    fn debug_crash(&self, point: &str);
}

/// Execution context for applying remote write sets: the dispatcher's
/// and replay's counterparty.
pub trait HighPriorityService: Send + Sync {
    fn start_transaction(&mut self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn adopt_transaction(&mut self, tx_id: TransactionId);

    fn apply_write_set(&mut self, meta: &WsMeta, data: &[u8]) -> Status;
    fn append_fragment(&mut self, meta: &WsMeta, data: &[u8]) -> Status;

    fn commit(&mut self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn rollback(&mut self, handle: &WsHandle, meta: &WsMeta) -> Status;

    /// Removes any fragments stored for this write set's transaction,
    /// so a rollback fragment's commit (see the dispatcher's rollback
    /// branch) durably records the rollback without leaving orphaned
    /// fragment storage behind.
    fn remove_fragments(&mut self, meta: &WsMeta) -> Status;

    fn apply_toi(&mut self, meta: &WsMeta, data: &[u8]) -> Status;
    fn after_apply(&mut self);

    fn store_globals(&mut self);
    fn reset_globals(&mut self);
    fn switch_execution_context(&mut self, origin: &dyn HighPriorityService);

    fn log_dummy_write_set(&mut self, meta: &WsMeta);

    fn is_replaying(&self) -> bool;
    fn must_exit(&self) -> bool;
}

/// Persists streaming fragments outside the main storage transaction.
pub trait StorageService: Send + Sync {
    fn start_transaction(&mut self, handle: &mut WsHandle) -> Status;
    fn append_fragment(
        &mut self,
        server_id: wsrep_base::ServerId,
        tx: TransactionId,
        flags: WsFlags,
        buf: &[u8],
    ) -> Status;
    fn update_fragment_meta(&mut self, meta: &WsMeta) -> Status;
    fn commit(&mut self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn rollback(&mut self, handle: &WsHandle, meta: &WsMeta) -> Status;
    fn store_globals(&mut self);
    fn reset_globals(&mut self);
}
