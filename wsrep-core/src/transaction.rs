// The transaction state machine (C3): the data and pure transition
// table. The orchestration that drives these transitions — calling
// into the provider and the DBMS-facing services — lives on `Client`
// (see client.rs), which owns the single `Transaction` instance of a
// connection. Keeping `Transaction` itself free of provider/service
// references follows the arena-and-handle guidance in the design
// notes: the transaction never outlives its client and is never
// independently shared.

use wsrep_base::{TransactionId, WsFlags, WsHandle, WsMeta};

use crate::error::Fatal;
use crate::streaming::StreamingContext;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum TxState {
    Executing,
    Preparing,
    Certifying,
    Committing,
    OrderedCommit,
    Committed,
    CertFailed,
    MustAbort,
    Aborting,
    Aborted,
    MustReplay,
    Replaying,
}

impl TxState {
    const COUNT: usize = 12;

    fn index(self) -> usize {
        match self {
            TxState::Executing => 0,
            TxState::Preparing => 1,
            TxState::Certifying => 2,
            TxState::Committing => 3,
            TxState::OrderedCommit => 4,
            TxState::Committed => 5,
            TxState::CertFailed => 6,
            TxState::MustAbort => 7,
            TxState::Aborting => 8,
            TxState::Aborted => 9,
            TxState::MustReplay => 10,
            TxState::Replaying => 11,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Committed | TxState::Aborted)
    }
}

// Row = current state, column = target state, in the order given by
// `TxState::index`.
#[rustfmt::skip]
const ALLOWED: [[bool; TxState::COUNT]; TxState::COUNT] = [
    // ex     pr     ce     co     oc     ct     cf     ma     ab     ad     mr     re
    [false, true,  true,  false, false, false, false, true,  true,  false, false, false], // executing
    [false, false, true,  false, false, false, false, true,  false, false, false, false], // preparing
    [true,  false, false, true,  false, false, true,  true,  false, false, false, false], // certifying
    [false, false, false, false, true,  true,  false, true,  false, false, false, false], // committing
    [false, false, false, false, false, true,  false, false, false, false, false, false], // ordered_commit
    [false, false, false, false, false, false, false, false, false, false, false, false], // committed
    [false, false, false, false, false, false, false, false, true,  false, false, false], // cert_failed
    [false, false, false, false, false, false, true,  false, true,  false, true,  false], // must_abort
    [false, false, false, false, false, false, false, false, false, true,  false, false], // aborting
    [false, false, false, false, false, false, false, false, false, false, false, false], // aborted
    [false, false, false, false, false, false, false, false, false, false, false, true ], // must_replay
    [false, true,  false, true,  false, false, false, false, false, true,  false, false], // replaying
];

fn is_allowed(from: TxState, to: TxState) -> bool {
    ALLOWED[from.index()][to.index()]
}

#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TxState,
    history: Vec<TxState>,
    bf_abort_state: Option<TxState>,
    handle: WsHandle,
    meta: WsMeta,
    flags: WsFlags,
    pa_unsafe: bool,
    certified: bool,
    streaming: StreamingContext,
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction {
            id: TransactionId::INVALID,
            state: TxState::Executing,
            history: Vec::new(),
            bf_abort_state: None,
            handle: WsHandle::new(TransactionId::INVALID),
            meta: WsMeta::default(),
            flags: WsFlags::EMPTY,
            pa_unsafe: false,
            certified: false,
            streaming: StreamingContext::new(),
        }
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.id.is_invalid()
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn history(&self) -> &[TxState] {
        &self.history
    }

    pub fn handle(&self) -> &WsHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut WsHandle {
        &mut self.handle
    }

    pub fn meta(&self) -> &WsMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut WsMeta {
        &mut self.meta
    }

    pub fn flags(&self) -> WsFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut WsFlags {
        &mut self.flags
    }

    pub fn pa_unsafe(&self) -> bool {
        self.pa_unsafe
    }

    pub fn set_pa_unsafe(&mut self, value: bool) {
        self.pa_unsafe = value;
    }

    pub fn certified(&self) -> bool {
        self.certified
    }

    pub fn set_certified(&mut self, value: bool) {
        self.certified = value;
    }

    pub fn streaming(&self) -> &StreamingContext {
        &self.streaming
    }

    pub fn streaming_mut(&mut self) -> &mut StreamingContext {
        &mut self.streaming
    }

    pub fn bf_abort_state(&self) -> Option<TxState> {
        self.bf_abort_state
    }

    /// Applies `to` if the move from the current state is in the
    /// allowed matrix; otherwise a fatal programming error.
    pub fn transition(&mut self, to: TxState) -> Result<(), Fatal> {
        if !is_allowed(self.state, to) {
            return Err(Fatal::illegal_transition("transaction", self.state, to));
        }
        self.history.push(self.state);
        tracing::debug!(target: "wsrep", from = ?self.state, to = ?to, "transaction state transition");
        self.state = to;
        Ok(())
    }

    /// Snapshots the current state before a BF-abort forces a move to
    /// `must_abort`, so a later decision can inspect "what was this
    /// transaction doing when it got hit".
    pub fn snapshot_for_bf_abort(&mut self) {
        self.bf_abort_state = Some(self.state);
    }

    /// Resets id, handle, meta, flags, `certified`, and `pa_unsafe` to
    /// fresh-transaction values. Called once a transaction settles
    /// into `committed` or `aborted`. State history is retained for
    /// diagnostics, matching the round-trip test's "modulo state
    /// history" carve-out.
    pub fn cleanup(&mut self) {
        let history = std::mem::take(&mut self.history);
        *self = Transaction {
            history,
            ..Transaction::default()
        };
    }

    pub fn start(&mut self, id: TransactionId) {
        debug_assert!(!self.is_active(), "transaction already active");
        self.id = id;
        self.state = TxState::Executing;
        self.handle = WsHandle::new(id);
        self.flags = WsFlags::START_TRANSACTION;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn fresh_transaction_starts_executing_and_inactive() {
        let tx = Transaction::new();
        assert_eq!(tx.state(), TxState::Executing);
        assert!(!tx.is_active());
    }

    #[test]
    fn allowed_transitions_succeed() {
        let mut tx = Transaction::new();
        tx.start(TransactionId::new(1));
        tx.transition(TxState::Preparing).unwrap();
        tx.transition(TxState::Certifying).unwrap();
        tx.transition(TxState::Committing).unwrap();
        tx.transition(TxState::OrderedCommit).unwrap();
        tx.transition(TxState::Committed).unwrap();
        assert_eq!(tx.state(), TxState::Committed);
        assert_eq!(tx.history().len(), 5);
    }

    #[test]
    fn disallowed_transition_is_fatal() {
        let mut tx = Transaction::new();
        tx.start(TransactionId::new(1));
        assert!(tx.transition(TxState::Committed).is_err());
    }

    #[test]
    fn cleanup_restores_fresh_values_but_keeps_history() {
        let mut tx = Transaction::new();
        tx.start(TransactionId::new(7));
        tx.set_certified(true);
        tx.transition(TxState::Preparing).unwrap();
        tx.transition(TxState::Certifying).unwrap();
        tx.transition(TxState::Executing).unwrap();
        tx.cleanup();
        assert!(!tx.is_active());
        assert!(!tx.certified());
        assert_eq!(tx.state(), TxState::Executing);
        assert!(!tx.history().is_empty());
    }

    #[test]
    fn must_abort_can_reach_must_replay_or_aborting() {
        let mut tx = Transaction::new();
        tx.start(TransactionId::new(1));
        tx.transition(TxState::MustAbort).unwrap();
        tx.transition(TxState::MustReplay).unwrap();
        tx.transition(TxState::Replaying).unwrap();
        tx.transition(TxState::Committing).unwrap();
        tx.transition(TxState::OrderedCommit).unwrap();
        tx.transition(TxState::Committed).unwrap();
        assert_eq!(tx.state(), TxState::Committed);
    }
}
