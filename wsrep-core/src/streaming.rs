// Per-transaction streaming-replication bookkeeping: fragment boundary
// policy, the seqnos of fragments already certified and stored, and
// the counters the after-row / after-statement hooks drive.

use wsrep_base::{Seqno, TransactionId};

use crate::error::Fatal;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum FragmentUnit {
    Bytes,
    Row,
    Statement,
}

#[derive(Debug, Default)]
pub struct StreamingContext {
    unit: Option<FragmentUnit>,
    size: u64,
    fragments_certified: u64,
    stored_seqnos: Vec<Seqno>,
    rollback_replicated_for: Option<TransactionId>,
    unit_counter: u64,
    bytes_certified: u64,
}

impl StreamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(&self) -> Option<FragmentUnit> {
        self.unit
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_enabled(&self) -> bool {
        self.unit.is_some()
    }

    /// Enabling with size 0 is equivalent to disabling. Changing the
    /// unit while a transaction is active is the caller's
    /// responsibility to forbid (see `Transaction::enable_streaming`);
    /// this type has no notion of "active" on its own.
    pub fn enable(&mut self, unit: FragmentUnit, size: u64) {
        if size == 0 {
            self.disable();
            return;
        }
        self.unit = Some(unit);
        self.size = size;
    }

    pub fn disable(&mut self) {
        self.unit = None;
        self.size = 0;
    }

    pub fn certified(&mut self, bytes: u64) {
        self.bytes_certified += bytes;
        self.fragments_certified += 1;
    }

    pub fn stored(&mut self, seqno: Seqno) -> Result<(), Fatal> {
        if let Some(last) = self.stored_seqnos.last() {
            if !seqno.gt(last) {
                return Err(Fatal::new(format!(
                    "fragment seqnos must strictly increase: {last} then {seqno}"
                )));
            }
        }
        self.stored_seqnos.push(seqno);
        Ok(())
    }

    pub fn applied(&mut self, seqno: Seqno) -> Result<(), Fatal> {
        self.stored(seqno)
    }

    pub fn rolled_back(&mut self, tx_id: TransactionId) {
        self.rollback_replicated_for = Some(tx_id);
    }

    pub fn is_streaming_rollback_in_flight(&self) -> bool {
        self.rollback_replicated_for.is_some()
    }

    pub fn unit_counter(&self) -> u64 {
        self.unit_counter
    }

    pub fn increment_unit_counter(&mut self, n: u64) {
        self.unit_counter += n;
    }

    pub fn reset_unit_counter(&mut self) {
        self.unit_counter = 0;
    }

    pub fn bytes_certified(&self) -> u64 {
        self.bytes_certified
    }

    pub fn fragments(&self) -> u64 {
        self.fragments_certified
    }

    pub fn stored_seqnos(&self) -> &[Seqno] {
        &self.stored_seqnos
    }

    /// Resets every counter and empties the stored-seqno list, used
    /// both after commit and after voluntary rollback cleanup. Also
    /// clears the enabled unit/size: streaming must be re-enabled per
    /// transaction, matching the round-trip property that enabling,
    /// disabling, and re-enabling on a fresh transaction reproduces
    /// the same fragment boundaries.
    pub fn cleanup(&mut self) {
        *self = StreamingContext::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn enable_with_zero_size_disables() {
        let mut ctx = StreamingContext::new();
        ctx.enable(FragmentUnit::Row, 0);
        assert!(!ctx.is_enabled());
    }

    #[test]
    fn stored_seqnos_must_strictly_increase() {
        let mut ctx = StreamingContext::new();
        ctx.stored(Seqno::new(1)).unwrap();
        ctx.stored(Seqno::new(2)).unwrap();
        assert!(ctx.stored(Seqno::new(2)).is_err());
        assert!(ctx.stored(Seqno::new(1)).is_err());
    }

    #[test]
    fn cleanup_resets_to_fresh() {
        let mut ctx = StreamingContext::new();
        ctx.enable(FragmentUnit::Row, 1);
        ctx.stored(Seqno::new(1)).unwrap();
        ctx.certified(10);
        ctx.increment_unit_counter(1);
        ctx.cleanup();
        assert!(!ctx.is_enabled());
        assert_eq!(ctx.fragments(), 0);
        assert_eq!(ctx.unit_counter(), 0);
        assert!(ctx.stored_seqnos().is_empty());
    }

    #[test]
    fn enable_disable_reenable_round_trips() {
        let mut a = StreamingContext::new();
        a.enable(FragmentUnit::Row, 3);
        a.disable();
        a.enable(FragmentUnit::Row, 3);
        let mut b = StreamingContext::new();
        b.enable(FragmentUnit::Row, 3);
        assert_eq!(a.unit(), b.unit());
        assert_eq!(a.size(), b.size());
    }
}
