use crate::gtid::{Gtid, Stid};
use crate::id::{Seqno, TransactionId};

/// Bit positions fixed for wire compatibility with the provider.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct WsFlags(u8);

impl WsFlags {
    pub const START_TRANSACTION: WsFlags = WsFlags(1 << 0);
    pub const COMMIT: WsFlags = WsFlags(1 << 1);
    pub const ROLLBACK: WsFlags = WsFlags(1 << 2);
    pub const ISOLATION: WsFlags = WsFlags(1 << 3);
    pub const PA_UNSAFE: WsFlags = WsFlags(1 << 4);
    pub const COMMUTATIVE: WsFlags = WsFlags(1 << 5);
    pub const NATIVE: WsFlags = WsFlags(1 << 6);
    pub const SNAPSHOT: WsFlags = WsFlags(1 << 7);

    pub const EMPTY: WsFlags = WsFlags(0);

    pub fn contains(&self, flag: WsFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn insert(&mut self, flag: WsFlags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: WsFlags) {
        self.0 &= !flag.0;
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        WsFlags(bits)
    }
}

impl std::ops::BitOr for WsFlags {
    type Output = WsFlags;
    fn bitor(self, rhs: WsFlags) -> WsFlags {
        WsFlags(self.0 | rhs.0)
    }
}

/// A write-set handle: the transaction id plus the opaque token the
/// provider assigns the first time the write set is registered. The
/// token must be carried verbatim to every later provider call.
#[derive(Clone, Copy, Debug)]
pub struct WsHandle {
    transaction: TransactionId,
    opaque: u64,
}

impl WsHandle {
    pub fn new(transaction: TransactionId) -> Self {
        WsHandle {
            transaction,
            opaque: 0,
        }
    }

    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }

    pub fn opaque(&self) -> Option<u64> {
        if self.opaque == 0 {
            None
        } else {
            Some(self.opaque)
        }
    }

    /// Set by the provider when the write set is first registered.
    pub fn set_opaque(&mut self, token: u64) {
        self.opaque = token;
    }
}

/// Metadata describing one write set's position and shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsMeta {
    gtid: Gtid,
    stid: Stid,
    depends_on: Seqno,
    flags: WsFlags,
}

impl WsMeta {
    pub fn new(gtid: Gtid, stid: Stid, depends_on: Seqno, flags: WsFlags) -> Self {
        WsMeta {
            gtid,
            stid,
            depends_on,
            flags,
        }
    }

    pub fn gtid(&self) -> Gtid {
        self.gtid
    }

    pub fn set_gtid(&mut self, gtid: Gtid) {
        self.gtid = gtid;
    }

    pub fn seqno(&self) -> Seqno {
        self.gtid.seqno()
    }

    pub fn stid(&self) -> Stid {
        self.stid
    }

    pub fn depends_on(&self) -> Seqno {
        self.depends_on
    }

    pub fn flags(&self) -> WsFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut WsFlags {
        &mut self.flags
    }
}

impl Default for Gtid {
    fn default() -> Self {
        Gtid::UNDEFINED
    }
}

impl Default for Stid {
    fn default() -> Self {
        Stid::new(
            crate::id::ServerId::UNDEFINED,
            TransactionId::INVALID,
            crate::id::ClientId::UNDEFINED,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn flags_insert_and_contains() {
        let mut flags = WsFlags::EMPTY;
        assert!(!flags.contains(WsFlags::COMMIT));
        flags.insert(WsFlags::START_TRANSACTION);
        flags.insert(WsFlags::COMMIT);
        assert!(flags.contains(WsFlags::START_TRANSACTION));
        assert!(flags.contains(WsFlags::COMMIT));
        assert!(!flags.contains(WsFlags::ROLLBACK));
        flags.remove(WsFlags::START_TRANSACTION);
        assert!(!flags.contains(WsFlags::START_TRANSACTION));
    }

    #[test]
    fn bit_positions_are_fixed() {
        assert_eq!(WsFlags::START_TRANSACTION.bits(), 1);
        assert_eq!(WsFlags::COMMIT.bits(), 2);
        assert_eq!(WsFlags::ROLLBACK.bits(), 4);
        assert_eq!(WsFlags::ISOLATION.bits(), 8);
        assert_eq!(WsFlags::PA_UNSAFE.bits(), 16);
        assert_eq!(WsFlags::COMMUTATIVE.bits(), 32);
        assert_eq!(WsFlags::NATIVE.bits(), 64);
        assert_eq!(WsFlags::SNAPSHOT.bits(), 128);
    }

    #[test]
    fn ws_handle_opaque_unset_until_provider_sets_it() {
        let mut h = WsHandle::new(TransactionId::new(1));
        assert!(h.opaque().is_none());
        h.set_opaque(42);
        assert_eq!(h.opaque(), Some(42));
    }
}
