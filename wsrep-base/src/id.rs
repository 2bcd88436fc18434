// Identifier value types: server id, client id, transaction id, seqno.
//
// These carry no invariants beyond size limits; construction either
// succeeds outright or fails with `Error` (never panics), matching the
// "constructor-only validation" discipline of the crate's error design.

use uuid::Uuid;

use crate::error::{err, Error};

/// A 16-byte cluster member identifier.
///
/// Constructed either from a canonical 36-character UUID string, or
/// from up to 16 raw ASCII bytes (zero-padded on the right). The
/// all-zero value is the distinguished "undefined" id.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ServerId([u8; 16]);

impl ServerId {
    pub const UNDEFINED: ServerId = ServerId([0u8; 16]);

    pub fn from_uuid_str(s: &str) -> Result<Self, Error> {
        let uuid = Uuid::parse_str(s).map_err(Error::new)?;
        Ok(ServerId(*uuid.as_bytes()))
    }

    /// Accepts up to 16 raw bytes, zero-padded. Longer input is rejected.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() > 16 {
            return Err(err(format!(
                "server id must be at most 16 bytes, got {}",
                raw.len()
            )));
        }
        let mut bytes = [0u8; 16];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(ServerId(bytes))
    }

    pub fn is_undefined(&self) -> bool {
        self.0 == [0u8; 16]
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// True when every byte up to the first NUL is printable ASCII and
    /// everything from that NUL onward is zero: the signature of a
    /// value built via `from_bytes` rather than `from_uuid_str`.
    fn looks_like_ascii(&self) -> bool {
        let nul = self.0.iter().position(|&b| b == 0).unwrap_or(16);
        self.0[..nul].iter().all(|&b| (0x20..=0x7e).contains(&b))
            && self.0[nul..].iter().all(|&b| b == 0)
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_undefined() {
            write!(f, "00000000-0000-0000-0000-000000000000")
        } else if self.looks_like_ascii() {
            let nul = self.0.iter().position(|&b| b == 0).unwrap_or(16);
            write!(f, "{}", std::str::from_utf8(&self.0[..nul]).unwrap())
        } else {
            write!(f, "{}", Uuid::from_bytes(self.0))
        }
    }
}

impl std::fmt::Debug for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServerId({})", self)
    }
}

/// Per-connection identifier, unique within one server.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ClientId(u64);

impl ClientId {
    pub const UNDEFINED: ClientId = ClientId(u64::MAX);

    pub fn new(id: u64) -> Self {
        ClientId(id)
    }

    pub fn is_undefined(&self) -> bool {
        self.0 == u64::MAX
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local, per-server transaction identifier.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TransactionId(u64);

impl TransactionId {
    pub const INVALID: TransactionId = TransactionId(u64::MAX);

    pub fn new(id: u64) -> Self {
        TransactionId(id)
    }

    pub fn is_invalid(&self) -> bool {
        self.0 == u64::MAX
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position in the global commit order for one server.
///
/// Deliberately does not implement `PartialEq`/`Eq`: callers must test
/// [`Seqno::is_undefined`] rather than compare two seqnos for equality,
/// since "equal but both undefined" and "equal and both ordered" are
/// different facts to a caller and conflating them invites bugs. Only
/// `<`/`>` (via [`Seqno::lt`]/[`Seqno::gt`]) are exposed.
#[derive(Clone, Copy, Debug)]
pub struct Seqno(i64);

impl Seqno {
    pub const UNDEFINED: Seqno = Seqno(0);

    /// Panics in debug builds on a negative value; callers constructing
    /// seqnos from provider output are expected to have validated sign
    /// already, this is a last-ditch internal check, not API surface.
    pub fn new(value: i64) -> Self {
        debug_assert!(value >= 0, "seqno must be non-negative");
        Seqno(value)
    }

    pub fn is_undefined(&self) -> bool {
        self.0 == 0
    }

    pub fn lt(&self, other: &Seqno) -> bool {
        self.0 < other.0
    }

    pub fn gt(&self, other: &Seqno) -> bool {
        self.0 > other.0
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Seqno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Seqno {
    fn default() -> Self {
        Seqno::UNDEFINED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn server_id_roundtrips_uuid() {
        let id = ServerId::from_uuid_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn server_id_ascii_display() {
        let id = ServerId::from_bytes(b"node1").unwrap();
        assert_eq!(id.to_string(), "node1");
    }

    #[test]
    fn server_id_undefined() {
        assert!(ServerId::UNDEFINED.is_undefined());
        assert_eq!(
            ServerId::UNDEFINED.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn server_id_rejects_oversized_input() {
        let raw = [1u8; 17];
        assert!(ServerId::from_bytes(&raw).is_err());
    }

    #[test]
    fn client_id_undefined_is_all_ones() {
        assert!(ClientId::UNDEFINED.is_undefined());
        assert_eq!(ClientId::UNDEFINED.value(), u64::MAX);
    }

    #[test]
    fn transaction_id_invalid_is_all_ones() {
        assert!(TransactionId::INVALID.is_invalid());
    }

    #[test]
    fn seqno_ordering_without_equality() {
        let a = Seqno::new(3);
        let b = Seqno::new(5);
        assert!(a.lt(&b));
        assert!(b.gt(&a));
        assert!(Seqno::UNDEFINED.is_undefined());
        assert!(!a.is_undefined());
    }
}
