use crate::id::{ClientId, Seqno, ServerId, TransactionId};

/// A position in the global order: (server, seqno). Undefined iff the
/// seqno is undefined, regardless of the server id.
#[derive(Clone, Copy, Debug)]
pub struct Gtid {
    server: ServerId,
    seqno: Seqno,
}

impl Gtid {
    pub const UNDEFINED: Gtid = Gtid {
        server: ServerId::UNDEFINED,
        seqno: Seqno::UNDEFINED,
    };

    pub fn new(server: ServerId, seqno: Seqno) -> Self {
        Gtid { server, seqno }
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    pub fn is_undefined(&self) -> bool {
        self.seqno.is_undefined()
    }
}

impl std::fmt::Display for Gtid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.server, self.seqno)
    }
}

/// Identifies the originator of a write set across the cluster: the
/// server that ran it, its local transaction id there, and the client
/// connection that drove it.
#[derive(Clone, Copy, Debug)]
pub struct Stid {
    server: ServerId,
    transaction: TransactionId,
    client: ClientId,
}

impl Stid {
    pub fn new(server: ServerId, transaction: TransactionId, client: ClientId) -> Self {
        Stid {
            server,
            transaction,
            client,
        }
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }

    pub fn client(&self) -> ClientId {
        self.client
    }
}

impl std::fmt::Display for Stid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.server, self.transaction, self.client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn gtid_undefined_ignores_server() {
        let g = Gtid::new(
            ServerId::from_bytes(b"s1").unwrap(),
            Seqno::UNDEFINED,
        );
        assert!(g.is_undefined());
    }

    #[test]
    fn gtid_defined_once_seqno_set() {
        let g = Gtid::new(ServerId::from_bytes(b"s1").unwrap(), Seqno::new(4));
        assert!(!g.is_undefined());
    }
}
