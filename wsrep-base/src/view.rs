use crate::gtid::Gtid;
use crate::id::ServerId;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ViewStatus {
    Primary,
    NonPrimary,
    Disconnected,
}

#[derive(Clone, Debug)]
pub struct ViewMember {
    id: ServerId,
    name: String,
    incoming_address: String,
}

impl ViewMember {
    pub fn new(id: ServerId, name: impl Into<String>, incoming_address: impl Into<String>) -> Self {
        ViewMember {
            id,
            name: name.into(),
            incoming_address: incoming_address.into(),
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn incoming_address(&self) -> &str {
        &self.incoming_address
    }
}

/// A membership view delivered by the provider. `own_index = -1` means
/// this server is not (or no longer) a member of `members`.
#[derive(Clone, Debug)]
pub struct View {
    state_gtid: Gtid,
    view_seqno: i64,
    status: ViewStatus,
    capabilities: u32,
    own_index: i32,
    protocol_version: i32,
    members: Vec<ViewMember>,
}

impl View {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state_gtid: Gtid,
        view_seqno: i64,
        status: ViewStatus,
        capabilities: u32,
        own_index: i32,
        protocol_version: i32,
        members: Vec<ViewMember>,
    ) -> Self {
        View {
            state_gtid,
            view_seqno,
            status,
            capabilities,
            own_index,
            protocol_version,
            members,
        }
    }

    pub fn state_gtid(&self) -> Gtid {
        self.state_gtid
    }

    pub fn view_seqno(&self) -> i64 {
        self.view_seqno
    }

    pub fn status(&self) -> ViewStatus {
        self.status
    }

    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }

    pub fn own_index(&self) -> i32 {
        self.own_index
    }

    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    pub fn members(&self) -> &[ViewMember] {
        &self.members
    }

    /// A final view: no members, and this server is not among them.
    /// Delivered once when the provider is shutting down membership.
    pub fn is_final(&self) -> bool {
        self.members.is_empty() && self.own_index == -1
    }

    pub fn is_primary(&self) -> bool {
        self.status == ViewStatus::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn empty_view(status: ViewStatus, own_index: i32, members: Vec<ViewMember>) -> View {
        View::new(Gtid::UNDEFINED, 0, status, 0, own_index, 4, members)
    }

    #[test]
    fn final_view_has_no_members_and_no_index() {
        let v = empty_view(ViewStatus::NonPrimary, -1, vec![]);
        assert!(v.is_final());
    }

    #[test]
    fn non_final_view_with_members() {
        let m = ViewMember::new(ServerId::from_bytes(b"s1").unwrap(), "s1", "127.0.0.1:4567");
        let v = empty_view(ViewStatus::Primary, 0, vec![m]);
        assert!(!v.is_final());
        assert!(v.is_primary());
    }
}
