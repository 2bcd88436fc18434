mod error;
mod id;
mod gtid;
mod wsmeta;
mod view;

pub use error::{err, Error, Result};
pub use id::{ClientId, ServerId, TransactionId, Seqno};
pub use gtid::{Gtid, Stid};
pub use wsmeta::{WsFlags, WsHandle, WsMeta};
pub use view::{View, ViewMember, ViewStatus};
