mod client;
mod dispatch;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod server;
mod streaming;
mod traits;
mod transaction;

pub use client::{
    AfterStatementResult, Client, ClientContextSwitch, ClientState, HighPriorityContext, Mode,
    ToiMode,
};
pub use dispatch::{Dispatcher, DispatchError, ErrorVotingHook, NoopErrorVotingHook};
pub use error::{override_error, ClientError, Fatal};
pub use server::{RollbackDiscipline, Server, ServerState};
pub use streaming::{FragmentUnit, StreamingContext};
pub use traits::{
    ClientService, HighPriorityService, LogLevel, Provider, ServerService, Status, StorageService,
};
pub use transaction::{Transaction, TxState};
