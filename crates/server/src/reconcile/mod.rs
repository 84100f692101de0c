//! The reconciliation engine: the scheduled-message dispatch loop and the
//! guild/channel directory sync.

pub mod dispatch;
pub mod retry;
pub mod sync;

pub use dispatch::{DispatchHandle, Dispatcher, TickReport};
pub use retry::RetryPolicy;
pub use sync::{SyncOptions, SyncScope, SyncSummary, Synchronizer};
