//! # Record Store
//!
//! Schema-scoped CRUD over records, with every mutation recorded in the
//! ledger.
//!
//! ```text
//! record.rs  Record
//! store.rs   RecordStore: define / create / update / query / mine
//! export.rs  Snapshot
//! error.rs   StoreError
//! ```

pub mod error;
pub mod export;
pub mod record;
#[allow(clippy::module_inception)]
pub mod store;

pub use error::{StoreError, StoreResult};
pub use export::{LedgerSnapshot, Snapshot};
pub use record::Record;
pub use store::{RecordStore, StoreInfo};
