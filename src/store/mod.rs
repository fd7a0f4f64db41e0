//! Persistence for the recipient ledger.

pub mod json_file;
pub mod ledger;
pub mod memory;
pub mod traits;

pub use json_file::JsonFileStore;
pub use ledger::{RecipientLedger, normalize_address};
pub use memory::MemoryStore;
pub use traits::{LedgerDocument, LedgerStore, RecipientRecord};
