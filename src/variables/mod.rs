mod convert;
mod inspector;
mod types;
mod watches;

pub use inspector::VariableInspector;
pub use types::{Value, GLOBAL_DENY_LIST};
pub use watches::{WatchEntry, WatchList};
