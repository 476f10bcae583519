//! User selection: current category and filter, per-filter flags, and the
//! settings store they persist to.

pub mod state;
pub mod store;

pub use state::{SelectionEvent, SelectionState, MAX_RATING};
pub use store::{JsonFileStore, MemoryStore, SettingsStore};
