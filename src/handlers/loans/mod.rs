pub mod sync;
pub mod utils;

// Re-export handler functions for use in routing
pub use sync::auto as sync_auto;
pub use sync::manual as sync_manual;
pub use sync::preview as sync_preview;
pub use sync::SESSION_HEADER;
