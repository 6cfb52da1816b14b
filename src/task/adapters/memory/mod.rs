//! In-memory adapter implementations.
//!
//! These adapters are thread-safe and need no database. They back the
//! integration tests and suit embedding the engine where durability is not
//! required.

mod access;
mod directory;
mod history;
mod matcher;
mod router;
mod store;

pub use access::StaticCallerContext;
pub use directory::InMemoryDirectory;
pub use history::RecordingHistorySink;
pub use router::StaticRouter;
pub use store::InMemoryTaskStore;
