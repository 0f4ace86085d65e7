//! Query-time retrieval: multi-index fan-out over a shared catalog, merged
//! ranking, and conversation sessions with turn-scoped embedding caches.

pub mod fanout;
pub mod session;

pub use fanout::{merge, CombinedResults, FanOut, IndexWarning};
pub use session::{Engine, Session};
