//! Data access: request gating, result caching and the record codecs.
//!
//! ```text
//! caller ──► DataService ──► ResultCache (fresh?) ──► RequestGate ──► RecordStore
//!                 ▲                                                      │
//!                 └──────────── records::decode ◄────────────────────────┘
//! ```

pub mod cache;
pub mod gate;
pub mod records;
pub mod seed;
mod service;

pub use cache::{CacheKey, EntityKind, Generation, ResultCache};
pub use gate::RequestGate;
pub use seed::SeedOutcome;
pub use service::{DEFAULT_CHAT_LIMIT, DataService};
