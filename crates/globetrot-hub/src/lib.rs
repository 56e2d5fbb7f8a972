//! # globetrot-hub
//!
//! In-memory presence and messaging core.
//!
//! - [`registry`]: the authoritative participant set
//! - [`router`]: named topic fan-out over bounded per-connection queues
//! - [`session`]: the per-connection protocol state machine
//! - [`sweeper`]: periodic eviction of silent participants
//! - [`names`]: display name allocation
//! - [`hub`]: shared state tying the above together

#![deny(unsafe_code)]

pub mod connection;
pub mod hub;
pub mod metrics;
pub mod names;
pub mod registry;
pub mod router;
pub mod session;
pub mod sweeper;

pub use connection::ClientConnection;
pub use hub::{Hub, HubConfig};
pub use names::{DEFAULT_NAMES, NameAllocator, NamePool};
pub use registry::ParticipantRegistry;
pub use router::TopicRouter;
pub use session::{Session, SessionState};
pub use sweeper::{spawn_sweeper, sweep_once};
