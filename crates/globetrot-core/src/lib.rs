//! # globetrot-core
//!
//! Shared vocabulary for the globetrot presence hub.
//!
//! - [`participant`]: the per-connection presence record and its wire shape
//! - [`message`]: the ephemeral direct-chat envelope
//! - [`topic`]: broadcast and private fan-out channel names
//! - [`protocol`]: inbound client events and outbound server events
//! - [`errors`]: the hub error taxonomy
//! - [`clock`]: wall-clock abstraction used for liveness timestamps
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod clock;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;
pub mod participant;
pub mod protocol;
pub mod topic;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{HubError, Result};
pub use ids::ConnectionId;
pub use message::ChatMessage;
pub use participant::{DEFAULT_NAMES, Participant};
pub use protocol::{ErrorCode, InboundEvent, OutboundEvent, ServerEvent};
pub use topic::Topic;
