//! Shared vocabulary for SkyArena.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - **Identities** ([`PlayerName`], [`ArenaName`], [`WorldName`]) —
//!   string keys with documented uniqueness rules.
//! - **Positions** ([`BlockPos`], [`Position`]) — where a lobby or a sign is.
//! - **Host events** ([`HostEvent`], [`HostAction`]) — what the host hands
//!   to the core, and what the core asks back.
//! - **Errors** ([`ProtocolError`]) — a name that can't be used as a key.
//!
//! ```text
//! Host server → HostEvent → skyarena (composition) → registry / subsystems
//! ```

mod error;
mod types;

pub use error::ProtocolError;
pub use types::{ArenaName, BlockPos, HostAction, HostEvent, PlayerName, Position, WorldName};
