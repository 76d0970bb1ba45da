#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Werewolf Server
//!
//! Authoritative backend for a multiplayer Werewolf (social deduction) game.
//!
//! Rooms gather players; a full, all-ready room spawns a game whose state
//! advances through a deterministic phase sequence (night role actions →
//! optional sheriff election → day speeches → day vote → settlement → …)
//! under per-phase countdowns, until one side wins.

/// Fan-out channel abstraction (rooms and per-user channels)
pub mod broadcast;

/// Server configuration and environment variables
pub mod config;

/// Document store abstraction (rooms + replays; in-memory implementation)
pub mod database;

/// Game engine: phase state machine, action resolver, bots, win evaluation
pub mod engine;

/// Structured logging configuration
pub mod logging;

/// Wire protocol: roles, phases, actions, errors, events, payloads
pub mod protocol;

/// Timer pump driving phase timeouts
pub mod pump;

/// Room registry: membership, seats, ready flags, composition
pub mod rooms;

/// HTTP request adapter
pub mod server;

/// Snapshot store abstraction (game/room runtime blobs + active set)
pub mod store;
