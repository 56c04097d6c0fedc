//! # kc-core
//!
//! Core utilities shared by the Keycloak Rust session crates.
//!
//! - [`event`] - session lifecycle and relationship events
//! - [`logging`] - tracing subscriber setup

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod event;
pub mod logging;

pub use event::{Event, EventBuilder, EventType};
