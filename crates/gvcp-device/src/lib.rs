//! Synchronous GVCP device-side control-plane engine.
//!
//! This crate implements the GigE Vision Control Protocol server role: the
//! bootstrap register block, the vendor register bank, the XML descriptor
//! blob, the Control Channel Privilege gate, discovery, and the dispatch
//! loop that ties them together. It owns no socket: a [`platform::Platform`]
//! implementation supplies the clock and the actual send, and a
//! [`collaborator::StreamCollaborator`] implementation owns the GVSP
//! streaming side this crate only configures.

pub mod bootstrap;
pub mod ccp;
pub mod collaborator;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod platform;
pub mod router;
pub mod stats;
pub mod uuid;
pub mod vendor;
pub mod xml;

pub use collaborator::{NullCollaborator, StreamCollaborator};
pub use config::{DeviceIdentity, DiscoveryConfig, EngineConfig, NetworkInfo};
pub use engine::GvcpEngine;
pub use platform::{Platform, PlatformError};
