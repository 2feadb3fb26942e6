//! Engine construction parameters.
//!
//! Everything the engine needs at startup is gathered here instead of being
//! read from module statics, per `spec.md` §9 ("replace with an engine value
//! owned by the caller").

use std::net::Ipv4Addr;

use thiserror::Error;

/// Fixed device identity baked in by the firmware build, not runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
    pub version: String,
    pub serial: String,
    pub user_name: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            manufacturer: "Acme Vision".to_string(),
            model: "GVCP-SIM".to_string(),
            version: "1.0".to_string(),
            serial: "0000000001".to_string(),
            user_name: String::new(),
        }
    }
}

/// Network info supplied by the platform at init or on reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            mac: [0, 0, 0, 0, 0, 0],
            ip: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Discovery broadcast behaviour (`spec.md` §3 `DiscoveryConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub interval_ms: u32,
    pub retries: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 1000,
            retries: 3,
        }
    }
}

/// Top-level parameters passed once to [`crate::engine::GvcpEngine::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub identity: DeviceIdentity,
    pub network: NetworkInfo,
    pub discovery: DiscoveryConfig,
    /// Consecutive send failures tolerated before `should_recreate_socket`
    /// latches (`spec.md` §5, default 3).
    pub max_socket_errors: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::default(),
            network: NetworkInfo::default(),
            discovery: DiscoveryConfig::default(),
            max_socket_errors: 3,
        }
    }
}

/// Errors raised while validating configuration, at construction or via a
/// register write (`spec.md` §7 `ConfigError`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid CCP privilege value {0:#010x}")]
    InvalidPrivilege(u32),
    #[error("discovery interval must be non-zero")]
    InvalidInterval,
}
