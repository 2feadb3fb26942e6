//! Control Channel Privilege state machine (`spec.md` §4.4).

use crate::config::ConfigError;

/// The four valid CCP privilege values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    NoAccess,
    Exclusive,
    Primary,
    ExclusivePrimary,
}

impl Privilege {
    /// Raw wire value for this privilege state.
    pub const fn raw(self) -> u32 {
        match self {
            Privilege::NoAccess => 0x0000_0000,
            Privilege::Exclusive => 0x0000_0001,
            Privilege::Primary => 0x0000_0200,
            Privilege::ExclusivePrimary => 0x0000_0201,
        }
    }

    /// Parse a raw register value, rejecting anything outside the four
    /// documented states.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0000_0000 => Some(Privilege::NoAccess),
            0x0000_0001 => Some(Privilege::Exclusive),
            0x0000_0200 => Some(Privilege::Primary),
            0x0000_0201 => Some(Privilege::ExclusivePrimary),
            _ => None,
        }
    }
}

/// Owns the active privilege bitfield and privilege key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcpState {
    privilege: Privilege,
    key: u32,
}

impl Default for CcpState {
    fn default() -> Self {
        Self {
            privilege: Privilege::NoAccess,
            key: 0,
        }
    }
}

impl CcpState {
    /// Current privilege value as stored on the wire.
    pub fn privilege_raw(&self) -> u32 {
        self.privilege.raw()
    }

    /// Current privilege key.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Attempt to transition to a new privilege value. Transitions are
    /// direct: any valid value overwrites the current one, there is no
    /// ordering protocol. Invalid values are rejected and the prior state
    /// is preserved.
    pub fn set_privilege(&mut self, raw: u32) -> Result<(), ConfigError> {
        let privilege = Privilege::from_raw(raw).ok_or(ConfigError::InvalidPrivilege(raw))?;
        self.privilege = privilege;
        Ok(())
    }

    /// The key register accepts any u32.
    pub fn set_key(&mut self, key: u32) {
        self.key = key;
    }

    /// Whether register writes other than to CCP/CCP-key are currently
    /// permitted.
    pub fn writes_permitted(&self) -> bool {
        !matches!(self.privilege, Privilege::NoAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_values_transition_directly() {
        let mut ccp = CcpState::default();
        ccp.set_privilege(0x0000_0200).unwrap();
        assert_eq!(ccp.privilege_raw(), 0x0000_0200);
        ccp.set_privilege(0x0000_0001).unwrap();
        assert_eq!(ccp.privilege_raw(), 0x0000_0001);
    }

    #[test]
    fn invalid_value_preserves_prior_state() {
        let mut ccp = CcpState::default();
        ccp.set_privilege(0x0000_0200).unwrap();
        let err = ccp.set_privilege(0x0000_0002).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPrivilege(0x0000_0002));
        assert_eq!(ccp.privilege_raw(), 0x0000_0200);
    }

    #[test]
    fn key_accepts_any_value() {
        let mut ccp = CcpState::default();
        ccp.set_key(0xDEAD_BEEF);
        assert_eq!(ccp.key(), 0xDEAD_BEEF);
    }

    #[test]
    fn no_access_blocks_other_writes() {
        let ccp = CcpState::default();
        assert!(!ccp.writes_permitted());
    }

    #[test]
    fn non_no_access_permits_writes() {
        let mut ccp = CcpState::default();
        ccp.set_privilege(0x0000_0001).unwrap();
        assert!(ccp.writes_permitted());
    }
}
