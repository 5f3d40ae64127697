//! Directory-service user account control flags
//!
//! A user's `userAccountControl` attribute is a bitmask. This module decodes
//! it into flag names and computes the value to write back when an operator
//! toggles a subset of flags.

use tracing::debug;

use crate::error::{AuthzError, Result};

pub const IS_ADMIN: u32 = 0x0001;
pub const ACCOUNTDISABLE: u32 = 0x0002;
pub const HOMEDIR_REQUIRED: u32 = 0x0008;
pub const LOCKOUT: u32 = 0x0010;
pub const PASSWD_NOTREQD: u32 = 0x0020;
pub const PASSWD_CANT_CHANGE: u32 = 0x0040;
pub const ENCRYPTED_TEXT_PWD_ALLOWED: u32 = 0x0080;
pub const TEMP_DUPLICATE_ACCOUNT: u32 = 0x0100;
pub const NORMAL_ACCOUNT: u32 = 0x0200;
pub const PASSWORD_EXPIRED: u32 = 0x0400;
pub const INTERDOMAIN_TRUST_ACCOUNT: u32 = 0x0800;
pub const WORKSTATION_TRUST_ACCOUNT: u32 = 0x1000;
pub const SERVER_TRUST_ACCOUNT: u32 = 0x2000;
pub const DONT_EXPIRE_PASSWORD: u32 = 0x4000;

/// Known flags in bit order
pub const FLAGS: [(u32, &str); 14] = [
    (IS_ADMIN, "IS_ADMIN"),
    (ACCOUNTDISABLE, "ACCOUNTDISABLE"),
    (HOMEDIR_REQUIRED, "HOMEDIR_REQUIRED"),
    (LOCKOUT, "LOCKOUT"),
    (PASSWD_NOTREQD, "PASSWD_NOTREQD"),
    (PASSWD_CANT_CHANGE, "PASSWD_CANT_CHANGE"),
    (ENCRYPTED_TEXT_PWD_ALLOWED, "ENCRYPTED_TEXT_PWD_ALLOWED"),
    (TEMP_DUPLICATE_ACCOUNT, "TEMP_DUPLICATE_ACCOUNT"),
    (NORMAL_ACCOUNT, "NORMAL_ACCOUNT"),
    (PASSWORD_EXPIRED, "PASSWORD_EXPIRED"),
    (INTERDOMAIN_TRUST_ACCOUNT, "INTERDOMAIN_TRUST_ACCOUNT"),
    (WORKSTATION_TRUST_ACCOUNT, "WORKSTATION_TRUST_ACCOUNT"),
    (SERVER_TRUST_ACCOUNT, "SERVER_TRUST_ACCOUNT"),
    (DONT_EXPIRE_PASSWORD, "DONT_EXPIRE_PASSWORD"),
];

/// Value assigned when no flag is selected
pub const DEFAULT_ACCOUNT_CONTROL: u32 = NORMAL_ACCOUNT;

/// Flag reference by table name or numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagRef<'a> {
    Name(&'a str),
    Value(u32),
}

impl<'a> From<&'a str> for FlagRef<'a> {
    fn from(name: &'a str) -> Self {
        FlagRef::Name(name)
    }
}

impl From<u32> for FlagRef<'_> {
    fn from(value: u32) -> Self {
        FlagRef::Value(value)
    }
}

/// Names of every flag set in `uac`, in table order
pub fn decode(uac: u32) -> Vec<&'static str> {
    FLAGS
        .iter()
        .filter(|(value, _)| uac & value == *value)
        .map(|(_, name)| *name)
        .collect()
}

/// Values of every flag set in `uac`, in table order
pub fn decode_values(uac: u32) -> Vec<u32> {
    FLAGS
        .iter()
        .filter(|(value, _)| uac & value == *value)
        .map(|(value, _)| *value)
        .collect()
}

pub fn add_flag(uac: u32, flag: u32) -> u32 {
    uac | flag
}

/// Clears `flag` when every one of its bits is set; otherwise leaves `uac` as is
pub fn remove_flag(uac: u32, flag: u32) -> u32 {
    if uac | flag == uac {
        uac ^ flag
    } else {
        uac
    }
}

/// Value of the flag named `name`
pub fn flag_value(name: &str) -> Result<u32> {
    FLAGS
        .iter()
        .find(|(_, flag_name)| *flag_name == name)
        .map(|(value, _)| *value)
        .ok_or_else(|| AuthzError::UnknownAccountFlag(name.to_string()))
}

/// Whether `uac` has the referenced flag set
pub fn has_flag<'a>(uac: u32, flag: impl Into<FlagRef<'a>>) -> Result<bool> {
    let value = match flag.into() {
        FlagRef::Name(name) => flag_value(name)?,
        FlagRef::Value(value) => FLAGS
            .iter()
            .find(|(known, _)| *known == value)
            .map(|(known, _)| *known)
            .ok_or_else(|| AuthzError::UnknownAccountFlag(format!("{:#06x}", value)))?,
    };
    Ok(uac & value == value)
}

/// Computes the account-control value after an operator edit
///
/// `available` lists the flags the operator could toggle and `selected` the
/// ones left switched on. Selected flags are added to `base`, then every
/// available flag that is not selected is removed.
///
/// - No selection yields [`DEFAULT_ACCOUNT_CONTROL`]
/// - No available flags leaves `base` unchanged
///
/// # Errors
///
/// Returns [`AuthzError::AccountControlConflict`] when the result would
/// both force a password change and mark the password as never expiring.
pub fn modifications(base: u32, available: &[u32], selected: &[u32]) -> Result<u32> {
    if selected.is_empty() {
        return Ok(DEFAULT_ACCOUNT_CONTROL);
    }
    if available.is_empty() {
        return Ok(base);
    }

    let added = selected.iter().fold(base, |uac, flag| add_flag(uac, *flag));
    let result = available
        .iter()
        .filter(|flag| !selected.contains(flag))
        .fold(added, |uac, flag| remove_flag(uac, *flag));

    if result & PASSWORD_EXPIRED != 0 && result & DONT_EXPIRE_PASSWORD != 0 {
        return Err(AuthzError::AccountControlConflict {
            first: "PASSWORD_EXPIRED",
            second: "DONT_EXPIRE_PASSWORD",
        });
    }

    debug!(base, result, "Computed account control modifications");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(decode(512), vec!["NORMAL_ACCOUNT"]);
        assert_eq!(decode(514), vec!["ACCOUNTDISABLE", "NORMAL_ACCOUNT"]);
        assert_eq!(decode(515), vec!["IS_ADMIN", "ACCOUNTDISABLE", "NORMAL_ACCOUNT"]);
        assert_eq!(decode(16896), vec!["NORMAL_ACCOUNT", "DONT_EXPIRE_PASSWORD"]);
        assert_eq!(
            decode(16898),
            vec!["ACCOUNTDISABLE", "NORMAL_ACCOUNT", "DONT_EXPIRE_PASSWORD"]
        );
        assert!(decode(0).is_empty());
    }

    #[test]
    fn test_decode_values() {
        assert_eq!(decode_values(514), vec![ACCOUNTDISABLE, NORMAL_ACCOUNT]);
        // 0x0004 is not a known flag
        assert_eq!(decode_values(0x0004 | NORMAL_ACCOUNT), vec![NORMAL_ACCOUNT]);
    }

    #[test]
    fn test_add_flag() {
        assert_eq!(add_flag(512, ACCOUNTDISABLE), 514);
        assert_eq!(decode(add_flag(512, ACCOUNTDISABLE)), vec!["ACCOUNTDISABLE", "NORMAL_ACCOUNT"]);

        // Already present
        assert_eq!(add_flag(514, ACCOUNTDISABLE), 514);
    }

    #[test]
    fn test_remove_flag() {
        assert_eq!(remove_flag(514, ACCOUNTDISABLE), 512);
        assert_eq!(decode(remove_flag(514, ACCOUNTDISABLE)), vec!["NORMAL_ACCOUNT"]);

        // Not present
        assert_eq!(remove_flag(512, ACCOUNTDISABLE), 512);
    }

    #[test]
    fn test_has_flag() {
        assert!(has_flag(514, "ACCOUNTDISABLE").unwrap());
        assert!(has_flag(514, ACCOUNTDISABLE).unwrap());
        assert!(!has_flag(512, "LOCKOUT").unwrap());
        assert!(matches!(
            has_flag(512, "NOT_A_FLAG"),
            Err(AuthzError::UnknownAccountFlag(_))
        ));
        assert!(has_flag(512, 0x0004u32).is_err());
    }

    #[test]
    fn test_flag_value() {
        assert_eq!(flag_value("DONT_EXPIRE_PASSWORD").unwrap(), 0x4000);
        assert!(flag_value("dont_expire_password").is_err());
    }

    #[test]
    fn test_modifications_without_selection() {
        assert_eq!(modifications(514, &[ACCOUNTDISABLE], &[]).unwrap(), 512);
    }

    #[test]
    fn test_modifications_without_available_flags() {
        assert_eq!(modifications(514, &[], &[LOCKOUT]).unwrap(), 514);
    }

    #[test]
    fn test_modifications_toggle() {
        let available = [ACCOUNTDISABLE, LOCKOUT, DONT_EXPIRE_PASSWORD];

        // Enable "never expires", disable the account flag
        let uac = modifications(514, &available, &[DONT_EXPIRE_PASSWORD]).unwrap();
        assert_eq!(uac, NORMAL_ACCOUNT | DONT_EXPIRE_PASSWORD);

        // Flags outside `available` are kept
        let uac = modifications(515, &available, &[LOCKOUT]).unwrap();
        assert_eq!(uac, IS_ADMIN | NORMAL_ACCOUNT | LOCKOUT);
    }

    #[test]
    fn test_modifications_conflict() {
        let available = [PASSWORD_EXPIRED, DONT_EXPIRE_PASSWORD];
        let err = modifications(512, &available, &available).unwrap_err();
        assert!(matches!(err, AuthzError::AccountControlConflict { .. }));

        // Conflict with a flag already on the base value
        let err = modifications(512 | DONT_EXPIRE_PASSWORD, &[PASSWORD_EXPIRED], &[PASSWORD_EXPIRED])
            .unwrap_err();
        assert!(err.to_string().contains("DONT_EXPIRE_PASSWORD"));
    }
}
