//! Closed role set for RBAC decisions.
//!
//! Roles are flat and unordered; no hierarchy exists. The single special
//! case is the super-admin bypass, which admits every role check. Historical
//! data carries two spellings for that role (`super_admin` and `superadmin`);
//! both are normalized to one variant at the parse boundary so comparisons
//! are never stringly-typed.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role assigned to a user within their organization.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Nurse,
    Pharmacist,
    Physiotherapist,
    Admin,
    Receptionist,
    #[serde(alias = "lab-technician")]
    LabTechnician,
    #[serde(alias = "read-only")]
    ReadOnly,
    #[serde(alias = "superadmin")]
    SuperAdmin,
}

/// Every role, for exhaustive policy checks.
pub const ALL_ROLES: [Role; 9] = [
    Role::Doctor,
    Role::Nurse,
    Role::Pharmacist,
    Role::Physiotherapist,
    Role::Admin,
    Role::Receptionist,
    Role::LabTechnician,
    Role::ReadOnly,
    Role::SuperAdmin,
];

impl Role {
    /// Canonical storage spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Pharmacist => "pharmacist",
            Self::Physiotherapist => "physiotherapist",
            Self::Admin => "admin",
            Self::Receptionist => "receptionist",
            Self::LabTechnician => "lab_technician",
            Self::ReadOnly => "read_only",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Parse a stored or transported role name.
    ///
    /// Accepts hyphen and underscore separators plus the legacy
    /// `superadmin` spelling; everything else is rejected.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "doctor" => Some(Self::Doctor),
            "nurse" => Some(Self::Nurse),
            "pharmacist" => Some(Self::Pharmacist),
            "physiotherapist" => Some(Self::Physiotherapist),
            "admin" => Some(Self::Admin),
            "receptionist" => Some(Self::Receptionist),
            "lab_technician" => Some(Self::LabTechnician),
            "read_only" => Some(Self::ReadOnly),
            "super_admin" | "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// The universal-bypass predicate. Kept explicit so call sites read as
    /// policy, not as an equality that happens to work.
    #[must_use]
    pub fn is_super_admin(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ALL_ROLES, Role};

    #[test]
    fn parse_round_trips_canonical_spellings() {
        for role in ALL_ROLES {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn parse_normalizes_super_admin_spellings() {
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("superadmin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse(" Super-Admin "), Some(Role::SuperAdmin));
    }

    #[test]
    fn parse_accepts_hyphenated_names() {
        assert_eq!(Role::parse("lab-technician"), Some(Role::LabTechnician));
        assert_eq!(Role::parse("read-only"), Some(Role::ReadOnly));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("admin "), Some(Role::Admin));
    }

    #[test]
    fn only_super_admin_bypasses() {
        for role in ALL_ROLES {
            assert_eq!(role.is_super_admin(), role == Role::SuperAdmin);
        }
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&Role::SuperAdmin).expect("serialize");
        assert_eq!(json, "\"super_admin\"");
        let legacy: Role = serde_json::from_str("\"superadmin\"").expect("deserialize");
        assert_eq!(legacy, Role::SuperAdmin);
    }
}
