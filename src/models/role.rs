use core::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// A row of the `roles` table.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: i32,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

/// A role name taken from the configured role list.
///
/// Only a [`RoleSet`] hands these out, so holding one means the name was
/// validated against configuration and carries its canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Case-insensitive role name comparison with full Unicode case folding.
pub fn same_role(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleSetError {
    #[error("ROLES must contain at least one role")]
    Empty,
    #[error("ROLES must not contain blank role names")]
    Blank,
    #[error("role '{0}' is listed more than once in ROLES")]
    Duplicate(String),
}

/// The closed set of roles this deployment knows about.
///
/// The first configured role is the privileged (admin) role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSet {
    roles: Vec<RoleName>,
}

impl RoleSet {
    pub fn new<I, S>(names: I) -> Result<Self, RoleSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roles: Vec<RoleName> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(RoleSetError::Blank);
            }
            if roles.iter().any(|r| same_role(&r.0, &name)) {
                return Err(RoleSetError::Duplicate(name));
            }
            roles.push(RoleName(name));
        }

        if roles.is_empty() {
            return Err(RoleSetError::Empty);
        }

        Ok(Self { roles })
    }

    pub fn privileged(&self) -> &RoleName {
        // `new` rejects empty lists.
        &self.roles[0]
    }

    /// Case-insensitive lookup that returns the canonical spelling.
    pub fn resolve(&self, name: &str) -> Option<&RoleName> {
        let name = name.trim();
        self.roles.iter().find(|r| same_role(&r.0, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleName> {
        self.roles.iter()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_role_is_privileged() {
        let roles = RoleSet::new(["Super Admin", "User"]).unwrap();
        assert_eq!(roles.privileged().as_str(), "Super Admin");
        assert_eq!(roles.len(), 2);
    }

    #[test]
    fn resolve_is_case_insensitive_and_canonical() {
        let roles = RoleSet::new(["Super Admin", "User"]).unwrap();
        assert_eq!(roles.resolve("super admin").unwrap().as_str(), "Super Admin");
        assert_eq!(roles.resolve(" USER ").unwrap().as_str(), "User");
        assert!(roles.resolve("Moderator").is_none());
    }

    #[test]
    fn matching_folds_non_ascii_letters() {
        let roles = RoleSet::new(["Überadmin", "Näher"]).unwrap();
        assert_eq!(roles.resolve("ÜBERADMIN").unwrap().as_str(), "Überadmin");
        assert_eq!(roles.resolve("näher").unwrap().as_str(), "Näher");
        assert_eq!(
            RoleSet::new(["Élève", "élève"]),
            Err(RoleSetError::Duplicate("élève".into()))
        );
    }

    #[test]
    fn rejects_empty_blank_and_duplicate_lists() {
        assert_eq!(RoleSet::new(Vec::<String>::new()), Err(RoleSetError::Empty));
        assert_eq!(RoleSet::new(["Admin", "  "]), Err(RoleSetError::Blank));
        assert_eq!(
            RoleSet::new(["Admin", "admin"]),
            Err(RoleSetError::Duplicate("admin".into()))
        );
    }

    #[test]
    fn role_name_serializes_as_plain_string() {
        let roles = RoleSet::new(["Super Admin"]).unwrap();
        let json = serde_json::to_string(roles.privileged()).unwrap();
        assert_eq!(json, "\"Super Admin\"");
    }
}
