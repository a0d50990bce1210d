//! Authorization requirements and the standard presets.
//!
//! A requirement is an immutable value attached to a protected operation:
//! two optional sets of allowed role names plus an organization-selection
//! flag. The admin/owner/member presets are configuration variants over
//! this one shape, not a type hierarchy.

use serde::{Deserialize, Serialize};

/// Well-known role names.
///
/// Organization roles are hierarchical in intent (owner > admin > member >
/// viewer) but the chain only ever does set membership; the hierarchy is
/// expressed by which roles each preset includes.
pub mod roles {
    pub const OWNER: &str = "owner";
    pub const ADMIN: &str = "admin";
    pub const MEMBER: &str = "member";
    pub const VIEWER: &str = "viewer";
}

/// Immutable authorization configuration for one protected operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequirement {
    /// Allowed organization-scoped roles. Empty means no org-role check.
    #[serde(default)]
    pub organization_roles: Vec<String>,

    /// Allowed global roles. Empty means no global-role check.
    #[serde(default)]
    pub global_roles: Vec<String>,

    /// Whether the request must carry a selected organization.
    #[serde(default)]
    pub requires_organization_selected: bool,
}

impl AuthorizationRequirement {
    /// A requirement that only demands a live authenticated session.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Preset: any organization role (owner, admin, member or viewer).
    #[must_use]
    pub fn member() -> Self {
        Self {
            organization_roles: vec![
                roles::OWNER.into(),
                roles::ADMIN.into(),
                roles::MEMBER.into(),
                roles::VIEWER.into(),
            ],
            global_roles: Vec::new(),
            requires_organization_selected: true,
        }
    }

    /// Preset: administrative access (admin or owner).
    #[must_use]
    pub fn admin() -> Self {
        Self {
            organization_roles: vec![roles::ADMIN.into(), roles::OWNER.into()],
            global_roles: Vec::new(),
            requires_organization_selected: true,
        }
    }

    /// Preset: owner-only access.
    #[must_use]
    pub fn owner() -> Self {
        Self {
            organization_roles: vec![roles::OWNER.into()],
            global_roles: Vec::new(),
            requires_organization_selected: true,
        }
    }

    /// Preset: no role filter, just a selected organization.
    #[must_use]
    pub fn organization_selected() -> Self {
        Self {
            organization_roles: Vec::new(),
            global_roles: Vec::new(),
            requires_organization_selected: true,
        }
    }

    /// Adds allowed global roles to the requirement.
    #[must_use]
    pub fn with_global_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if `role` is allowed by the organization-role set.
    ///
    /// Matching is case-insensitive: a claim of `"Owner"` satisfies a
    /// requirement listing `"owner"`.
    #[must_use]
    pub fn allows_organization_role(&self, role: &str) -> bool {
        self.organization_roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Returns `true` if `role` is allowed by the global-role set.
    #[must_use]
    pub fn allows_global_role(&self, role: &str) -> bool {
        self.global_roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}
