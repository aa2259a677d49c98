use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Permission;

/// Role names that can never be renamed or have their protection flags
/// altered, by anyone.
pub const RESERVED_ROLE_NAMES: &[&str] = &["SUPER ADMIN", "ADMIN", "INVENTORY MANAGER", "CUSTOMER SUPPORT", "CUSTOMER"];

/// The role allowed to bypass the non-permanent protection flags.
pub const SUPER_ADMIN_ROLE: &str = "SUPER ADMIN";

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
/// A role that can be granted to a user.
///
/// A role carries at most one default permission per entity name; every
/// user holding the role inherits them. A role with `deleted_at` set is in
/// the trash: absent from normal listings, restorable, and eligible for
/// hard deletion only while no user still holds it.
pub struct Role {
	/// The unique identifier for the role.
	pub id: Uuid,
	/// The name of the role. Unique case-insensitively, stored uppercase.
	pub name: String,
	/// The description of the role.
	pub description: Option<String>,
	/// The default permissions granted by this role.
	#[sqlx(skip)]
	pub default_permissions: Vec<Permission>,
	/// Whether soft deletion requires the super admin role.
	pub system_delete_protection: bool,
	/// Whether updates require the super admin role.
	pub system_update_protection: bool,
	/// Whether hard deletion is forbidden for everyone.
	pub system_permanent_delete_protection: bool,
	/// Whether updates are forbidden for everyone.
	pub system_permanent_update_protection: bool,
	/// The user that created the role.
	pub created_by: Option<Uuid>,
	/// The time the role was created.
	pub created_at: DateTime<Utc>,
	/// The time the role was moved to the trash.
	pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
	/// The canonical form of a role name. Uniqueness is case-insensitive,
	/// so names are persisted uppercase.
	pub fn canonical_name(name: &str) -> String {
		name.trim().to_uppercase()
	}

	pub fn is_trashed(&self) -> bool {
		self.deleted_at.is_some()
	}

	/// Whether this role's name is one of the immutable reserved names.
	pub fn is_reserved(&self) -> bool {
		RESERVED_ROLE_NAMES.iter().any(|n| n.eq_ignore_ascii_case(&self.name))
	}

	/// The default permission for the given entity, if the role has one.
	pub fn permission_for(&self, entity: super::EntityName) -> Option<&Permission> {
		self.default_permissions.iter().find(|p| p.entity_name == entity)
	}
}

/// Protection flags of a role, grouped so they can be set in one piece.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoleProtection {
	pub delete: bool,
	pub update: bool,
	pub permanent_delete: bool,
	pub permanent_update: bool,
}

impl From<&Role> for RoleProtection {
	fn from(role: &Role) -> Self {
		Self {
			delete: role.system_delete_protection,
			update: role.system_update_protection,
			permanent_delete: role.system_permanent_delete_protection,
			permanent_update: role.system_permanent_update_protection,
		}
	}
}
