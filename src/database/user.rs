use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Permission;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
/// A user of the platform.
///
/// A user holds one or more roles and may additionally carry personalized
/// permission overrides, at most one per entity name. An empty override
/// list means the user defers entirely to role defaults.
pub struct User {
	/// The unique identifier for the user.
	pub id: Uuid,
	/// The username of the user.
	pub username: String,
	/// The roles held by the user.
	#[sqlx(skip)]
	pub roles: Vec<Uuid>,
	/// The personalized permission overrides of the user.
	#[sqlx(skip)]
	pub personalized_permissions: Vec<Permission>,
	/// Whether the user may edit other users' permissions.
	pub can_update_permissions: bool,
	/// Whether the user may edit other users' roles.
	pub can_update_role: bool,
	/// The time the user was created.
	pub created_at: DateTime<Utc>,
	/// The time the user was soft-deleted.
	pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
	pub fn is_active(&self) -> bool {
		self.deleted_at.is_none()
	}
}
