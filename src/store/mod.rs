use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::{Permission, Role, User};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

/// Sort column for role listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoleSort {
	#[default]
	Name,
	CreatedAt,
}

impl RoleSort {
	pub fn column(&self) -> &'static str {
		match self {
			Self::Name => "name",
			Self::CreatedAt => "created_at",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortOrder {
	#[default]
	Asc,
	Desc,
}

impl SortOrder {
	pub fn keyword(&self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}
}

/// A page request against the role listing. `search` matches name OR
/// description, case-insensitive substring. Only non-trashed roles are
/// listed.
#[derive(Debug, Clone, Default)]
pub struct RolePageQuery {
	pub page: i64,
	pub limit: i64,
	pub search: Option<String>,
	pub sort_by: RoleSort,
	pub order: SortOrder,
}

/// Repository-style access to roles and their owned default permissions.
///
/// The store is the source of truth; it performs no caching and no
/// authorization. Multi-row writes are single database transactions so a
/// partially replaced permission list is never observable.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
	/// Inserts a role and its default permissions.
	async fn insert_role(&self, role: &Role) -> Result<(), StoreError>;

	/// Fetches a role by id, including trashed ones.
	async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>, StoreError>;

	/// Fetches an active role by canonical name.
	async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

	/// Whether any role already has the canonical name, trashed roles
	/// included. A trashed role keeps its claim on the name until it is
	/// hard-deleted, so restoring it can never collide.
	async fn is_role_name_taken(&self, name: &str) -> Result<bool, StoreError>;

	/// Updates a role row and fully replaces its owned default
	/// permissions, in one transaction.
	async fn replace_role(&self, role: &Role) -> Result<(), StoreError>;

	/// Sets or clears `deleted_at`.
	async fn set_role_deleted_at(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<(), StoreError>;

	/// Deletes the given roles and their owned permission rows, in one
	/// transaction.
	async fn delete_roles(&self, ids: &[Uuid]) -> Result<(), StoreError>;

	/// Lists active roles matching the query, plus the total match count.
	async fn list_roles(&self, query: &RolePageQuery) -> Result<(Vec<Role>, i64), StoreError>;
}

/// Repository-style access to users, their personalized permission
/// overrides, and their sessions.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
	async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

	/// Raw personalized overrides for a user, unmerged.
	async fn personalized_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError>;

	/// Upserts overrides keyed on (user, entity name): an existing row for
	/// the same entity is updated in place and keeps its identity, so
	/// duplicates cannot accumulate.
	async fn upsert_personalized_permissions(
		&self,
		user_id: Uuid,
		permissions: &[Permission],
	) -> Result<Vec<Permission>, StoreError>;

	/// Removes every personalized override of the user.
	async fn delete_personalized_permissions(&self, user_id: Uuid) -> Result<u64, StoreError>;

	async fn is_username_taken(&self, username: &str, exclude_user_id: Option<Uuid>) -> Result<bool, StoreError>;

	/// Ids of active users holding the role. Used for cache and session
	/// fan-out, where soft-deleted users have nothing left to invalidate.
	async fn users_holding_role(&self, role: &Role) -> Result<Vec<Uuid>, StoreError>;

	/// Counts every user referencing the role, soft-deleted users
	/// included. Hard deletion is blocked while any reference remains.
	async fn count_users_holding_role(&self, role: &Role) -> Result<i64, StoreError>;

	/// Expires every session of the given users so stale tokens must
	/// re-authenticate.
	async fn invalidate_sessions(&self, user_ids: &[Uuid]) -> Result<u64, StoreError>;
}
