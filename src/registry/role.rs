use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::Actor;
use crate::cache::{get_json, set_json, CacheCoherency, CacheKeys, PermissionCache};
use crate::database::{Permission, Role, RoleProtection};
use crate::error::{AccessError, Result};
use crate::store::{RolePageQuery, RoleStore, UserStore};

/// Input for role creation.
#[derive(Debug, Clone, Default)]
pub struct NewRole {
	pub name: String,
	pub description: Option<String>,
	pub created_by: Option<Uuid>,
	pub default_permissions: Vec<Permission>,
	pub protection: RoleProtection,
}

/// Input for a role update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
	pub name: Option<String>,
	pub description: Option<String>,
	pub default_permissions: Option<Vec<Permission>>,
	pub protection: Option<RoleProtection>,
}

/// One cached page of the role listing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RolePage {
	pub roles: Vec<Role>,
	pub total: i64,
}

/// Owns role records and their default permissions.
pub struct RoleRegistry {
	store: Arc<dyn RoleStore>,
	users: Arc<dyn UserStore>,
	cache: Arc<dyn PermissionCache>,
	keys: CacheKeys,
	coherency: Arc<CacheCoherency>,
	ttl: Duration,
	max_page_limit: i64,
}

impl RoleRegistry {
	pub fn new(
		store: Arc<dyn RoleStore>,
		users: Arc<dyn UserStore>,
		cache: Arc<dyn PermissionCache>,
		keys: CacheKeys,
		coherency: Arc<CacheCoherency>,
		ttl: Duration,
		max_page_limit: i64,
	) -> Self {
		Self {
			store,
			users,
			cache,
			keys,
			coherency,
			ttl,
			max_page_limit,
		}
	}

	/// At most one record per entity name. Later entries win so a caller
	/// sending duplicates gets their last word.
	fn dedupe_by_entity(permissions: Vec<Permission>) -> Vec<Permission> {
		let mut out: Vec<Permission> = Vec::with_capacity(permissions.len());
		for permission in permissions {
			match out.iter_mut().find(|p| p.entity_name == permission.entity_name) {
				Some(existing) => *existing = permission,
				None => out.push(permission),
			}
		}
		out
	}

	pub async fn create_role(&self, input: NewRole) -> Result<Role> {
		let name = Role::canonical_name(&input.name);
		if name.is_empty() {
			return Err(AccessError::InvalidInput {
				fields: vec!["name"],
				message: "role name must not be empty",
			});
		}

		// Uniqueness spans the trash: a trashed role keeps its claim on
		// the name, otherwise restoring it would collide.
		if self.store.is_role_name_taken(&name).await? {
			return Err(AccessError::InvalidInput {
				fields: vec!["name"],
				message: "role name already taken",
			});
		}

		let role = Role {
			id: Uuid::new_v4(),
			name,
			description: input.description,
			default_permissions: Self::dedupe_by_entity(input.default_permissions),
			system_delete_protection: input.protection.delete,
			system_update_protection: input.protection.update,
			system_permanent_delete_protection: input.protection.permanent_delete,
			system_permanent_update_protection: input.protection.permanent_update,
			created_by: input.created_by,
			created_at: Utc::now(),
			deleted_at: None,
		};

		self.store.insert_role(&role).await?;
		self.coherency.role_changed(&role).await?;

		Ok(role)
	}

	/// Case-insensitive exact match, cache-then-database. Trashed roles
	/// are logically absent here.
	pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
		let name = Role::canonical_name(name);
		let key = self.keys.role_permissions(&name);

		if let Some(role) = get_json::<Role>(&*self.cache, &key).await? {
			return Ok(Some(role));
		}

		let Some(role) = self.store.find_role_by_name(&name).await? else {
			return Ok(None);
		};

		set_json(&*self.cache, &key, &role, self.ttl).await?;

		Ok(Some(role))
	}

	pub async fn find_roles_by_names(&self, names: &[String]) -> Result<Vec<Role>> {
		let mut roles = Vec::with_capacity(names.len());
		for name in names {
			if let Some(role) = self.find_role_by_name(name).await? {
				roles.push(role);
			}
		}
		Ok(roles)
	}

	/// Cache-then-database by id. Includes trashed roles.
	pub async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
		let key = self.keys.role(id);

		if let Some(role) = get_json::<Role>(&*self.cache, &key).await? {
			return Ok(Some(role));
		}

		let Some(role) = self.store.find_role_by_id(id).await? else {
			return Ok(None);
		};

		set_json(&*self.cache, &key, &role, self.ttl).await?;

		Ok(Some(role))
	}

	pub async fn soft_delete_role(&self, caller: &Actor, id: Uuid) -> Result<Role> {
		let role = self
			.store
			.find_role_by_id(id)
			.await?
			.filter(|r| !r.is_trashed())
			.ok_or(AccessError::NotFound {
				resource: "role",
				ids: vec![id],
			})?;

		if role.system_permanent_delete_protection {
			return Err(AccessError::ProtectedResource("this role can never be deleted"));
		}
		if role.system_delete_protection && !caller.is_super_admin() {
			return Err(AccessError::ProtectedResource("only the super admin may delete this role"));
		}

		let now = Utc::now();
		self.store.set_role_deleted_at(id, Some(now)).await?;

		let mut role = role;
		role.deleted_at = Some(now);
		self.coherency.role_changed(&role).await?;

		Ok(role)
	}

	/// Permanently removes trashed roles no user references, soft-deleted
	/// users included, cascading their owned permission rows.
	pub async fn hard_delete_roles(&self, caller: &Actor, ids: &[Uuid]) -> Result<()> {
		let mut roles = Vec::with_capacity(ids.len());
		let mut missing = Vec::new();

		for id in ids {
			match self.store.find_role_by_id(*id).await? {
				Some(role) => roles.push(role),
				None => missing.push(*id),
			}
		}

		if !missing.is_empty() {
			return Err(AccessError::NotFound {
				resource: "role",
				ids: missing,
			});
		}

		if roles.iter().any(|r| r.system_permanent_delete_protection) {
			return Err(AccessError::ProtectedResource("this role can never be deleted"));
		}
		if roles.iter().any(|r| r.system_delete_protection) && !caller.is_super_admin() {
			return Err(AccessError::ProtectedResource("only the super admin may delete this role"));
		}

		let not_in_trash: Vec<Uuid> = roles.iter().filter(|r| !r.is_trashed()).map(|r| r.id).collect();
		if !not_in_trash.is_empty() {
			return Err(AccessError::NotInTrash { ids: not_in_trash });
		}

		let mut dependents = Vec::new();
		for role in &roles {
			if self.users.count_users_holding_role(role).await? > 0 {
				dependents.push(role.id);
			}
		}
		if !dependents.is_empty() {
			return Err(AccessError::HasDependents { ids: dependents });
		}

		self.store.delete_roles(ids).await?;

		for role in &roles {
			self.coherency.role_changed(role).await?;
		}

		Ok(())
	}

	/// Clears `deleted_at`. Restoring an already-active role is a no-op,
	/// not an error.
	pub async fn restore_roles(&self, ids: &[Uuid]) -> Result<Vec<Role>> {
		let mut roles = Vec::with_capacity(ids.len());
		let mut missing = Vec::new();

		for id in ids {
			match self.store.find_role_by_id(*id).await? {
				Some(role) => roles.push(role),
				None => missing.push(*id),
			}
		}

		if !missing.is_empty() {
			return Err(AccessError::NotFound {
				resource: "role",
				ids: missing,
			});
		}

		for role in roles.iter_mut().filter(|r| r.is_trashed()) {
			self.store.set_role_deleted_at(role.id, None).await?;
			role.deleted_at = None;
			self.coherency.role_changed(role).await?;
		}

		Ok(roles)
	}

	pub async fn update_role_info(&self, caller: &Actor, id: Uuid, update: RoleUpdate) -> Result<Role> {
		let mut role = self.store.find_role_by_id(id).await?.ok_or(AccessError::NotFound {
			resource: "role",
			ids: vec![id],
		})?;

		if role.is_trashed() {
			return Err(AccessError::ProtectedResource("cannot update a trashed role"));
		}
		if role.is_reserved() && (update.name.is_some() || update.protection.is_some()) {
			return Err(AccessError::ProtectedResource(
				"system role names and protection flags cannot be changed",
			));
		}
		if role.system_permanent_update_protection {
			return Err(AccessError::ProtectedResource("this role can never be updated"));
		}
		// Update protection gates every field of the role, default
		// permissions included.
		if role.system_update_protection && !caller.is_super_admin() {
			return Err(AccessError::ProtectedResource("only the super admin may update this role"));
		}

		let old_name = role.name.clone();

		if let Some(name) = update.name {
			let name = Role::canonical_name(&name);
			if name != role.name {
				// Trashed roles hold their names too.
				if self.store.is_role_name_taken(&name).await? {
					return Err(AccessError::InvalidInput {
						fields: vec!["name"],
						message: "role name already taken",
					});
				}
				role.name = name;
			}
		}

		if let Some(description) = update.description {
			role.description = Some(description);
		}

		if let Some(protection) = update.protection {
			role.system_delete_protection = protection.delete;
			role.system_update_protection = protection.update;
			role.system_permanent_delete_protection = protection.permanent_delete;
			role.system_permanent_update_protection = protection.permanent_update;
		}

		if let Some(incoming) = update.default_permissions {
			// Entities the caller did not mention keep their existing
			// coverage instead of being silently dropped by the replace.
			let mut merged = Self::dedupe_by_entity(incoming);
			for existing in &role.default_permissions {
				if !merged.iter().any(|p| p.entity_name == existing.entity_name) {
					merged.push(existing.clone());
				}
			}
			role.default_permissions = merged;
		}

		self.store.replace_role(&role).await?;

		self.coherency.role_changed(&role).await?;
		if role.name != old_name {
			self.coherency.role_renamed(&old_name).await?;
		}

		Ok(role)
	}

	/// Paginated listing of active roles, cached per query under the
	/// current listing version.
	pub async fn paginate_roles(&self, query: RolePageQuery) -> Result<RolePage> {
		let query = RolePageQuery {
			page: query.page.max(1),
			limit: query.limit.clamp(1, self.max_page_limit),
			..query
		};

		let version = self
			.cache
			.get_raw(&self.keys.roles_page_version())
			.await?
			.and_then(|v| v.parse::<i64>().ok())
			.unwrap_or(0);

		let key = self.keys.roles_page(
			version,
			query.page,
			query.limit,
			query.search.as_deref(),
			query.sort_by.column(),
			query.order.keyword(),
		);

		if let Some(page) = get_json::<RolePage>(&*self.cache, &key).await? {
			return Ok(page);
		}

		let (roles, total) = self.store.list_roles(&query).await?;
		let page = RolePage { roles, total };

		set_json(&*self.cache, &key, &page, self.ttl).await?;

		Ok(page)
	}
}
