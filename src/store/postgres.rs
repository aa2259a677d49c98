use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use uuid::Uuid;

use super::{RolePageQuery, RoleStore, StoreError, UserStore};
use crate::database::{Permission, Role, User};

/// The production store, backed by the relational database.
pub struct PostgresStore {
	db: Arc<sqlx::PgPool>,
}

impl PostgresStore {
	pub fn new(db: Arc<sqlx::PgPool>) -> Self {
		Self { db }
	}

	async fn load_permissions(&self, role_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Permission>>, StoreError> {
		#[derive(sqlx::FromRow)]
		struct Row {
			role_id: Uuid,
			#[sqlx(flatten)]
			permission: Permission,
		}

		let rows: Vec<Row> = sqlx::query_as(
			"SELECT role_id, id, entity_name, description, can_create, can_read, can_update, can_delete, created_at \
			 FROM role_permissions WHERE role_id = ANY($1)",
		)
		.bind(role_ids.to_vec())
		.fetch_all(&*self.db)
		.await?;

		Ok(rows.into_iter().map(|r| (r.role_id, r.permission)).into_group_map())
	}

	async fn hydrate(&self, mut role: Role) -> Result<Role, StoreError> {
		let mut permissions = self.load_permissions(&[role.id]).await?;
		role.default_permissions = permissions.remove(&role.id).unwrap_or_default();
		Ok(role)
	}
}

#[async_trait::async_trait]
impl RoleStore for PostgresStore {
	async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
		let mut tx = self.db.begin().await?;

		sqlx::query(
			"INSERT INTO roles (id, name, description, system_delete_protection, system_update_protection, \
			 system_permanent_delete_protection, system_permanent_update_protection, created_by, created_at, deleted_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
		)
		.bind(role.id)
		.bind(&role.name)
		.bind(&role.description)
		.bind(role.system_delete_protection)
		.bind(role.system_update_protection)
		.bind(role.system_permanent_delete_protection)
		.bind(role.system_permanent_update_protection)
		.bind(role.created_by)
		.bind(role.created_at)
		.bind(role.deleted_at)
		.execute(&mut *tx)
		.await?;

		for permission in &role.default_permissions {
			sqlx::query(
				"INSERT INTO role_permissions (id, role_id, entity_name, description, can_create, can_read, can_update, \
				 can_delete, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
			)
			.bind(permission.id)
			.bind(role.id)
			.bind(permission.entity_name)
			.bind(&permission.description)
			.bind(permission.can_create)
			.bind(permission.can_read)
			.bind(permission.can_update)
			.bind(permission.can_delete)
			.bind(permission.created_at)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		Ok(())
	}

	async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>, StoreError> {
		let role: Option<Role> = sqlx::query_as("SELECT * FROM roles WHERE id = $1")
			.bind(id)
			.fetch_optional(&*self.db)
			.await?;

		match role {
			Some(role) => Ok(Some(self.hydrate(role).await?)),
			None => Ok(None),
		}
	}

	async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
		let role: Option<Role> = sqlx::query_as("SELECT * FROM roles WHERE name = $1 AND deleted_at IS NULL")
			.bind(name)
			.fetch_optional(&*self.db)
			.await?;

		match role {
			Some(role) => Ok(Some(self.hydrate(role).await?)),
			None => Ok(None),
		}
	}

	async fn is_role_name_taken(&self, name: &str) -> Result<bool, StoreError> {
		Ok(sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE name = $1)")
			.bind(name)
			.fetch_one(&*self.db)
			.await?)
	}

	async fn replace_role(&self, role: &Role) -> Result<(), StoreError> {
		let mut tx = self.db.begin().await?;

		sqlx::query(
			"UPDATE roles SET name = $2, description = $3, system_delete_protection = $4, system_update_protection = $5, \
			 system_permanent_delete_protection = $6, system_permanent_update_protection = $7 WHERE id = $1",
		)
		.bind(role.id)
		.bind(&role.name)
		.bind(&role.description)
		.bind(role.system_delete_protection)
		.bind(role.system_update_protection)
		.bind(role.system_permanent_delete_protection)
		.bind(role.system_permanent_update_protection)
		.execute(&mut *tx)
		.await?;

		// Full replace of the owned permission list, never a diff.
		sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
			.bind(role.id)
			.execute(&mut *tx)
			.await?;

		for permission in &role.default_permissions {
			sqlx::query(
				"INSERT INTO role_permissions (id, role_id, entity_name, description, can_create, can_read, can_update, \
				 can_delete, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
			)
			.bind(permission.id)
			.bind(role.id)
			.bind(permission.entity_name)
			.bind(&permission.description)
			.bind(permission.can_create)
			.bind(permission.can_read)
			.bind(permission.can_update)
			.bind(permission.can_delete)
			.bind(permission.created_at)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		Ok(())
	}

	async fn set_role_deleted_at(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<(), StoreError> {
		sqlx::query("UPDATE roles SET deleted_at = $2 WHERE id = $1")
			.bind(id)
			.bind(deleted_at)
			.execute(&*self.db)
			.await?;

		Ok(())
	}

	async fn delete_roles(&self, ids: &[Uuid]) -> Result<(), StoreError> {
		let mut tx = self.db.begin().await?;

		sqlx::query("DELETE FROM role_permissions WHERE role_id = ANY($1)")
			.bind(ids.to_vec())
			.execute(&mut *tx)
			.await?;

		// The dependency check runs before this, but the join rows still
		// go in the same transaction so the role delete cannot trip the
		// foreign key under a concurrent assignment.
		sqlx::query("DELETE FROM user_roles WHERE role_id = ANY($1)")
			.bind(ids.to_vec())
			.execute(&mut *tx)
			.await?;

		sqlx::query("DELETE FROM roles WHERE id = ANY($1)")
			.bind(ids.to_vec())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		Ok(())
	}

	async fn list_roles(&self, query: &RolePageQuery) -> Result<(Vec<Role>, i64), StoreError> {
		let pattern = query.search.as_ref().map(|s| format!("%{s}%"));

		let total: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM roles WHERE deleted_at IS NULL \
			 AND ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1)",
		)
		.bind(&pattern)
		.fetch_one(&*self.db)
		.await?;

		// Sort column and direction come from closed enums, never from
		// caller strings.
		let sql = format!(
			"SELECT * FROM roles WHERE deleted_at IS NULL \
			 AND ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1) \
			 ORDER BY {} {} LIMIT $2 OFFSET $3",
			query.sort_by.column(),
			query.order.keyword()
		);

		let roles: Vec<Role> = sqlx::query_as(&sql)
			.bind(&pattern)
			.bind(query.limit)
			.bind((query.page - 1).max(0) * query.limit)
			.fetch_all(&*self.db)
			.await?;

		let ids = roles.iter().map(|r| r.id).collect::<Vec<_>>();
		let mut permissions = self.load_permissions(&ids).await?;

		let roles = roles
			.into_iter()
			.map(|mut role| {
				role.default_permissions = permissions.remove(&role.id).unwrap_or_default();
				role
			})
			.collect();

		Ok((roles, total))
	}
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
	async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
		let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
			.bind(id)
			.fetch_optional(&*self.db)
			.await?;

		let Some(mut user) = user else {
			return Ok(None);
		};

		user.roles = sqlx::query_scalar("SELECT role_id FROM user_roles WHERE user_id = $1")
			.bind(id)
			.fetch_all(&*self.db)
			.await?;

		user.personalized_permissions = self.personalized_permissions(id).await?;

		Ok(Some(user))
	}

	async fn personalized_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError> {
		Ok(sqlx::query_as(
			"SELECT id, entity_name, description, can_create, can_read, can_update, can_delete, created_at \
			 FROM permissions WHERE user_id = $1",
		)
		.bind(user_id)
		.fetch_all(&*self.db)
		.await?)
	}

	async fn upsert_personalized_permissions(
		&self,
		user_id: Uuid,
		permissions: &[Permission],
	) -> Result<Vec<Permission>, StoreError> {
		let mut tx = self.db.begin().await?;

		let mut upserted = Vec::with_capacity(permissions.len());

		// The (user_id, entity_name) uniqueness constraint makes this an
		// update-in-place for entities that already have an override, so
		// record identities stay stable.
		for permission in permissions {
			let row: Permission = sqlx::query_as(
				"INSERT INTO permissions (id, user_id, entity_name, description, can_create, can_read, can_update, \
				 can_delete, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
				 ON CONFLICT (user_id, entity_name) DO UPDATE SET description = EXCLUDED.description, \
				 can_create = EXCLUDED.can_create, can_read = EXCLUDED.can_read, can_update = EXCLUDED.can_update, \
				 can_delete = EXCLUDED.can_delete \
				 RETURNING id, entity_name, description, can_create, can_read, can_update, can_delete, created_at",
			)
			.bind(permission.id)
			.bind(user_id)
			.bind(permission.entity_name)
			.bind(&permission.description)
			.bind(permission.can_create)
			.bind(permission.can_read)
			.bind(permission.can_update)
			.bind(permission.can_delete)
			.bind(permission.created_at)
			.fetch_one(&mut *tx)
			.await?;

			upserted.push(row);
		}

		tx.commit().await?;

		Ok(upserted)
	}

	async fn delete_personalized_permissions(&self, user_id: Uuid) -> Result<u64, StoreError> {
		let result = sqlx::query("DELETE FROM permissions WHERE user_id = $1")
			.bind(user_id)
			.execute(&*self.db)
			.await?;

		Ok(result.rows_affected())
	}

	async fn is_username_taken(&self, username: &str, exclude_user_id: Option<Uuid>) -> Result<bool, StoreError> {
		Ok(sqlx::query_scalar(
			"SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) AND deleted_at IS NULL \
			 AND ($2::uuid IS NULL OR id != $2))",
		)
		.bind(username)
		.bind(exclude_user_id)
		.fetch_one(&*self.db)
		.await?)
	}

	async fn users_holding_role(&self, role: &Role) -> Result<Vec<Uuid>, StoreError> {
		Ok(sqlx::query_scalar(
			"SELECT u.id FROM users u JOIN user_roles ur ON ur.user_id = u.id \
			 WHERE ur.role_id = $1 AND u.deleted_at IS NULL",
		)
		.bind(role.id)
		.fetch_all(&*self.db)
		.await?)
	}

	async fn count_users_holding_role(&self, role: &Role) -> Result<i64, StoreError> {
		// Soft-deleted users still reference the role through user_roles,
		// so they count against hard deletion.
		Ok(sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
			.bind(role.id)
			.fetch_one(&*self.db)
			.await?)
	}

	async fn invalidate_sessions(&self, user_ids: &[Uuid]) -> Result<u64, StoreError> {
		let result = sqlx::query("UPDATE sessions SET expires_at = NOW() WHERE user_id = ANY($1) AND expires_at > NOW()")
			.bind(user_ids.to_vec())
			.execute(&*self.db)
			.await?;

		Ok(result.rows_affected())
	}
}
