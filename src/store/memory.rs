use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RolePageQuery, RoleSort, RoleStore, SortOrder, StoreError, UserStore};
use crate::database::{Permission, Role, Session, User};

/// An in-process store with the same observable semantics as the
/// relational one. Used by the test suite and for cache-less local runs.
#[derive(Default)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
	role_name_loads: AtomicU64,
	permission_loads: AtomicU64,
}

#[derive(Default)]
struct Inner {
	roles: HashMap<Uuid, Role>,
	users: HashMap<Uuid, User>,
	sessions: Vec<Session>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_user(&self, user: User) {
		self.inner.lock().unwrap().users.insert(user.id, user);
	}

	pub fn insert_session(&self, session: Session) {
		self.inner.lock().unwrap().sessions.push(session);
	}

	pub fn sessions_for(&self, user_id: Uuid) -> Vec<Session> {
		self.inner
			.lock()
			.unwrap()
			.sessions
			.iter()
			.filter(|s| s.user_id == user_id)
			.cloned()
			.collect()
	}

	/// How many times roles were loaded by name. Lets tests assert that a
	/// read was served from cache.
	pub fn role_name_loads(&self) -> u64 {
		self.role_name_loads.load(Ordering::Relaxed)
	}

	/// How many times personalized permissions were loaded.
	pub fn permission_loads(&self) -> u64 {
		self.permission_loads.load(Ordering::Relaxed)
	}
}

#[async_trait::async_trait]
impl RoleStore for MemoryStore {
	async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
		self.inner.lock().unwrap().roles.insert(role.id, role.clone());
		Ok(())
	}

	async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>, StoreError> {
		Ok(self.inner.lock().unwrap().roles.get(&id).cloned())
	}

	async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
		self.role_name_loads.fetch_add(1, Ordering::Relaxed);
		Ok(self
			.inner
			.lock()
			.unwrap()
			.roles
			.values()
			.find(|r| r.deleted_at.is_none() && r.name.eq_ignore_ascii_case(name))
			.cloned())
	}

	async fn is_role_name_taken(&self, name: &str) -> Result<bool, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.roles
			.values()
			.any(|r| r.name.eq_ignore_ascii_case(name)))
	}

	async fn replace_role(&self, role: &Role) -> Result<(), StoreError> {
		self.inner.lock().unwrap().roles.insert(role.id, role.clone());
		Ok(())
	}

	async fn set_role_deleted_at(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<(), StoreError> {
		if let Some(role) = self.inner.lock().unwrap().roles.get_mut(&id) {
			role.deleted_at = deleted_at;
		}
		Ok(())
	}

	async fn delete_roles(&self, ids: &[Uuid]) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		for id in ids {
			inner.roles.remove(id);
		}
		// Mirror the cascading join-row cleanup of the relational store.
		for user in inner.users.values_mut() {
			user.roles.retain(|id| !ids.contains(id));
		}
		Ok(())
	}

	async fn list_roles(&self, query: &RolePageQuery) -> Result<(Vec<Role>, i64), StoreError> {
		let inner = self.inner.lock().unwrap();

		let needle = query.search.as_ref().map(|s| s.to_lowercase());

		let mut matches: Vec<Role> = inner
			.roles
			.values()
			.filter(|r| r.deleted_at.is_none())
			.filter(|r| match &needle {
				Some(needle) => {
					r.name.to_lowercase().contains(needle)
						|| r.description
							.as_ref()
							.is_some_and(|d| d.to_lowercase().contains(needle))
				}
				None => true,
			})
			.cloned()
			.collect();

		match query.sort_by {
			RoleSort::Name => matches.sort_by(|a, b| a.name.cmp(&b.name)),
			RoleSort::CreatedAt => matches.sort_by_key(|r| r.created_at),
		}
		if query.order == SortOrder::Desc {
			matches.reverse();
		}

		let total = matches.len() as i64;
		let offset = ((query.page - 1).max(0) * query.limit) as usize;
		let page = matches
			.into_iter()
			.skip(offset)
			.take(query.limit.max(0) as usize)
			.collect();

		Ok((page, total))
	}
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
	async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
		Ok(self.inner.lock().unwrap().users.get(&id).cloned())
	}

	async fn personalized_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError> {
		self.permission_loads.fetch_add(1, Ordering::Relaxed);
		Ok(self
			.inner
			.lock()
			.unwrap()
			.users
			.get(&user_id)
			.map(|u| u.personalized_permissions.clone())
			.unwrap_or_default())
	}

	async fn upsert_personalized_permissions(
		&self,
		user_id: Uuid,
		permissions: &[Permission],
	) -> Result<Vec<Permission>, StoreError> {
		let mut inner = self.inner.lock().unwrap();
		let Some(user) = inner.users.get_mut(&user_id) else {
			return Ok(Vec::new());
		};

		let mut upserted = Vec::with_capacity(permissions.len());

		for permission in permissions {
			match user
				.personalized_permissions
				.iter_mut()
				.find(|p| p.entity_name == permission.entity_name)
			{
				// Update in place: identity and creation time are kept.
				Some(existing) => {
					existing.description = permission.description.clone();
					existing.can_create = permission.can_create;
					existing.can_read = permission.can_read;
					existing.can_update = permission.can_update;
					existing.can_delete = permission.can_delete;
					upserted.push(existing.clone());
				}
				None => {
					user.personalized_permissions.push(permission.clone());
					upserted.push(permission.clone());
				}
			}
		}

		Ok(upserted)
	}

	async fn delete_personalized_permissions(&self, user_id: Uuid) -> Result<u64, StoreError> {
		let mut inner = self.inner.lock().unwrap();
		Ok(inner
			.users
			.get_mut(&user_id)
			.map(|u| std::mem::take(&mut u.personalized_permissions).len() as u64)
			.unwrap_or(0))
	}

	async fn is_username_taken(&self, username: &str, exclude_user_id: Option<Uuid>) -> Result<bool, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.users
			.values()
			.any(|u| {
				u.deleted_at.is_none()
					&& u.username.eq_ignore_ascii_case(username)
					&& Some(u.id) != exclude_user_id
			}))
	}

	async fn users_holding_role(&self, role: &Role) -> Result<Vec<Uuid>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.users
			.values()
			.filter(|u| u.is_active() && u.roles.contains(&role.id))
			.map(|u| u.id)
			.collect())
	}

	async fn count_users_holding_role(&self, role: &Role) -> Result<i64, StoreError> {
		// Counts soft-deleted users too; their reference alone blocks
		// hard deletion.
		Ok(self
			.inner
			.lock()
			.unwrap()
			.users
			.values()
			.filter(|u| u.roles.contains(&role.id))
			.count() as i64)
	}

	async fn invalidate_sessions(&self, user_ids: &[Uuid]) -> Result<u64, StoreError> {
		let now = Utc::now();
		let mut invalidated = 0;

		for session in &mut self.inner.lock().unwrap().sessions {
			if user_ids.contains(&session.user_id) && session.expires_at > now {
				session.expires_at = now;
				invalidated += 1;
			}
		}

		Ok(invalidated)
	}
}
