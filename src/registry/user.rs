use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cache::{get_json, set_json, CacheCoherency, CacheKeys, PermissionCache};
use crate::database::{Permission, User};
use crate::error::{AccessError, Result};
use crate::store::UserStore;

/// Owns user records and their personalized permission overrides.
///
/// This layer performs no caller-authorization checks; deciding who may
/// edit permissions is the resolver's job, through the merge engine.
pub struct UserRegistry {
	store: Arc<dyn UserStore>,
	cache: Arc<dyn PermissionCache>,
	keys: CacheKeys,
	coherency: Arc<CacheCoherency>,
	ttl: Duration,
}

impl UserRegistry {
	pub fn new(
		store: Arc<dyn UserStore>,
		cache: Arc<dyn PermissionCache>,
		keys: CacheKeys,
		coherency: Arc<CacheCoherency>,
		ttl: Duration,
	) -> Self {
		Self {
			store,
			cache,
			keys,
			coherency,
			ttl,
		}
	}

	/// The user info projection, cache-then-database.
	pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
		let key = self.keys.user(user_id);

		if let Some(user) = get_json::<User>(&*self.cache, &key).await? {
			return Ok(Some(user));
		}

		let Some(user) = self.store.find_user_by_id(user_id).await? else {
			return Ok(None);
		};

		set_json(&*self.cache, &key, &user, self.ttl).await?;

		Ok(Some(user))
	}

	/// Raw personal overrides, unmerged, cache-then-database.
	///
	/// An empty list is cached like any other value; the next read is a
	/// hit, not a recompute.
	pub async fn personalized_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>> {
		let key = self.keys.user_permissions(user_id);

		if let Some(permissions) = get_json::<Vec<Permission>>(&*self.cache, &key).await? {
			return Ok(permissions);
		}

		let permissions = self.store.personalized_permissions(user_id).await?;

		set_json(&*self.cache, &key, &permissions, self.ttl).await?;

		Ok(permissions)
	}

	/// Upserts overrides for the user, one per entity name, and returns
	/// the refreshed user.
	pub async fn update_personalized_permissions(&self, user_id: Uuid, permissions: Vec<Permission>) -> Result<User> {
		if self.store.find_user_by_id(user_id).await?.is_none() {
			return Err(AccessError::NotFound {
				resource: "user",
				ids: vec![user_id],
			});
		}

		// Later entries win when the caller repeats an entity.
		let mut deduped: Vec<Permission> = Vec::with_capacity(permissions.len());
		for permission in permissions {
			match deduped.iter_mut().find(|p| p.entity_name == permission.entity_name) {
				Some(existing) => *existing = permission,
				None => deduped.push(permission),
			}
		}

		self.store.upsert_personalized_permissions(user_id, &deduped).await?;
		self.coherency.user_permissions_changed(user_id).await?;

		self.store
			.find_user_by_id(user_id)
			.await?
			.ok_or(AccessError::NotFound {
				resource: "user",
				ids: vec![user_id],
			})
	}

	/// Removes every personalized override, demoting the user to pure
	/// role-based permissions.
	pub async fn delete_personalized_permissions(&self, user_id: Uuid) -> Result<u64> {
		let deleted = self.store.delete_personalized_permissions(user_id).await?;
		self.coherency.user_permissions_changed(user_id).await?;
		Ok(deleted)
	}

	pub async fn is_username_available(&self, username: &str, exclude_user_id: Option<Uuid>) -> Result<bool> {
		Ok(!self.store.is_username_taken(username, exclude_user_id).await?)
	}
}
