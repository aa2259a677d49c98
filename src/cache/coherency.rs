use std::sync::Arc;

use uuid::Uuid;

use super::{CacheKeys, PermissionCache};
use crate::database::Role;
use crate::error::Result;
use crate::store::UserStore;

/// Keeps cached projections from diverging from the registries.
///
/// Every mutation to a role, user, or permission funnels through here so
/// the set of stale keys is decided in exactly one place. Invalidation is
/// not best-effort: a failure propagates to the caller rather than leaving
/// the cache silently stale past its TTL.
pub struct CacheCoherency {
	cache: Arc<dyn PermissionCache>,
	keys: CacheKeys,
	users: Arc<dyn UserStore>,
}

impl CacheCoherency {
	pub fn new(cache: Arc<dyn PermissionCache>, keys: CacheKeys, users: Arc<dyn UserStore>) -> Self {
		Self { cache, keys, users }
	}

	/// Invalidation for a role mutation: update, soft/hard delete, or
	/// restore.
	///
	/// Drops the role projections and the paginated listing keyspace, then
	/// fans out to every active holder of the role: their permission and
	/// session projections are dropped and their database sessions expired,
	/// so a previously issued token cannot keep rights the role no longer
	/// grants.
	pub async fn role_changed(&self, role: &Role) -> Result<()> {
		let mut stale = vec![self.keys.role(role.id), self.keys.role_permissions(&role.name)];

		let holders = self.users.users_holding_role(role).await?;
		for user_id in &holders {
			stale.push(self.keys.user_permissions(*user_id));
			stale.push(self.keys.user(*user_id));
			stale.push(self.keys.session(*user_id));
		}

		self.cache.delete(&stale).await?;
		self.cache.incr(&self.keys.roles_page_version()).await?;

		if !holders.is_empty() {
			self.users.invalidate_sessions(&holders).await?;
		}

		tracing::debug!(role = %role.name, holders = holders.len(), "invalidated role projections");

		Ok(())
	}

	/// Invalidation for a role rename: the projection under the old
	/// canonical name must go as well.
	pub async fn role_renamed(&self, old_name: &str) -> Result<()> {
		self.cache.delete(&[self.keys.role_permissions(old_name)]).await?;
		Ok(())
	}

	/// Invalidation for a personalized permission create/update/delete.
	pub async fn user_permissions_changed(&self, user_id: Uuid) -> Result<()> {
		self.cache
			.delete(&[self.keys.user_permissions(user_id), self.keys.user(user_id)])
			.await?;

		tracing::debug!(user = %user_id, "invalidated user permission projections");

		Ok(())
	}
}
