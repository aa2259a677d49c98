use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

mod coherency;
mod memory;
mod redis;

pub use coherency::CacheCoherency;
pub use memory::MemoryCache;
pub use redis::RedisCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	#[error("redis error: {0}")]
	Redis(#[from] fred::error::RedisError),
	#[error("serialization error: {0}")]
	Serde(#[from] serde_json::Error),
}

/// A key-value cache for permission/role/user projections.
///
/// The miss signal is key absence (`None`), never value emptiness: a
/// cached empty permission list is a real hit. Values are serialized to
/// JSON before being stored, so `"[]"` and "no entry" stay distinct.
#[async_trait::async_trait]
pub trait PermissionCache: Send + Sync {
	async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;
	async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
	async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
	/// Atomically increments a counter key, creating it at 0 first. Used
	/// to version the paginated-list keyspace.
	async fn incr(&self, key: &str) -> Result<i64, CacheError>;
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn PermissionCache, key: &str) -> Result<Option<T>, CacheError> {
	match cache.get_raw(key).await? {
		Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
		None => Ok(None),
	}
}

pub async fn set_json<T: Serialize>(
	cache: &dyn PermissionCache,
	key: &str,
	value: &T,
	ttl: Duration,
) -> Result<(), CacheError> {
	cache.set_raw(key, serde_json::to_string(value)?, ttl).await
}

/// Deterministic cache key builder.
///
/// Every projection the registries cache is keyed here so the coherency
/// controller and the read paths can never disagree on a key.
#[derive(Debug, Clone)]
pub struct CacheKeys {
	prefix: String,
}

impl CacheKeys {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}

	/// The personalized permission overrides of a user.
	pub fn user_permissions(&self, user_id: Uuid) -> String {
		format!("{}:user-permissions:{}", self.prefix, user_id)
	}

	/// The user info projection.
	pub fn user(&self, user_id: Uuid) -> String {
		format!("{}:user:{}", self.prefix, user_id)
	}

	/// The session projection of a user.
	pub fn session(&self, user_id: Uuid) -> String {
		format!("{}:session:{}", self.prefix, user_id)
	}

	/// A role and its default permissions, by canonical name.
	pub fn role_permissions(&self, role_name: &str) -> String {
		format!("{}:role-permissions:{}", self.prefix, role_name)
	}

	/// A role by id.
	pub fn role(&self, role_id: Uuid) -> String {
		format!("{}:role:{}", self.prefix, role_id)
	}

	/// The version counter for the paginated role listing keyspace.
	/// Bumping it orphans every cached page; orphans expire by TTL.
	pub fn roles_page_version(&self) -> String {
		format!("{}:roles:version", self.prefix)
	}

	/// One cached page of the role listing.
	pub fn roles_page(&self, version: i64, page: i64, limit: i64, search: Option<&str>, sort: &str, dir: &str) -> String {
		format!(
			"{}:roles:v{}:page:{}:limit:{}:search:{}:sort:{}:{}",
			self.prefix,
			version,
			page,
			limit,
			Self::escape(search.unwrap_or("")),
			sort,
			dir
		)
	}

	/// `:` delimits key segments, so caller-supplied components must not
	/// carry it raw. `%` is escaped first to keep the encoding injective.
	fn escape(component: &str) -> String {
		component.replace('%', "%25").replace(':', "%3A")
	}
}
