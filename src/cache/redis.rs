use std::sync::Arc;
use std::time::Duration;

use fred::interfaces::KeysInterface;
use fred::types::Expiration;

use super::{CacheError, PermissionCache};

/// The production cache, backed by a Redis connection pool.
pub struct RedisCache {
	redis: Arc<fred::clients::RedisPool>,
}

impl RedisCache {
	pub fn new(redis: Arc<fred::clients::RedisPool>) -> Self {
		Self { redis }
	}
}

#[async_trait::async_trait]
impl PermissionCache for RedisCache {
	async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
		Ok(self.redis.get(key).await?)
	}

	async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
		let _: () = self
			.redis
			.set(key, value, Some(Expiration::EX(ttl.as_secs() as i64)), None, false)
			.await?;
		Ok(())
	}

	async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
		if keys.is_empty() {
			return Ok(());
		}
		let _: u64 = self.redis.del(keys.to_vec()).await?;
		Ok(())
	}

	async fn incr(&self, key: &str) -> Result<i64, CacheError> {
		Ok(self.redis.incr(key).await?)
	}
}
