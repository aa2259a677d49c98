use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{CacheError, PermissionCache};

/// An in-process cache with the same hit/miss semantics as Redis. Used by
/// the test suite and for cache-less local runs.
#[derive(Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
	value: String,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self) -> bool {
		self.expires_at.is_some_and(|at| at <= Instant::now())
	}
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a live entry exists for the key. Test helper.
	pub fn contains(&self, key: &str) -> bool {
		self.entries
			.lock()
			.unwrap()
			.get(key)
			.map(|e| !e.is_expired())
			.unwrap_or(false)
	}
}

#[async_trait::async_trait]
impl PermissionCache for MemoryCache {
	async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
		let mut entries = self.entries.lock().unwrap();
		match entries.get(key) {
			Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
			Some(_) => {
				entries.remove(key);
				Ok(None)
			}
			None => Ok(None),
		}
	}

	async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
		self.entries.lock().unwrap().insert(
			key.to_string(),
			Entry {
				value,
				expires_at: Some(Instant::now() + ttl),
			},
		);
		Ok(())
	}

	async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
		let mut entries = self.entries.lock().unwrap();
		for key in keys {
			entries.remove(key);
		}
		Ok(())
	}

	async fn incr(&self, key: &str) -> Result<i64, CacheError> {
		let mut entries = self.entries.lock().unwrap();
		let next = entries
			.get(key)
			.filter(|e| !e.is_expired())
			.and_then(|e| e.value.parse::<i64>().ok())
			.unwrap_or(0)
			+ 1;
		entries.insert(
			key.to_string(),
			Entry {
				value: next.to_string(),
				expires_at: None,
			},
		);
		Ok(next)
	}
}
