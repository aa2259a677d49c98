use std::time::Duration;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
/// Configuration of the access-control core. Consuming binaries merge
/// this from their own config files/environment.
pub struct AccessConfig {
	/// Prefix for every cache key issued by this service.
	pub key_prefix: String,

	/// TTL for cached projections, in seconds.
	pub cache_ttl_seconds: u64,

	/// Hard cap on the page size of role/user listings.
	pub max_page_limit: i64,

	/// Database config
	pub database: DatabaseConfig,

	/// Redis config
	pub redis: RedisConfig,
}

impl Default for AccessConfig {
	fn default() -> Self {
		Self {
			key_prefix: "platform".to_string(),
			cache_ttl_seconds: 3600,
			max_page_limit: 100,
			database: DatabaseConfig::default(),
			redis: RedisConfig::default(),
		}
	}
}

impl AccessConfig {
	pub fn cache_ttl(&self) -> Duration {
		Duration::from_secs(self.cache_ttl_seconds)
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
	/// The database URL to use
	pub uri: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			uri: "postgres://root@localhost:5432/platform_dev".to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RedisConfig {
	/// The addresses of the Redis servers
	pub addresses: Vec<String>,

	/// Number of connections to keep in the pool
	pub pool_size: usize,

	/// The username to use for authentication
	pub username: Option<String>,

	/// The password to use for authentication
	pub password: Option<String>,

	/// The database to use
	pub database: u8,

	/// To use Redis Sentinel
	pub sentinel: Option<RedisSentinelConfig>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RedisSentinelConfig {
	/// The master group name
	pub service_name: String,
}

impl Default for RedisConfig {
	fn default() -> Self {
		Self {
			addresses: vec!["localhost:6379".to_string()],
			pool_size: 10,
			username: None,
			password: None,
			database: 0,
			sentinel: None,
		}
	}
}
