use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context as _;
use fred::interfaces::ClientLike;
use fred::types::ServerConfig;
use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions;

use crate::auth::PermissionEngine;
use crate::cache::{CacheCoherency, CacheKeys, PermissionCache, RedisCache};
use crate::config::{AccessConfig, DatabaseConfig, RedisConfig};
use crate::registry::{RoleRegistry, UserRegistry};
use crate::store::{PostgresStore, RoleStore, UserStore};

/// The wired-up access-control core, constructed once at process start and
/// handed to every request handler. No module-scope handles anywhere.
pub struct GlobalState {
	pub config: AccessConfig,
	pub role_registry: Arc<RoleRegistry>,
	pub user_registry: Arc<UserRegistry>,
	pub permission_engine: Arc<PermissionEngine>,
}

impl GlobalState {
	/// Wires the registries, coherency controller, and merge engine over
	/// the given store and cache implementations.
	pub fn new(
		config: AccessConfig,
		role_store: Arc<dyn RoleStore>,
		user_store: Arc<dyn UserStore>,
		cache: Arc<dyn PermissionCache>,
	) -> Self {
		let keys = CacheKeys::new(config.key_prefix.clone());
		let ttl = config.cache_ttl();

		let coherency = Arc::new(CacheCoherency::new(cache.clone(), keys.clone(), user_store.clone()));

		let role_registry = Arc::new(RoleRegistry::new(
			role_store,
			user_store.clone(),
			cache.clone(),
			keys.clone(),
			coherency.clone(),
			ttl,
			config.max_page_limit,
		));

		let user_registry = Arc::new(UserRegistry::new(user_store, cache, keys, coherency, ttl));

		let permission_engine = Arc::new(PermissionEngine::new(role_registry.clone(), user_registry.clone()));

		Self {
			config,
			role_registry,
			user_registry,
			permission_engine,
		}
	}

	/// Connects to the database and Redis and wires the production
	/// implementations.
	pub async fn connect(config: AccessConfig) -> anyhow::Result<Self> {
		let db = setup_database(&config.database).await?;
		let redis = setup_redis(&config.redis).await?;

		let store = Arc::new(PostgresStore::new(db));
		let cache = Arc::new(RedisCache::new(redis));

		Ok(Self::new(config, store.clone(), store, cache))
	}
}

pub async fn setup_database(config: &DatabaseConfig) -> anyhow::Result<Arc<sqlx::PgPool>> {
	let options = PgConnectOptions::from_str(&config.uri)
		.context("invalid database uri")?
		.disable_statement_logging()
		.to_owned();

	let db = sqlx::PgPool::connect_with(options)
		.await
		.context("failed to connect to database")?;

	tracing::info!("connected to database");

	Ok(Arc::new(db))
}

pub async fn setup_redis(config: &RedisConfig) -> anyhow::Result<Arc<fred::clients::RedisPool>> {
	let hosts = config
		.addresses
		.iter()
		.map(|host| fred::types::Server::try_from(host.as_str()).context("failed to parse redis server address"))
		.collect::<anyhow::Result<Vec<_>>>()?;

	let server = if let Some(sentinel) = &config.sentinel {
		ServerConfig::Sentinel {
			hosts,
			service_name: sentinel.service_name.clone(),
		}
	} else if hosts.len() == 1 {
		ServerConfig::Centralized {
			server: hosts.into_iter().next().unwrap(),
		}
	} else {
		ServerConfig::Clustered { hosts }
	};

	let redis = Arc::new(
		fred::clients::RedisPool::new(
			fred::types::RedisConfig {
				database: Some(config.database),
				password: config.password.clone(),
				username: config.username.clone(),
				server,
				..Default::default()
			},
			None,
			None,
			None,
			config.pool_size,
		)
		.context("failed to create redis pool")?,
	);

	redis.connect();
	redis.wait_for_connect().await.context("failed to connect to redis")?;

	tracing::info!("connected to redis");

	Ok(redis)
}
