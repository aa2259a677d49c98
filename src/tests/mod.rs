use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::Actor;
use crate::cache::MemoryCache;
use crate::config::AccessConfig;
use crate::database::{Action, EntityName, Permission, Role, Session, User};
use crate::global::GlobalState;
use crate::store::MemoryStore;

mod auth;
mod cache;
mod user;

struct TestHarness {
	global: GlobalState,
	store: Arc<MemoryStore>,
	cache: Arc<MemoryCache>,
}

fn harness() -> TestHarness {
	let store = Arc::new(MemoryStore::new());
	let cache = Arc::new(MemoryCache::new());
	let global = GlobalState::new(AccessConfig::default(), store.clone(), store.clone(), cache.clone());

	TestHarness { global, store, cache }
}

fn perm(entity: EntityName, actions: Action) -> Permission {
	Permission::grant(entity, actions)
}

fn test_user(roles: &[&Role]) -> User {
	User {
		id: Uuid::new_v4(),
		username: format!("user-{}", Uuid::new_v4().simple()),
		roles: roles.iter().map(|r| r.id).collect(),
		created_at: Utc::now(),
		..Default::default()
	}
}

fn actor_for(user: &User, roles: &[&Role]) -> Actor {
	Actor::new(user.id, roles.iter().map(|r| r.name.as_str()))
}

fn super_admin() -> Actor {
	Actor::new(Uuid::new_v4(), ["SUPER ADMIN"])
}

fn anyone() -> Actor {
	Actor::new(Uuid::new_v4(), ["ADMIN"])
}

fn valid_session(user_id: Uuid) -> Session {
	Session {
		id: Uuid::new_v4(),
		user_id,
		expires_at: Utc::now() + Duration::days(7),
		last_used_at: Utc::now(),
	}
}
