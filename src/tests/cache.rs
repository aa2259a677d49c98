use super::*;
use crate::cache::CacheKeys;
use crate::registry::{NewRole, RoleUpdate};
use crate::store::RolePageQuery;

fn keys() -> CacheKeys {
	CacheKeys::new("platform")
}

#[test]
fn search_terms_cannot_forge_page_key_segments() {
	let keys = keys();

	// A search carrying the segment delimiter must not collide with a
	// differently parameterized page key.
	let crafted = keys.roles_page(0, 1, 10, Some("x:sort:name"), "name", "ASC");
	let plain = keys.roles_page(0, 1, 10, Some("x"), "name", "ASC");

	assert_ne!(crafted, plain);
	assert!(!crafted.contains("x:sort:name"));
}

#[tokio::test]
async fn an_empty_override_list_is_a_cache_hit_not_a_miss() {
	let harness = harness();

	let user = test_user(&[]);
	harness.store.insert_user(user.clone());

	let first = harness.global.user_registry.personalized_permissions(user.id).await.unwrap();
	assert!(first.is_empty());

	// The empty list is cached under a live key.
	assert!(harness.cache.contains(&keys().user_permissions(user.id)));

	let loads = harness.store.permission_loads();
	let second = harness.global.user_registry.personalized_permissions(user.id).await.unwrap();
	assert!(second.is_empty());
	assert_eq!(harness.store.permission_loads(), loads);
}

#[tokio::test]
async fn role_update_is_visible_to_every_holder() {
	let harness = harness();

	let role = harness
		.global
		.role_registry
		.create_role(NewRole {
			name: "EDITOR".to_string(),
			default_permissions: vec![perm(EntityName::Product, Action::Read | Action::Update)],
			..Default::default()
		})
		.await
		.unwrap();

	let user = test_user(&[&role]);
	harness.store.insert_user(user.clone());
	harness.store.insert_session(valid_session(user.id));
	let actor = actor_for(&user, &[&role]);

	let engine = &harness.global.permission_engine;

	// Populate the cache with the pre-update projection.
	assert!(engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());

	harness
		.global
		.role_registry
		.update_role_info(
			&anyone(),
			role.id,
			RoleUpdate {
				default_permissions: Some(vec![perm(EntityName::Product, Action::Read)]),
				..Default::default()
			},
		)
		.await
		.unwrap();

	// The next check must not read the pre-update cached value.
	assert!(!engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());

	// Previously issued sessions were invalidated along with the cache.
	assert!(harness.store.sessions_for(user.id).iter().all(|s| !s.is_valid()));
}

#[tokio::test]
async fn rename_drops_the_projection_under_the_old_name() {
	let harness = harness();
	let registry = &harness.global.role_registry;

	let role = registry
		.create_role(NewRole {
			name: "EDITOR".to_string(),
			..Default::default()
		})
		.await
		.unwrap();

	// Cache the projection under the old name.
	assert!(registry.find_role_by_name("EDITOR").await.unwrap().is_some());

	registry
		.update_role_info(
			&anyone(),
			role.id,
			RoleUpdate {
				name: Some("PUBLISHER".to_string()),
				..Default::default()
			},
		)
		.await
		.unwrap();

	assert!(registry.find_role_by_name("EDITOR").await.unwrap().is_none());
	assert!(registry.find_role_by_name("publisher").await.unwrap().is_some());
}

#[tokio::test]
async fn soft_delete_removes_the_role_from_name_lookups() {
	let harness = harness();
	let registry = &harness.global.role_registry;

	let role = registry
		.create_role(NewRole {
			name: "EDITOR".to_string(),
			..Default::default()
		})
		.await
		.unwrap();

	assert!(registry.find_role_by_name("EDITOR").await.unwrap().is_some());

	registry.soft_delete_role(&anyone(), role.id).await.unwrap();

	assert!(registry.find_role_by_name("EDITOR").await.unwrap().is_none());
}

#[tokio::test]
async fn paginated_listings_refresh_after_a_role_mutation() {
	let harness = harness();
	let registry = &harness.global.role_registry;

	registry
		.create_role(NewRole {
			name: "EDITOR".to_string(),
			..Default::default()
		})
		.await
		.unwrap();

	let query = RolePageQuery {
		page: 1,
		limit: 10,
		..Default::default()
	};

	let page = registry.paginate_roles(query.clone()).await.unwrap();
	assert_eq!(page.total, 1);

	registry
		.create_role(NewRole {
			name: "REVIEWER".to_string(),
			..Default::default()
		})
		.await
		.unwrap();

	// The creation bumped the listing version; the cached page for the
	// old version is orphaned rather than served.
	let page = registry.paginate_roles(query).await.unwrap();
	assert_eq!(page.total, 2);
}

#[tokio::test]
async fn name_lookup_is_read_through() {
	let harness = harness();
	let registry = &harness.global.role_registry;

	registry
		.create_role(NewRole {
			name: "EDITOR".to_string(),
			..Default::default()
		})
		.await
		.unwrap();

	assert!(registry.find_role_by_name("editor").await.unwrap().is_some());
	assert!(harness.cache.contains(&keys().role_permissions("EDITOR")));

	let loads = harness.store.role_name_loads();
	assert!(registry.find_role_by_name("Editor").await.unwrap().is_some());
	assert_eq!(harness.store.role_name_loads(), loads);
}

#[tokio::test]
async fn personalized_permission_changes_drop_the_user_projections() {
	let harness = harness();

	let user = test_user(&[]);
	harness.store.insert_user(user.clone());

	// Populate both user projections.
	harness.global.user_registry.get_user(user.id).await.unwrap();
	harness.global.user_registry.personalized_permissions(user.id).await.unwrap();
	assert!(harness.cache.contains(&keys().user(user.id)));
	assert!(harness.cache.contains(&keys().user_permissions(user.id)));

	harness
		.global
		.user_registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Product, Action::Read)])
		.await
		.unwrap();

	assert!(!harness.cache.contains(&keys().user(user.id)));
	assert!(!harness.cache.contains(&keys().user_permissions(user.id)));

	let refreshed = harness.global.user_registry.personalized_permissions(user.id).await.unwrap();
	assert_eq!(refreshed.len(), 1);
}
