use super::*;
use crate::error::AccessError;
use crate::registry::NewRole;

#[tokio::test]
async fn upsert_updates_in_place_and_keeps_record_identity() {
	let harness = harness();
	let registry = &harness.global.user_registry;

	let user = test_user(&[]);
	harness.store.insert_user(user.clone());

	registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Product, Action::Read)])
		.await
		.unwrap();

	let before = registry.personalized_permissions(user.id).await.unwrap();
	assert_eq!(before.len(), 1);
	let original_id = before[0].id;

	registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Product, Action::Read | Action::Update)])
		.await
		.unwrap();

	let after = registry.personalized_permissions(user.id).await.unwrap();
	assert_eq!(after.len(), 1);
	assert_eq!(after[0].id, original_id);
	assert!(after[0].can_update);
}

#[tokio::test]
async fn upsert_collapses_duplicate_entities_in_the_input() {
	let harness = harness();
	let registry = &harness.global.user_registry;

	let user = test_user(&[]);
	harness.store.insert_user(user.clone());

	registry
		.update_personalized_permissions(
			user.id,
			vec![
				perm(EntityName::Product, Action::Read),
				perm(EntityName::Product, Action::Delete),
			],
		)
		.await
		.unwrap();

	let permissions = registry.personalized_permissions(user.id).await.unwrap();
	assert_eq!(permissions.len(), 1);
	// Later entries win.
	assert!(permissions[0].can_delete);
	assert!(!permissions[0].can_read);
}

#[tokio::test]
async fn updating_an_unknown_user_is_not_found() {
	let harness = harness();

	let err = harness
		.global
		.user_registry
		.update_personalized_permissions(Uuid::new_v4(), vec![perm(EntityName::Product, Action::Read)])
		.await
		.unwrap_err();

	assert!(matches!(err, AccessError::NotFound { resource: "user", .. }));
}

#[tokio::test]
async fn deleting_overrides_demotes_to_role_permissions() {
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
	let actor = actor_for(&user, &[&role]);

	harness
		.global
		.user_registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Product, Action::Read)])
		.await
		.unwrap();

	let engine = &harness.global.permission_engine;
	assert!(!engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());

	let deleted = harness
		.global
		.user_registry
		.delete_personalized_permissions(user.id)
		.await
		.unwrap();
	assert_eq!(deleted, 1);

	// Role defaults apply again.
	assert!(engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());
}

#[tokio::test]
async fn username_availability_excludes_the_given_user() {
	let harness = harness();
	let registry = &harness.global.user_registry;

	let mut user = test_user(&[]);
	user.username = "marianne".to_string();
	harness.store.insert_user(user.clone());

	assert!(!registry.is_username_available("marianne", None).await.unwrap());
	assert!(!registry.is_username_available("MARIANNE", None).await.unwrap());
	assert!(registry.is_username_available("marianne", Some(user.id)).await.unwrap());
	assert!(registry.is_username_available("someone-else", None).await.unwrap());
}

#[tokio::test]
async fn get_user_is_read_through() {
	let harness = harness();
	let registry = &harness.global.user_registry;

	let user = test_user(&[]);
	harness.store.insert_user(user.clone());

	let loaded = registry.get_user(user.id).await.unwrap().unwrap();
	assert_eq!(loaded.id, user.id);

	// Second read is served from the cached projection.
	let keys = crate::cache::CacheKeys::new("platform");
	assert!(harness.cache.contains(&keys.user(user.id)));

	assert!(registry.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn raw_overrides_are_returned_unmerged() {
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

	harness
		.global
		.user_registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Order, Action::Read)])
		.await
		.unwrap();

	// Only the personal rows, no role-derived coverage mixed in.
	let raw = harness.global.user_registry.personalized_permissions(user.id).await.unwrap();
	assert_eq!(raw.len(), 1);
	assert_eq!(raw[0].entity_name, EntityName::Order);
}
