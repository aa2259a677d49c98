use super::*;
use crate::error::AccessError;
use crate::registry::NewRole;

async fn editor_and_reviewer(harness: &TestHarness) -> (Role, Role) {
	let editor = harness
		.global
		.role_registry
		.create_role(NewRole {
			name: "EDITOR".to_string(),
			default_permissions: vec![perm(EntityName::Product, Action::Read)],
			..Default::default()
		})
		.await
		.unwrap();

	let reviewer = harness
		.global
		.role_registry
		.create_role(NewRole {
			name: "REVIEWER".to_string(),
			default_permissions: vec![perm(EntityName::Product, Action::Read | Action::Update)],
			..Default::default()
		})
		.await
		.unwrap();

	(editor, reviewer)
}

#[tokio::test]
async fn or_merge_across_roles() {
	let harness = harness();
	let (editor, reviewer) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor, &reviewer]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor, &reviewer]);

	let engine = &harness.global.permission_engine;

	// EDITOR alone cannot update, REVIEWER alone can; holding both means
	// the grant from either role sticks.
	assert!(engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());
	assert!(engine.check_permission(&actor, EntityName::Product, Action::Read).await.unwrap());
	assert!(!engine.check_permission(&actor, EntityName::Product, Action::Delete).await.unwrap());
}

#[tokio::test]
async fn merge_never_removes_a_single_role_grant() {
	let harness = harness();
	let (editor, reviewer) = editor_and_reviewer(&harness).await;

	let solo = test_user(&[&reviewer]);
	harness.store.insert_user(solo.clone());
	let solo_actor = actor_for(&solo, &[&reviewer]);

	let both = test_user(&[&editor, &reviewer]);
	harness.store.insert_user(both.clone());
	let both_actor = actor_for(&both, &[&editor, &reviewer]);

	let engine = &harness.global.permission_engine;

	for action in [Action::Read, Action::Update] {
		if engine.check_permission(&solo_actor, EntityName::Product, action).await.unwrap() {
			assert!(engine.check_permission(&both_actor, EntityName::Product, action).await.unwrap());
		}
	}
}

#[tokio::test]
async fn personalized_override_wins_even_to_deny() {
	let harness = harness();
	let (editor, reviewer) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor, &reviewer]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor, &reviewer]);

	// An explicit personal record for Product that denies update.
	harness
		.global
		.user_registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Product, Action::Read)])
		.await
		.unwrap();

	let engine = &harness.global.permission_engine;

	assert!(!engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());
	assert!(engine.check_permission(&actor, EntityName::Product, Action::Read).await.unwrap());
}

#[tokio::test]
async fn personalized_record_for_other_entity_falls_back_to_roles() {
	let harness = harness();
	let (editor, reviewer) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor, &reviewer]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor, &reviewer]);

	harness
		.global
		.user_registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Order, Action::Create)])
		.await
		.unwrap();

	let engine = &harness.global.permission_engine;

	// The Order override does not shadow role evaluation for Product.
	assert!(engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap());
	assert!(engine.check_permission(&actor, EntityName::Order, Action::Create).await.unwrap());
}

#[tokio::test]
async fn entity_no_role_mentions_is_denied() {
	let harness = harness();
	let (editor, _) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor]);

	let engine = &harness.global.permission_engine;

	assert!(!engine.check_permission(&actor, EntityName::SiteSettings, Action::Read).await.unwrap());
}

#[tokio::test]
async fn check_is_idempotent_across_cache_population() {
	let harness = harness();
	let (editor, reviewer) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor, &reviewer]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor, &reviewer]);

	let engine = &harness.global.permission_engine;

	let first = engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap();

	let role_loads = harness.store.role_name_loads();
	let permission_loads = harness.store.permission_loads();

	let second = engine.check_permission(&actor, EntityName::Product, Action::Update).await.unwrap();

	assert_eq!(first, second);
	// The second call must be served entirely from cache.
	assert_eq!(harness.store.role_name_loads(), role_loads);
	assert_eq!(harness.store.permission_loads(), permission_loads);
}

#[tokio::test]
async fn effective_permissions_layer_overrides_on_role_merge() {
	let harness = harness();
	let (editor, reviewer) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor, &reviewer]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor, &reviewer]);

	harness
		.global
		.user_registry
		.update_personalized_permissions(user.id, vec![perm(EntityName::Product, Action::Delete)])
		.await
		.unwrap();

	let effective = harness.global.permission_engine.effective_permissions(&actor).await.unwrap();

	// The personal record replaces the role merge for Product wholesale.
	assert_eq!(effective[&EntityName::Product], Action::Delete);
	assert!(!effective.contains_key(&EntityName::SiteSettings));
}

#[tokio::test]
async fn authorize_requires_an_actor_and_a_grant() {
	let harness = harness();
	let (editor, _) = editor_and_reviewer(&harness).await;

	let user = test_user(&[&editor]);
	harness.store.insert_user(user.clone());
	let actor = actor_for(&user, &[&editor]);

	let engine = &harness.global.permission_engine;

	let err = engine.authorize(None, EntityName::Product, Action::Read).await.unwrap_err();
	assert!(matches!(err, AccessError::AuthenticationRequired));

	let err = engine
		.authorize(Some(&actor), EntityName::Product, Action::Delete)
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::PermissionDenied { .. }));
	assert_eq!(err.to_string(), "you do not have permission to delete Product");

	assert!(engine.authorize(Some(&actor), EntityName::Product, Action::Read).await.is_ok());
}
