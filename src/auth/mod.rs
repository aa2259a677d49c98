use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::database::{Action, EntityName, SUPER_ADMIN_ROLE};
use crate::error::{AccessError, Result};
use crate::registry::{RoleRegistry, UserRegistry};

/// The authenticated actor of a request, resolved by the session layer
/// before any permission check runs.
#[derive(Debug, Clone, Default)]
pub struct Actor {
	pub id: Uuid,
	/// Names of the roles the actor holds.
	pub roles: Vec<String>,
}

impl Actor {
	pub fn new(id: Uuid, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			id,
			roles: roles.into_iter().map(Into::into).collect(),
		}
	}

	/// Whether the actor may bypass the non-permanent protection flags.
	pub fn is_super_admin(&self) -> bool {
		self.roles.iter().any(|r| r.eq_ignore_ascii_case(SUPER_ADMIN_ROLE))
	}
}

/// The single authorization decision point.
///
/// Two-tier policy: a personalized permission record for an entity is
/// authoritative when present, both to allow and to deny; otherwise the
/// actor's roles are OR-merged per entity, so a user holding several roles
/// may do whatever any one of them allows.
pub struct PermissionEngine {
	roles: Arc<RoleRegistry>,
	users: Arc<UserRegistry>,
}

impl PermissionEngine {
	pub fn new(roles: Arc<RoleRegistry>, users: Arc<UserRegistry>) -> Self {
		Self { roles, users }
	}

	/// Can the actor perform `action` on `entity`?
	pub async fn check_permission(&self, actor: &Actor, entity: EntityName, action: Action) -> Result<bool> {
		// Personal overrides short-circuit role evaluation entirely: an
		// explicit record wins even when it denies an action a role would
		// allow.
		let personalized = self.users.personalized_permissions(actor.id).await?;
		if let Some(record) = personalized.iter().find(|p| p.entity_name == entity) {
			return Ok(record.allows(action));
		}

		let merged = self.role_merge(actor).await?;

		Ok(merged.get(&entity).map(|granted| granted.allows(action)).unwrap_or(false))
	}

	/// Like [`check_permission`](Self::check_permission), but denial is an
	/// error carrying the user-facing message.
	pub async fn require(&self, actor: &Actor, entity: EntityName, action: Action) -> Result<()> {
		if self.check_permission(actor, entity, action).await? {
			Ok(())
		} else {
			Err(AccessError::PermissionDenied { entity, action })
		}
	}

	/// Gate used by resolvers: the actor must be present and allowed.
	pub async fn authorize<'a>(&self, actor: Option<&'a Actor>, entity: EntityName, action: Action) -> Result<&'a Actor> {
		let actor = actor.ok_or(AccessError::AuthenticationRequired)?;
		self.require(actor, entity, action).await?;
		Ok(actor)
	}

	/// The full effective permission map: the OR-merge of every held
	/// role's defaults, with personal overrides layered on top per entity.
	pub async fn effective_permissions(&self, actor: &Actor) -> Result<HashMap<EntityName, Action>> {
		let mut merged = self.role_merge(actor).await?;

		for record in self.users.personalized_permissions(actor.id).await? {
			merged.insert(record.entity_name, record.granted());
		}

		Ok(merged)
	}

	/// OR-merge of all held roles' default permissions, grouped by entity
	/// name. Entities no role mentions are absent, which reads as "deny".
	async fn role_merge(&self, actor: &Actor) -> Result<HashMap<EntityName, Action>> {
		let roles = self.roles.find_roles_by_names(&actor.roles).await?;

		let mut merged: HashMap<EntityName, Action> = HashMap::new();
		for record in roles.iter().flat_map(|r| &r.default_permissions) {
			let granted = merged.entry(record.entity_name).or_default();
			*granted |= record.granted();
		}

		Ok(merged)
	}
}
