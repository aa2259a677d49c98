use bitmask_enum::bitmask;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A protectable resource type. This is a closed set: every entity exposed
/// by the subgraphs that can carry access control is listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityName {
	User,
	Role,
	Permission,
	Product,
	Category,
	Order,
	SiteSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity name: {0}")]
pub struct UnknownEntityName(pub String);

impl EntityName {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::User => "User",
			Self::Role => "Role",
			Self::Permission => "Permission",
			Self::Product => "Product",
			Self::Category => "Category",
			Self::Order => "Order",
			Self::SiteSettings => "SiteSettings",
		}
	}

	pub const fn all() -> &'static [EntityName] {
		&[
			Self::User,
			Self::Role,
			Self::Permission,
			Self::Product,
			Self::Category,
			Self::Order,
			Self::SiteSettings,
		]
	}
}

impl std::fmt::Display for EntityName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for EntityName {
	type Err = UnknownEntityName;

	/// Entity names compare case-insensitively everywhere.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.iter()
			.find(|e| e.as_str().eq_ignore_ascii_case(s))
			.copied()
			.ok_or_else(|| UnknownEntityName(s.to_string()))
	}
}

impl sqlx::Type<sqlx::Postgres> for EntityName {
	fn type_info() -> sqlx::postgres::PgTypeInfo {
		<&str as sqlx::Type<sqlx::Postgres>>::type_info()
	}
}

impl sqlx::Decode<'_, sqlx::Postgres> for EntityName {
	fn decode(value: sqlx::postgres::PgValueRef<'_>) -> Result<Self, Box<dyn std::error::Error + 'static + Send + Sync>> {
		let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
		Ok(s.parse()?)
	}
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for EntityName {
	fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
		<&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
	}
}

/// The CRUD actions a permission record can grant.
#[bitmask(u8)]
pub enum Action {
	Create,
	Read,
	Update,
	Delete,
}

impl Default for Action {
	fn default() -> Self {
		Self::none()
	}
}

impl Action {
	/// Checks if the current action set contains the given actions.
	pub fn allows(&self, other: Self) -> bool {
		*self & other == other
	}

	/// The verb used in user-facing denial messages.
	pub fn verb(&self) -> &'static str {
		if *self == Self::Create {
			"create"
		} else if *self == Self::Read {
			"read"
		} else if *self == Self::Update {
			"update"
		} else if *self == Self::Delete {
			"delete"
		} else {
			"access"
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
/// One row of CRUD rights scoped to exactly one entity name.
///
/// A permission is exclusively owned by its parent: either a role (default
/// permission, inherited by every holder of the role) or a user
/// (personalized override). It has no independent lifecycle.
pub struct Permission {
	/// The unique identifier for the permission.
	pub id: Uuid,
	/// The entity this permission is scoped to.
	pub entity_name: EntityName,
	/// The description of the permission.
	pub description: Option<String>,
	/// Whether the owner can create records of this entity.
	pub can_create: bool,
	/// Whether the owner can read records of this entity.
	pub can_read: bool,
	/// Whether the owner can update records of this entity.
	pub can_update: bool,
	/// Whether the owner can delete records of this entity.
	pub can_delete: bool,
	/// The time the permission was created.
	pub created_at: DateTime<Utc>,
}

impl Permission {
	/// A new permission record granting the given actions on an entity.
	pub fn grant(entity_name: EntityName, actions: Action) -> Self {
		Self {
			id: Uuid::new_v4(),
			entity_name,
			description: None,
			can_create: actions.allows(Action::Create),
			can_read: actions.allows(Action::Read),
			can_update: actions.allows(Action::Update),
			can_delete: actions.allows(Action::Delete),
			created_at: Utc::now(),
		}
	}

	/// The granted actions as a mask.
	pub fn granted(&self) -> Action {
		let mut actions = Action::none();
		if self.can_create {
			actions |= Action::Create;
		}
		if self.can_read {
			actions |= Action::Read;
		}
		if self.can_update {
			actions |= Action::Update;
		}
		if self.can_delete {
			actions |= Action::Delete;
		}
		actions
	}

	/// Checks if this record grants the given action.
	pub fn allows(&self, action: Action) -> bool {
		self.granted().allows(action)
	}

	/// Merge another record for the same entity into this one.
	///
	/// Each CRUD flag is the logical OR of the two records. The id and
	/// description of `self` are kept; they carry no merge semantics.
	pub fn merge(&self, other: &Self) -> Self {
		Self {
			can_create: self.can_create || other.can_create,
			can_read: self.can_read || other.can_read,
			can_update: self.can_update || other.can_update,
			can_delete: self.can_delete || other.can_delete,
			..self.clone()
		}
	}
}
