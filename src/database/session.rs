use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
/// A session issued by the authentication layer.
///
/// Only the invalidation side lives here: when a role a user holds
/// changes, the user's sessions are expired so a stale token cannot grant
/// rights that no longer exist.
pub struct Session {
	/// The unique identifier for the session.
	pub id: Uuid,
	/// Foreign key to the user table.
	pub user_id: Uuid,
	/// The time the session expires or was invalidated.
	pub expires_at: DateTime<Utc>,
	/// The time the session was last used.
	pub last_used_at: DateTime<Utc>,
}

impl Session {
	pub fn is_valid(&self) -> bool {
		self.expires_at > Utc::now()
	}
}
