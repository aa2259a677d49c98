use std::sync::Arc;

use http::StatusCode;
use uuid::Uuid;

use crate::database::{Action, EntityName};

pub type Result<T, E = AccessError> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
	/// No authenticated actor was supplied.
	#[error("authentication required")]
	AuthenticationRequired,
	/// The merge engine denied the requested action.
	#[error("you do not have permission to {} {entity}", .action.verb())]
	PermissionDenied { entity: EntityName, action: Action },
	/// The operation targets a system-protected role without sufficient
	/// privilege.
	#[error("{0}")]
	ProtectedResource(&'static str),
	/// A referenced record does not exist, or is trashed where an active
	/// one was required.
	#[error("{resource} not found")]
	NotFound { resource: &'static str, ids: Vec<Uuid> },
	/// Hard delete was attempted on a role that is not in the trash.
	#[error("role is not in the trash")]
	NotInTrash { ids: Vec<Uuid> },
	/// Hard delete was attempted on a role that users still hold.
	#[error("role is still assigned to users")]
	HasDependents { ids: Vec<Uuid> },
	/// Malformed input.
	#[error("invalid input for {fields:?}: {message}")]
	InvalidInput {
		fields: Vec<&'static str>,
		message: &'static str,
	},
	/// A database error occurred.
	#[error("store error: {0}")]
	Store(#[from] Arc<crate::store::StoreError>),
	/// A cache error occurred.
	#[error("cache error: {0}")]
	Cache(#[from] Arc<crate::cache::CacheError>),
}

impl From<crate::store::StoreError> for AccessError {
	fn from(err: crate::store::StoreError) -> Self {
		Self::Store(Arc::new(err))
	}
}

impl From<crate::cache::CacheError> for AccessError {
	fn from(err: crate::cache::CacheError) -> Self {
		Self::Cache(Arc::new(err))
	}
}

impl AccessError {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::AuthenticationRequired => "AuthenticationRequired",
			Self::PermissionDenied { .. } => "PermissionDenied",
			Self::ProtectedResource(_) => "ProtectedResource",
			Self::NotFound { .. } => "NotFound",
			Self::NotInTrash { .. } => "NotInTrash",
			Self::HasDependents { .. } => "HasDependents",
			Self::InvalidInput { .. } => "InvalidInput",
			Self::Store(_) => "Store",
			Self::Cache(_) => "Cache",
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
			Self::PermissionDenied { .. } | Self::ProtectedResource(_) => StatusCode::FORBIDDEN,
			Self::NotFound { .. } => StatusCode::NOT_FOUND,
			Self::NotInTrash { .. } | Self::HasDependents { .. } => StatusCode::CONFLICT,
			Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
			Self::Store(_) | Self::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Infrastructure errors must not leak internals past the resolver
	/// boundary.
	pub fn is_internal(&self) -> bool {
		matches!(self, Self::Store(_) | Self::Cache(_))
	}
}

/// The structured response shape every mutation/query boundary converts
/// errors into. Errors are never thrown past that boundary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
	pub status: u16,
	pub success: bool,
	pub message: String,
}

impl From<&AccessError> for ErrorResponse {
	fn from(err: &AccessError) -> Self {
		let message = if err.is_internal() {
			tracing::error!(error = %err, kind = err.kind(), "internal error");
			"internal server error".to_string()
		} else {
			tracing::debug!(error = %err, kind = err.kind(), "request error");
			err.to_string()
		};

		Self {
			status: err.status().as_u16(),
			success: false,
			message,
		}
	}
}
