mod permission;
mod role;
mod session;
mod user;

pub use permission::{Action, EntityName, Permission, UnknownEntityName};
pub use role::{Role, RoleProtection, RESERVED_ROLE_NAMES, SUPER_ADMIN_ROLE};
pub use session::Session;
pub use user::User;
