mod role;
mod user;

pub use role::{NewRole, RolePage, RoleRegistry, RoleUpdate};
pub use user::UserRegistry;
