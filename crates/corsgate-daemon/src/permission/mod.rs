//! Permission layer: who may pair which origin with which target host.

mod authority;
mod console;
mod service;

pub use authority::{AuthorityTimings, Decision, PermissionAuthority, StaticAuthority};
pub use console::ConsoleAuthority;
pub use service::AuthorizationService;
