//! # confgov-auth
//!
//! Access control for configuration groups.
//!
//! Access is expressed as policy tuples `(role, "configuration", group,
//! operation)` held by an external policy engine. A caller may hold several
//! roles; access is granted if any of them has a matching tuple.
//!
//! ## Modules
//!
//! - [`engine`] - the policy engine interface and an in-memory engine
//! - [`checker`] - [`PermissionChecker`], the stateless facade used by the
//!   governance operations
//! - [`grants`] - `group:operation` grant strings used to assign groups to roles

pub mod checker;
pub mod engine;
pub mod grants;

pub use checker::{Operation, PermissionChecker};
pub use engine::{InMemoryPolicyEngine, PolicyEngine, PolicyRequest, PolicyTuple};
pub use grants::GroupGrant;
