//! # confgov-core
//!
//! Shared building blocks for the configuration governance engine:
//!
//! - [`error`] - the error taxonomy every component reports through
//! - [`types`] - configuration entries, write inputs, list filters and pages
//! - [`codec`] - the `group<>value` encoding held by the in-memory cache
//!
//! Nothing in this crate performs I/O or holds shared state.

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{SEPARATOR, collides_with_separator, encode_entry, split_entry};
pub use error::{ErrorCategory, GovernanceError};
pub use types::{
    ConfigEntry, ConfigFilter, ConfigInput, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest,
};

/// Type alias for governance results.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Resource type under which configuration policies are registered.
pub const CONFIGURATION_RESOURCE: &str = "configuration";
