//! Lazy context proxies for rpcctx.
//!
//! A [`ContextProxy`] wraps an entity type and a caller-supplied edit map
//! (field name → raw value) and behaves like a fully populated instance of
//! that entity. Nothing is resolved up front:
//!
//! - fields present in the edit map are normalized and written onto a blank
//!   working instance the first time they are touched
//! - fields absent from the edit map are read from the persisted instance,
//!   which is looked up by `id` at most once
//! - computed fields first pull in their dependencies, from the edit map when
//!   present and from the persisted instance otherwise
//! - nested reference payloads become persisted-row lookups or nested proxies
//!
//! Proxies are request-scoped and single-threaded (`!Send`); the schema
//! registry and identity resolver they consult are shared and thread-safe.

mod config;
mod engine;
mod json;
mod listener;
mod proxy;

pub use config::ProxyConfig;
pub use json::JsonAttrs;
pub use listener::FieldChange;
pub use proxy::{Collaborators, ContextProxy, ContextProxyFactory, Interception, ProxyFactory};

pub use rpcctx_model::{ContextError, ContextResult, Record, Value, ValueMap};
