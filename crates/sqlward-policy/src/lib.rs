//! # sqlward-policy
//!
//! Resolution from a call-site identifier to its declared
//! [`AccessPolicy`](sqlward_core::AccessPolicy).
//!
//! A call site is the data-access method triggering a statement,
//! identified as `<fully-qualified-type>.<method-name>`. Declarations are
//! registered once at startup (there is no runtime reflection), and a
//! method-level declaration takes precedence over one on the declaring
//! type.

pub mod registry;

pub use registry::{PolicyRegistry, PolicyRegistryBuilder};
