//! EpiNet Service Layer
//!
//! This crate wraps the simulation core for outside callers:
//! - Seeding (`SeedContext`): where each session's randomness comes from
//! - Validation: JSON coercion, defaults and policy bounds
//! - Dispatch (`SessionRegistry`): session id → simulation session
//! - Transport: JSON over HTTP/1.1 (hyper)
//!
//! The core knows nothing about sessions, JSON or HTTP; everything here can
//! be replaced without touching simulation semantics.
//!
//! # Example
//!
//! ```ignore
//! use epinet_service::{OsSeedContext, ServiceConfig, SessionRegistry};
//! use std::sync::Arc;
//!
//! let config = ServiceConfig::default();
//! let registry = Arc::new(SessionRegistry::new(OsSeedContext::new(), &config));
//! let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
//! epinet_service::serve(listener, registry).await?;
//! ```

mod context;
mod error;
mod os_impl;
mod registry;
mod types;
pub mod http;
pub mod validation;

pub use context::SeedContext;
pub use error::ServiceError;
pub use http::serve;
pub use os_impl::OsSeedContext;
pub use registry::{ServiceConfig, SessionRegistry};
pub use types::{
    ErrorPayload, InitializeRequest, InitializeResponse, SessionId, StatePayload, StepRequest,
    StepResponse,
};
pub use validation::ParameterBounds;
