//! Ingress Operator Library
//!
//! Keeps an Ingress in step with every Service carrying the `ingress/http`
//! annotation: the Ingress is created when the annotation appears and deleted when
//! it goes away. Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use ingress_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod runtime;
