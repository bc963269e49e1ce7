//! Schema-driven record normalization and merge-on-update over pluggable storage backends.
//!
//! This crate is the core of the recordlayer project and provides:
//!
//! - **Schema loading** ([`schema`], [`cache`]) - Structural schemas read from OpenAPI-style documents
//! - **Projection** ([`project`]) - Reshaping arbitrary records to exactly a schema's declared fields
//! - **Merging** ([`merge`]) - Recursive, policy-driven merging of a patch into a stored record
//! - **Record adapters** ([`adapter`]) - Create, read, update and delete built from the pieces above
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Query and filtering API** ([`query`], [`page`]) - Backend-neutral queries and pagination
//! - **Change notification** ([`notify`]) - Events and routing attributes emitted after writes
//! - **Configuration** ([`config`]) and **error handling** ([`error`])
//!
//! # Example
//!
//! ```
//! use bson::doc;
//! use recordlayer_core::{merge::{MergePolicy, merge}, schema::SchemaDocument};
//!
//! let document = SchemaDocument::from_yaml_str(r#"
//! components:
//!   schemas:
//!     account:
//!       type: object
//!       properties:
//!         id: { type: string }
//!         tags: { type: array, items: { type: string } }
//!         profile:
//!           type: object
//!           properties:
//!             name: { type: string }
//!             age: { type: number }
//! "#)?;
//! let schema = document.schema("account")?;
//!
//! let projected = schema.project(&doc! { "id": "x", "tags": ["a"], "extra": "drop-me" });
//! let merged = merge(&projected, &doc! { "profile": { "age": 30 } }, MergePolicy::default());
//!
//! assert_eq!(
//!     merged,
//!     doc! { "id": "x", "tags": ["a"], "profile": { "name": null, "age": 30 } }
//! );
//! # Ok::<(), recordlayer_core::error::RecordStoreError>(())
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_core;

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod merge;
pub mod notify;
pub mod page;
pub mod project;
pub mod query;
pub mod record;
pub mod schema;
