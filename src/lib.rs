//! Core of a Confluent-compatible schema registry: content-addressed schema
//! storage, compatibility checking across Avro/Protobuf/JSON, multi-tenant
//! contexts, soft/hard delete lifecycles, and IMPORT-mode ingest.
//!
//! This crate defines the storage *interface* only (§6); HTTP transport lives
//! behind the `http` feature in [`http`] and is an external collaborator, not
//! part of the core's invariants.

pub mod compatibility;
pub mod config;
pub mod context_router;
pub mod error;
pub mod fingerprint;
pub mod import;
pub mod model;
pub mod parsers;
pub mod references;
pub mod registry;
pub mod storage;

#[cfg(feature = "http")]
pub mod http;

pub use error::{RegistryError, Result};
pub use registry::{RegisterRequest, RegisterResponse, RegistryCore, VersionLookup};
pub use storage::{InMemoryStorage, Storage};
