//! `stockroom-core`: shared primitives for the stock catalog.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, Field};
pub use id::{CategoryId, ProductId, SupplierId};
