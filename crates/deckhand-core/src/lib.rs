//! Core types and configuration for deckhand.
//!
//! This crate defines the `.deploy/config.toml` schema ([`ServiceConfig`]),
//! the tag rules ([`tag`]), image coordinates ([`ImageRef`]), provenance
//! labels ([`Label`]), and shared error types.

pub mod config;
pub mod error;
pub mod image;
pub mod label;
pub mod tag;

pub use config::{PollConfig, ServiceConfig, StackParameter};
pub use error::{Error, Result};
pub use image::ImageRef;
pub use label::{BUILD_DATE_LABEL, COMMIT_LABEL, Label};
pub use tag::{Phase, PhaseTag, TagMatcher};
