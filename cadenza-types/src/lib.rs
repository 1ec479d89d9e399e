//! # cadenza-types
//!
//! Shared type definitions for the Cadenza vocal editor ecosystem.
//! This crate contains the document model used across cadenza-core and any
//! frontend; it carries no behavior beyond small structural helpers so that
//! frontends can depend on it without pulling in the command engine.

pub mod project;

pub use project::{Note, Part, Project, Track, TICKS_PER_QUARTER};
