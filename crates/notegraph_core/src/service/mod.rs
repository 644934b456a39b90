//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and change journal calls into tree mutation
//!   operations.
//! - Keep caller-facing layers decoupled from storage details.

pub mod tree_service;
