//! The `utils` module provides the shared building blocks used across the
//! `relay` application: the crate error type, the classification of why a
//! session ended, and logging setup.

pub mod error;
pub mod logging;
