//! Core types and trait definitions for Rollcall.
//!
//! Face embeddings, matching, and the attendance domain model. This crate is
//! deliberately free of HTTP and database dependencies; storage backends and
//! recognizer adapters plug in through [`store::AttendanceStore`] and
//! [`recognizer::FaceRecognizer`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod embedding;
pub mod enrollment;
pub mod error;
pub mod matcher;
pub mod offering;
pub mod person;
pub mod pipeline;
pub mod recognizer;
pub mod store;

pub use embedding::Embedding;
pub use error::{DetectionError, DomainError, Error, Result};
