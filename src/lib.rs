//! Image Compressor
//!
//! Upload-then-poll image processing service. An uploaded image becomes a
//! job in a Redis-backed store (with an in-memory fallback); a process call
//! re-encodes it by quality or reduces its pixel dimensions, recording
//! progress and before/after stats that clients poll for.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
