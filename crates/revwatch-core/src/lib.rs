//! Core types and trait definitions for the revwatch review pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the domain model, the pure classification/hashing/validation rules,
//! and the three seams the pipeline is built around: [`store::ReviewStore`],
//! [`source::ReviewSource`] and [`notify::Notifier`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod action;
pub mod alert;
pub mod classify;
pub mod content;
pub mod error;
pub mod notify;
pub mod place;
pub mod review;
pub mod source;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
