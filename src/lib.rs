#![forbid(unsafe_code)]

//! Build-time tooling for a static video site: thumbnail optimization, the
//! generated video catalog and IndexNow notification.
//!
//! The binaries under `src/bin` are thin wrappers; everything they do lives
//! in these modules so it can be exercised from tests.

pub mod catalog;
pub mod config;
pub mod indexnow;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod slug;
pub mod thumbnails;
