//! hacktools — small release-engineering helpers.
//!
//! Two independent commands live here: a version consistency check over the
//! plugin configuration YAML, and a materializer that splits a JSON secret
//! document into one file per key.
//!
//! See `DESIGN.md` for how the pieces fit together.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod pluginconfig;
pub mod secrets;
