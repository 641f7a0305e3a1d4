//! Data structures representing format components.
//!
//! Contains the syncinfo and BSI headers, channel layouts, per-block
//! exponent and allocation data, and the encoder configuration.

pub mod block;
pub mod bsi;
pub mod channel;
pub mod config;
pub mod sync;
