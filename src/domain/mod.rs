//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains some of:
//! - `mod.rs` — Domain types (validated, business-logic-ready)
//! - `wire.rs` — Raw serde structs matching feed responses
//! - `convert.rs` — Wire → domain conversions with validation
//! - `state.rs` — State containers with update methods (feed-driven data)

pub mod device;
pub mod reading;
pub mod sample;
pub mod status;
