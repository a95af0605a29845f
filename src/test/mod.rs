//! Shared helpers for the unit tests: an in-memory image builder.
#![allow(dead_code)]

mod builder;

pub use builder::*;
