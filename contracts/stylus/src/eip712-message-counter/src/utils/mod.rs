//! Shared utilities for the message counter.
//!
//! These helpers are intentionally small and deterministic, as they run inside Stylus / WASM.

pub mod crypto;
