//! Core abstractions for tradelog: the key-value backend contract and the
//! record encoders used by the storage facades.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod codec;
pub mod storage;
