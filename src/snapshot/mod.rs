//! Snapshots — BLAKE3 fingerprints and document diffing.

pub mod diff;
pub mod hasher;
