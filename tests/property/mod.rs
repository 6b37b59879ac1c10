// tests/property/mod.rs

//! Property-based tests verifying the invariants in §8 of the handler
//! specification: exclusivity, stripe stability, and remap completeness.

pub mod invariants_test;
