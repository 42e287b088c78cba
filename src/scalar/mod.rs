//! Portable, branch-per-opcode encoders/decoders for both variants.
//!
//! These are the only encoders available without the `simd` feature, and
//! are always used for non-64-aligned tail chunks even when SIMD is on
//! (see `crate::stream`).

pub mod q;
pub mod r;
