//! Vectorized classification fast paths, gated by the `simd` cargo
//! feature. `wide` gives us portable, safe SIMD lanes in place of
//! hand-written target-feature intrinsics (which would need `unsafe` and
//! per-ISA code paths). Each block's delta computation and opcode-width
//! classification run across all 16 lanes at once (`u8x16` arithmetic plus
//! `cmp_gt`/`BitOr` masks standing in for the three `fits_bits` calls per
//! lane); the one piece of the original that doesn't carry over is the
//! branchless compaction itself. The original packs a variable-length
//! opcode per lane with a runtime-indexed `pshufb` byte-shuffle table (641
//! precomputed 16-byte shuffle vectors for Q, see `examples/original_source
//! /codegen.c`); `wide` exposes fixed same-width lane operations, not an
//! arbitrary cross-lane byte permute, so there's no portable equivalent to
//! port that table to. The substitute here is the same algorithm family,
//! stream compaction, expressed as a prefix sum over the classified
//! lengths: each lane's destination offset is known the moment its length
//! is known, so packing is still a single pass with no lane depending on
//! another lane's bytes. Output is still required to be, and is tested to
//! be, byte-identical to the scalar encoders.

pub mod q;
pub mod r;
