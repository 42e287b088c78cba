//! Vectorized encoder for the R variant, 16 pixels (one `wide` lane's worth
//! of bytes) at a time.
//!
//! Follows the same shape as the original SSE fast path: load-and-diff,
//! deinterleave into planes, an all-zero early exit, a run-lane detour when
//! any lane repeats its predecessor, and otherwise a "quick path" that
//! classifies every lane's opcode width in parallel and packs the block
//! branchlessly. The one substitution from the original: packing a
//! variable-length opcode per lane into a dense byte run is done there with
//! a 4 KiB runtime-indexed byte-shuffle table (`pshufb`), which has no
//! portable-SIMD equivalent. `wide` exposes fixed same-width lane
//! operations, not an arbitrary cross-lane permute. The substitute here is
//! the same algorithm family (stream compaction) expressed as a prefix sum
//! over the classified lengths instead of a shuffle-table lookup: every
//! lane's destination offset is known the moment its length is known, no
//! lane's write depends on another lane's bytes, and no lane re-derives its
//! own classification while writing.

use wide::u8x16;

use crate::bits::{peek_u32le, poke_u16le, poke_u24le, poke_u32le};
use crate::error::EncodeError;
use crate::pixel::Pixel;
use crate::scalar::r::{encode_pixels as encode_pixels_scalar, EncodeState};

/// Pixels processed per vector block.
pub const LANES: usize = 16;

const OP_LUMA232: u8 = 0x00;
const OP_LUMA464: u16 = 0x01;
const OP_LUMA777: u32 = 0x03;
const OP_RGB: u8 = 0xf7;

/// Per-lane planar state captured once per block: current and predecessor
/// r/g/b, the wrapping diffs, and the green-relative `vg_r`/`vg_b` terms
/// every tier's classification is built from.
struct Planes {
    dr: [u8; LANES],
    dg: [u8; LANES],
    db: [u8; LANES],
    vg_r: [u8; LANES],
    vg_b: [u8; LANES],
}

/// Encodes `pixels` (RGB or RGBA) using vectorized delta/classification
/// blocks where profitable, falling back to the scalar encoder for blocks
/// an alpha change or a short, non-64-aligned tail makes unsafe to
/// vectorize. `rle` mirrors `Options::rle`.
pub fn encode_pixels(
    pixels: &[u8],
    channels: u8,
    state: &mut EncodeState,
    out: &mut [u8],
    cursor: &mut usize,
    rle: bool,
    flush_tail_run: bool,
) -> Result<(), EncodeError> {
    let stride = channels as usize;
    debug_assert_eq!(pixels.len() % stride, 0);
    let n = pixels.len() / stride;

    let mut i = 0;
    while i + LANES <= n {
        let block = &pixels[i * stride..(i + LANES) * stride];

        if channels == 4 && block_has_alpha_change(block, state.prev.a) {
            // An alpha change anywhere in the block forces the whole block
            // through the scalar RGBA-follows-RGB path.
            encode_pixels_scalar(block, channels, state, out, cursor, rle, false)?;
            i += LANES;
            continue;
        }

        let (cur, planes) = load_and_diff(block, channels, state.prev);

        if rle && planes.dr.iter().zip(&planes.dg).zip(&planes.db).all(|((&r, &g), &b)| r | g | b == 0) {
            // Every lane repeats the predecessor: fold the whole block into
            // the run counter without writing anything.
            state.run += LANES as u32;
            i += LANES;
            continue;
        }

        let has_run_lane = rle && (0..LANES).any(|lane| planes.dr[lane] | planes.dg[lane] | planes.db[lane] == 0);

        if has_run_lane {
            encode_careful(&cur, &planes, state, out, cursor)?;
        } else {
            encode_quick(&cur, &planes, state, out, cursor)?;
        }
        i += LANES;
    }

    if i < n {
        let tail = &pixels[i * stride..];
        encode_pixels_scalar(tail, channels, state, out, cursor, rle, flush_tail_run)?;
    } else if flush_tail_run && state.run > 0 {
        crate::scalar::r::flush_run(out, cursor, &mut state.run);
    }

    Ok(())
}

fn block_has_alpha_change(block: &[u8], initial_prev_a: u8) -> bool {
    let mut prev_a = initial_prev_a;
    for bytes in block.chunks(4) {
        if bytes[3] != prev_a {
            return true;
        }
        prev_a = bytes[3];
    }
    false
}

/// Deinterleaves `block` into current-pixel planes and computes the
/// wrapping r/g/b diffs against the running predecessor: `wide::u8x16`
/// subtraction does the sixteen-lane-wide part, the surrounding loop is the
/// deinterleave (there is no portable gather/scatter across non-power-of-two
/// strides to vectorize that step itself).
fn load_and_diff(block: &[u8], channels: u8, initial_prev: Pixel) -> ([Pixel; LANES], Planes) {
    let stride = channels as usize;
    let mut cur = [Pixel::default(); LANES];
    let mut r = [0u8; LANES];
    let mut g = [0u8; LANES];
    let mut b = [0u8; LANES];
    let mut pr = [0u8; LANES];
    let mut pg = [0u8; LANES];
    let mut pb = [0u8; LANES];

    let mut prev = initial_prev;
    for (lane, bytes) in block.chunks(stride).enumerate() {
        let px = Pixel::read(bytes, channels);
        cur[lane] = px;
        r[lane] = px.r;
        g[lane] = px.g;
        b[lane] = px.b;
        pr[lane] = prev.r;
        pg[lane] = prev.g;
        pb[lane] = prev.b;
        prev = px;
    }

    let dr = (u8x16::from(r) - u8x16::from(pr)).to_array();
    let dg = (u8x16::from(g) - u8x16::from(pg)).to_array();
    let db = (u8x16::from(b) - u8x16::from(pb)).to_array();
    let vg_r = (u8x16::from(dr) - u8x16::from(dg)).to_array();
    let vg_b = (u8x16::from(db) - u8x16::from(dg)).to_array();

    (cur, Planes { dr, dg, db, vg_r, vg_b })
}

/// One classification tier, ordered narrowest-first exactly like the
/// scalar encoder tries them.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Tier {
    Luma232,
    Luma464,
    Luma777,
    Rgb,
}

impl Tier {
    fn len(self) -> usize {
        match self {
            Tier::Luma232 => 1,
            Tier::Luma464 => 2,
            Tier::Luma777 => 3,
            Tier::Rgb => 4,
        }
    }
}

/// Per-lane opcode classification: for each tier, bias every
/// component by that tier's field offset and compare the biased value
/// against the field's width with a vectorized unsigned `cmp_gt`, a lanewise
/// replacement for three `fits_bits` calls per lane. `wrapping_add` by the
/// tier offset turns "fits in a k-bit two's-complement field" into "biased
/// value fits below 2^k", so out-of-range deltas (which wrap past 2^k) are
/// caught by the same unsigned compare as in-range ones that simply fail
/// the width check.
fn classify(planes: &Planes) -> [Tier; LANES] {
    let dg = u8x16::from(planes.dg);
    let vg_r = u8x16::from(planes.vg_r);
    let vg_b = u8x16::from(planes.vg_b);

    let invalid_232 = (dg + u8x16::splat(4)).cmp_gt(u8x16::splat(7))
        | (vg_r + u8x16::splat(2)).cmp_gt(u8x16::splat(3))
        | (vg_b + u8x16::splat(2)).cmp_gt(u8x16::splat(3));
    let invalid_464 = (dg + u8x16::splat(32)).cmp_gt(u8x16::splat(63))
        | (vg_r + u8x16::splat(8)).cmp_gt(u8x16::splat(15))
        | (vg_b + u8x16::splat(8)).cmp_gt(u8x16::splat(15));
    let invalid_777 = (dg + u8x16::splat(64)).cmp_gt(u8x16::splat(127))
        | (vg_r + u8x16::splat(64)).cmp_gt(u8x16::splat(127))
        | (vg_b + u8x16::splat(64)).cmp_gt(u8x16::splat(127));

    let invalid_232 = invalid_232.to_array();
    let invalid_464 = invalid_464.to_array();
    let invalid_777 = invalid_777.to_array();

    let mut tiers = [Tier::Rgb; LANES];
    for lane in 0..LANES {
        tiers[lane] = if invalid_232[lane] == 0 {
            Tier::Luma232
        } else if invalid_464[lane] == 0 {
            Tier::Luma464
        } else if invalid_777[lane] == 0 {
            Tier::Luma777
        } else {
            Tier::Rgb
        };
    }
    tiers
}

/// Writes one lane's already-classified opcode. The bias arithmetic mirrors
/// `scalar::r::encode_rgb_opcode` exactly; what's saved versus calling that
/// function per lane is redoing the three-tier `fits_bits` search, since
/// `classify` already settled it for the whole block at once.
fn pack_lane(out: &mut [u8], at: usize, tier: Tier, planes: &Planes, lane: usize) {
    let mut cursor = at;
    match tier {
        Tier::Luma232 => {
            let vg = planes.dg[lane].wrapping_add(4);
            let vr = planes.vg_r[lane].wrapping_add(2);
            let vb = planes.vg_b[lane].wrapping_add(2);
            out[at] = OP_LUMA232 | (vg << 1) | (vr << 4) | (vb << 6);
        }
        Tier::Luma464 => {
            let vg = planes.dg[lane].wrapping_add(32) as u16;
            let vr = planes.vg_r[lane].wrapping_add(8) as u16;
            let vb = planes.vg_b[lane].wrapping_add(8) as u16;
            let word = OP_LUMA464 | (vg << 2) | (vr << 8) | (vb << 12);
            poke_u16le(out, &mut cursor, word);
        }
        Tier::Luma777 => {
            let vg = planes.dg[lane].wrapping_add(64) as u32;
            let vr = planes.vg_r[lane].wrapping_add(64) as u32;
            let vb = planes.vg_b[lane].wrapping_add(64) as u32;
            let word = OP_LUMA777 | (vg << 3) | (vr << 10) | (vb << 17);
            poke_u24le(out, &mut cursor, word);
        }
        Tier::Rgb => {
            let word = u32::from_le_bytes([OP_RGB, planes.dg[lane], planes.vg_r[lane], planes.vg_b[lane]]);
            poke_u32le(out, &mut cursor, word);
            debug_assert_eq!(peek_u32le(out, at), word);
        }
    }
}

/// No lane repeats its predecessor: classify every lane, prefix-sum the
/// resulting lengths into per-lane write offsets, and place each lane's
/// bytes at its offset (minus the hardware shuffle, see the module doc).
fn encode_quick(
    cur: &[Pixel; LANES],
    planes: &Planes,
    state: &mut EncodeState,
    out: &mut [u8],
    cursor: &mut usize,
) -> Result<(), EncodeError> {
    let tiers = classify(planes);
    let mut offsets = [0usize; LANES];
    let mut total = 0usize;
    for lane in 0..LANES {
        offsets[lane] = total;
        total += tiers[lane].len();
    }

    if out.len() < *cursor + total {
        return Err(EncodeError::OutputIsTooSmall);
    }

    let base = *cursor;
    for lane in 0..LANES {
        pack_lane(out, base + offsets[lane], tiers[lane], planes, lane);
    }
    *cursor += total;
    state.prev = cur[LANES - 1];
    Ok(())
}

/// At least one lane repeats its predecessor: walk lanes in order, folding
/// repeats into `state.run` and flushing it before any literal lane, same
/// as the scalar encoder, but using `classify`'s precomputed tier/length
/// for the literal lanes instead of re-deriving them.
fn encode_careful(
    cur: &[Pixel; LANES],
    planes: &Planes,
    state: &mut EncodeState,
    out: &mut [u8],
    cursor: &mut usize,
) -> Result<(), EncodeError> {
    let tiers = classify(planes);

    for lane in 0..LANES {
        if planes.dr[lane] | planes.dg[lane] | planes.db[lane] == 0 {
            state.run += 1;
            if state.run == crate::scalar::r::RUN_FULL_LEN {
                crate::scalar::r::flush_run(out, cursor, &mut state.run);
            }
            continue;
        }

        if state.run > 0 {
            crate::scalar::r::flush_run(out, cursor, &mut state.run);
        }

        let len = tiers[lane].len();
        if out.len() < *cursor + len.max(4) {
            return Err(EncodeError::OutputIsTooSmall);
        }
        pack_lane(out, *cursor, tiers[lane], planes, lane);
        *cursor += len;
        state.prev = cur[lane];
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_pixels(seed: u32, count: usize, channels: u8) -> Vec<u8> {
        let mut pixels = vec![0u8; count * channels as usize];
        let mut s = seed;
        for p in pixels.chunks_mut(channels as usize) {
            s ^= s << 7;
            s ^= s >> 9;
            s ^= s << 8;
            p[0] = s as u8;
            p[1] = (s >> 8) as u8;
            p[2] = (s >> 16) as u8;
            if channels == 4 {
                p[3] = if s % 5 == 0 { (s >> 24) as u8 } else { 255 };
            }
        }
        pixels
    }

    fn vector_matches_scalar(pixels: &[u8], channels: u8, rle: bool) {
        let mut vec_out = vec![0u8; pixels.len() * 2 + 64];
        let mut vec_cursor = 0;
        let mut vec_state = EncodeState::default();
        encode_pixels(pixels, channels, &mut vec_state, &mut vec_out, &mut vec_cursor, rle, true).unwrap();
        vec_out.truncate(vec_cursor);

        let mut scalar_out = vec![0u8; pixels.len() * 2 + 64];
        let mut scalar_cursor = 0;
        let mut scalar_state = EncodeState::default();
        encode_pixels_scalar(pixels, channels, &mut scalar_state, &mut scalar_out, &mut scalar_cursor, rle, true)
            .unwrap();
        scalar_out.truncate(scalar_cursor);

        assert_eq!(vec_out, scalar_out, "channels={channels} rle={rle}");
    }

    #[test]
    fn quick_path_matches_scalar_encoder() {
        // Steady walk, no two pixels ever repeat: pure quick path.
        let mut pixels = vec![0u8; 64 * 3];
        for (i, p) in pixels.chunks_mut(3).enumerate() {
            p[0] = (i as u8).wrapping_mul(3).wrapping_add(1);
            p[1] = (i as u8).wrapping_mul(5).wrapping_add(2);
            p[2] = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        vector_matches_scalar(&pixels, 3, true);
        vector_matches_scalar(&pixels, 3, false);
    }

    #[test]
    fn run_lane_detour_matches_scalar_encoder() {
        // A flat run inside an otherwise varying block forces the careful path.
        let mut pixels = Vec::new();
        for i in 0..8u8 {
            pixels.extend_from_slice(&[i, i.wrapping_mul(2), i.wrapping_mul(3)]);
        }
        for _ in 0..8 {
            pixels.extend_from_slice(&[200, 10, 10]);
        }
        vector_matches_scalar(&pixels, 3, true);
        vector_matches_scalar(&pixels, 3, false);
    }

    #[test]
    fn whole_block_run_matches_scalar_encoder() {
        let pixels = vec![42u8; 3 * 3 * LANES];
        vector_matches_scalar(&pixels, 3, true);
    }

    #[test]
    fn alpha_change_block_matches_scalar_encoder() {
        let mut pixels = random_pixels(0xBEEF_CAFE, 64, 4);
        // Force a handful of alpha changes spread across blocks.
        for chunk_start in (0..pixels.len()).step_by(4 * 16) {
            if chunk_start + 3 < pixels.len() {
                pixels[chunk_start + 3] = 10;
            }
        }
        vector_matches_scalar(&pixels, 4, true);
    }

    #[test]
    fn pseudo_random_roundtrip_matches_scalar() {
        for channels in [3u8, 4u8] {
            for rle in [true, false] {
                let pixels = random_pixels(0x1234_5678, 200, channels);
                vector_matches_scalar(&pixels, channels, rle);
            }
        }
    }
}
