//! Vectorized delta computation and opcode packing for the Q encoder.
//!
//! Q's running-color index makes the fast path narrower than R's: every
//! pixel needs its index-hash checked against the table before we know
//! whether it's an `OP_INDEX` hit, and that table mutates pixel-by-pixel, so
//! `block_is_vectorizable` still walks the block scalar-style to rule out
//! index hits, repeats, and alpha changes before the vector path is taken.
//! Once a block clears that gate, every lane is guaranteed to need a DIFF/
//! LUMA/RGB color opcode (never INDEX, RUN, or RGBA), so classification and
//! packing both vectorize the same way as the R encoder: per-lane masks
//! computed across all 16 lanes at once, then a prefix-sum compaction in
//! place of the original's runtime-indexed byte-shuffle table (see
//! `simd::r` for why that table has no portable equivalent here, and
//! `mlut` for the separate mega-LUT path that sidesteps classification
//! altogether).

use wide::u8x16;

use crate::bits::{peek_u32le, poke_u16le, poke_u32le};
use crate::error::EncodeError;
use crate::pixel::Pixel;
use crate::scalar::q::{encode_pixels as encode_pixels_scalar, EncodeState};

pub const LANES: usize = 16;

const OP_DIFF: u8 = 0x40;
const OP_LUMA: u8 = 0x80;
const OP_RGB: u8 = 0xfe;

pub fn encode_pixels(
    pixels: &[u8],
    channels: u8,
    state: &mut EncodeState,
    out: &mut [u8],
    cursor: &mut usize,
    flush_tail_run: bool,
) -> Result<(), EncodeError> {
    let stride = channels as usize;
    debug_assert_eq!(pixels.len() % stride, 0);
    let n = pixels.len() / stride;

    let mut i = 0;
    while i + LANES <= n {
        let block = &pixels[i * stride..(i + LANES) * stride];

        if !block_is_vectorizable(block, channels, state) {
            encode_pixels_scalar(block, channels, state, out, cursor, false)?;
            i += LANES;
            continue;
        }

        encode_vector_block(block, channels, state, out, cursor)?;
        i += LANES;
    }

    if i < n {
        let tail = &pixels[i * stride..];
        encode_pixels_scalar(tail, channels, state, out, cursor, flush_tail_run)?;
    } else if flush_tail_run && state.run > 0 {
        crate::scalar::q::flush_run(out, cursor, &mut state.run);
    }

    Ok(())
}

/// Walks the block once, scalar-style, threading a copy of `state.prev`/
/// `state.index` to confirm no lane would hit `OP_INDEX`, repeat its
/// predecessor, or change alpha. Any of those forces the block through the
/// scalar encoder instead, since they all depend on state mutated
/// pixel-by-pixel in a way that isn't expressible as a fixed-width lane op.
fn block_is_vectorizable(block: &[u8], channels: u8, state: &EncodeState) -> bool {
    let stride = channels as usize;
    let mut prev = state.prev;
    let mut index = state.index;
    for bytes in block.chunks(stride) {
        let px = Pixel::read(bytes, channels);
        if px == prev {
            return false;
        }
        if px.a != prev.a {
            return false;
        }
        let slot = px.running_index_hash();
        if index[slot] == px {
            return false;
        }
        index[slot] = px;
        prev = px;
    }
    true
}

struct Planes {
    dr: [u8; LANES],
    dg: [u8; LANES],
    db: [u8; LANES],
    vg_r: [u8; LANES],
    vg_b: [u8; LANES],
}

#[derive(Clone, Copy)]
enum Tier {
    Diff,
    Luma,
    Rgb,
}

impl Tier {
    fn len(self) -> usize {
        match self {
            Tier::Diff => 1,
            Tier::Luma => 2,
            Tier::Rgb => 4,
        }
    }
}

/// Per-lane DIFF/LUMA/RGB classification, the Q-opcode analogue of
/// `simd::r::classify`: DIFF needs all three biased deltas to fit 2 bits,
/// LUMA needs green to fit 6 bits and the green-relative r/b terms to fit 4
/// bits, anything wider falls through to RGB.
fn classify(planes: &Planes) -> [Tier; LANES] {
    let dg = u8x16::from(planes.dg);
    let dr = u8x16::from(planes.dr);
    let db = u8x16::from(planes.db);
    let vg_r = u8x16::from(planes.vg_r);
    let vg_b = u8x16::from(planes.vg_b);

    let invalid_diff = (dr + u8x16::splat(2)).cmp_gt(u8x16::splat(3))
        | (dg + u8x16::splat(2)).cmp_gt(u8x16::splat(3))
        | (db + u8x16::splat(2)).cmp_gt(u8x16::splat(3));
    let invalid_luma = (dg + u8x16::splat(32)).cmp_gt(u8x16::splat(63))
        | (vg_r + u8x16::splat(8)).cmp_gt(u8x16::splat(15))
        | (vg_b + u8x16::splat(8)).cmp_gt(u8x16::splat(15));

    let invalid_diff = invalid_diff.to_array();
    let invalid_luma = invalid_luma.to_array();

    let mut tiers = [Tier::Rgb; LANES];
    for lane in 0..LANES {
        tiers[lane] = if invalid_diff[lane] == 0 {
            Tier::Diff
        } else if invalid_luma[lane] == 0 {
            Tier::Luma
        } else {
            Tier::Rgb
        };
    }
    tiers
}

/// Writes one lane's opcode. RGB here carries the pixel's *absolute* r/g/b
/// bytes (not a delta), matching `scalar::q::encode_color_opcode`'s RGB
/// branch exactly, unlike R's RGB opcode, which is still delta-biased.
fn pack_lane(out: &mut [u8], at: usize, tier: Tier, planes: &Planes, r: u8, g: u8, b: u8, lane: usize) {
    let mut cursor = at;
    match tier {
        Tier::Diff => {
            let vr = planes.dr[lane].wrapping_add(2);
            let vg = planes.dg[lane].wrapping_add(2);
            let vb = planes.db[lane].wrapping_add(2);
            out[at] = OP_DIFF | (vr << 4) | (vg << 2) | vb;
        }
        Tier::Luma => {
            let vg = planes.dg[lane].wrapping_add(32);
            let vr = planes.vg_r[lane].wrapping_add(8);
            let vb = planes.vg_b[lane].wrapping_add(8);
            let word = u16::from_le_bytes([OP_LUMA | vg, (vr << 4) | vb]);
            poke_u16le(out, &mut cursor, word);
        }
        Tier::Rgb => {
            let word = u32::from_le_bytes([OP_RGB, r, g, b]);
            poke_u32le(out, &mut cursor, word);
            debug_assert_eq!(peek_u32le(out, at), word);
        }
    }
}

/// Every lane in `block` needs a color opcode (the gate already ruled out
/// INDEX/RUN/RGBA): classify all sixteen at once, prefix-sum the lengths
/// into write offsets, and pack each lane at its offset, same compaction
/// scheme as `simd::r::encode_quick`.
fn encode_vector_block(
    block: &[u8],
    channels: u8,
    state: &mut EncodeState,
    out: &mut [u8],
    cursor: &mut usize,
) -> Result<(), EncodeError> {
    let stride = channels as usize;

    let mut r = [0u8; LANES];
    let mut g = [0u8; LANES];
    let mut b = [0u8; LANES];
    let mut pr = [0u8; LANES];
    let mut pg = [0u8; LANES];
    let mut pb = [0u8; LANES];

    let mut prev = state.prev;
    for (lane, bytes) in block.chunks(stride).enumerate() {
        let px = Pixel::read(bytes, channels);
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
    let planes = Planes { dr, dg, db, vg_r, vg_b };

    let tiers = classify(&planes);
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
    let alpha = state.prev.a;
    for lane in 0..LANES {
        pack_lane(out, base + offsets[lane], tiers[lane], &planes, r[lane], g[lane], b[lane], lane);
        let px = Pixel { r: r[lane], g: g[lane], b: b[lane], a: alpha };
        state.index[px.running_index_hash()] = px;
    }
    *cursor += total;
    state.prev = Pixel { r: r[LANES - 1], g: g[LANES - 1], b: b[LANES - 1], a: alpha };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_pixels(seed: u32, count: usize) -> Vec<u8> {
        let mut pixels = vec![0u8; count * 3];
        let mut s = seed;
        for p in pixels.chunks_mut(3) {
            s ^= s << 7;
            s ^= s >> 9;
            s ^= s << 8;
            p[0] = (s as u8).wrapping_add(1);
            p[1] = ((s >> 8) as u8).wrapping_add(3);
            p[2] = ((s >> 16) as u8).wrapping_add(5);
        }
        pixels
    }

    fn vector_matches_scalar(pixels: &[u8], channels: u8) {
        let mut vec_out = vec![0u8; pixels.len() * 2 + 64];
        let mut vec_cursor = 0;
        let mut vec_state = EncodeState::default();
        encode_pixels(pixels, channels, &mut vec_state, &mut vec_out, &mut vec_cursor, true).unwrap();
        vec_out.truncate(vec_cursor);

        let mut scalar_out = vec![0u8; pixels.len() * 2 + 64];
        let mut scalar_cursor = 0;
        let mut scalar_state = EncodeState::default();
        encode_pixels_scalar(pixels, channels, &mut scalar_state, &mut scalar_out, &mut scalar_cursor, true)
            .unwrap();
        scalar_out.truncate(scalar_cursor);

        assert_eq!(vec_out, scalar_out);
    }

    #[test]
    fn vector_block_matches_scalar_encoder() {
        // Keep deltas from ever landing on an index hit so the whole buffer
        // stays on the vector path: a steady, never-repeating walk.
        let pixels = random_pixels(0xBEEF, 80);
        vector_matches_scalar(&pixels, 3);
    }

    #[test]
    fn block_with_index_hit_falls_back_to_scalar_and_still_matches() {
        // Pixel A, sixteen distinct colors, then A again: the second block
        // should hit OP_INDEX on the repeat and take the scalar path, while
        // still producing byte-identical output to the pure-scalar encoder.
        let a = [10u8, 20, 30];
        let mut pixels = Vec::new();
        pixels.extend_from_slice(&a);
        for i in 0..20u8 {
            pixels.extend_from_slice(&[i, i.wrapping_mul(2).wrapping_add(1), i.wrapping_mul(3).wrapping_add(2)]);
        }
        pixels.extend_from_slice(&a);
        vector_matches_scalar(&pixels, 3);
    }

    #[test]
    fn block_with_repeat_falls_back_to_scalar_and_still_matches() {
        let mut pixels = random_pixels(0x1357, 16);
        pixels.extend_from_slice(&pixels[pixels.len() - 3..].to_vec());
        pixels.extend_from_slice(&random_pixels(0x2468, 16));
        vector_matches_scalar(&pixels, 3);
    }

    #[test]
    fn pseudo_random_roundtrip_matches_scalar() {
        let pixels = random_pixels(0x9E37_79B9, 300);
        vector_matches_scalar(&pixels, 3);
    }
}
