//! Mega-LUT encoder (R variant, optional): every possible signed R/G/B
//! delta triple (2^24 entries) precomputed to its opcode length and bytes,
//! so the hot loop becomes a table lookup plus a fixed-width write instead
//! of a classify-then-branch chain. Trades 80 MiB of RAM for a branch-free
//! encode; gated behind the `mlut` cargo feature since most callers don't
//! want that trade.

#[cfg(feature = "alloc")]
use alloc::{boxed::Box, vec};

use crate::error::EncodeError;
use crate::pixel::{Delta, Pixel};
use crate::scalar::r::encode_rgb_opcode;

/// One precomputed opcode: `len` valid bytes in `bytes[..len]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub len: u8,
    pub bytes: [u8; 4],
}

/// Number of entries: one per `(vr, vg, vb)` byte triple.
pub const TABLE_LEN: usize = 1 << 24;

#[inline(always)]
fn index_of(vr: i8, vg: i8, vb: i8) -> usize {
    ((vr as u8 as usize) << 16) | ((vg as u8 as usize) << 8) | (vb as u8 as usize)
}

/// Builds the full table by running the scalar classifier over every
/// delta triple once. Pure function, safe under `no_std` + `alloc`.
#[cfg(feature = "alloc")]
pub fn generate() -> Box<[Entry]> {
    let mut table = vec![Entry { len: 0, bytes: [0; 4] }; TABLE_LEN].into_boxed_slice();
    for vr in 0u8..=255 {
        for vg in 0u8..=255 {
            for vb in 0u8..=255 {
                let d = Delta { vr: vr as i8, vg: vg as i8, vb: vb as i8 };
                let mut bytes = [0u8; 4];
                let mut cursor = 0usize;
                encode_rgb_opcode(&mut bytes, &mut cursor, &d);
                table[index_of(vr as i8, vg as i8, vb as i8)] = Entry { len: cursor as u8, bytes };
            }
        }
    }
    table
}

/// Encodes `pixels` driving color-opcode selection entirely from `lut`
/// instead of [`crate::scalar::r::encode_rgb_opcode`]. Alpha handling and
/// run-length logic are unchanged from the scalar encoder — only the
/// delta-to-opcode step is table-driven — so output is byte-identical to
/// [`crate::scalar::r::encode_pixels`] given the same `lut` was built by
/// [`generate`].
pub fn encode_pixels(
    pixels: &[u8],
    channels: u8,
    state: &mut crate::scalar::r::EncodeState,
    out: &mut [u8],
    cursor: &mut usize,
    rle: bool,
    flush_tail_run: bool,
    lut: &[Entry],
) -> Result<(), EncodeError> {
    use crate::bits::poke_u8;
    use crate::scalar::r::{flush_run, worst_case_opcode_len};

    let stride = channels as usize;
    debug_assert_eq!(pixels.len() % stride, 0);
    let n = pixels.len() / stride;

    for i in 0..n {
        let bytes = &pixels[i * stride..i * stride + stride];
        let px = Pixel::read(bytes, channels);

        if rle && px == state.prev {
            state.run += 1;
            if state.run == crate::scalar::r::RUN_FULL_LEN {
                flush_run(out, cursor, &mut state.run);
            }
            continue;
        }

        if state.run > 0 {
            flush_run(out, cursor, &mut state.run);
        }

        if out.len() < *cursor + worst_case_opcode_len(channels) {
            return Err(EncodeError::OutputIsTooSmall);
        }

        if px.a != state.prev.a {
            poke_u8(out, cursor, 0xff);
            poke_u8(out, cursor, px.a);
        }

        let d = Delta::between(&px, &state.prev);
        let entry = &lut[index_of(d.vr, d.vg, d.vb)];
        out[*cursor..*cursor + entry.len as usize].copy_from_slice(&entry.bytes[..entry.len as usize]);
        *cursor += entry.len as usize;

        state.prev = px;
    }

    if flush_tail_run && state.run > 0 {
        if out.len() < *cursor + worst_case_opcode_len(channels) {
            return Err(EncodeError::OutputIsTooSmall);
        }
        flush_run(out, cursor, &mut state.run);
    }

    Ok(())
}

/// Bytes per serialized [`Entry`]: one length byte plus four payload bytes.
const ENTRY_SIZE: usize = 5;

/// Loads a previously [`dump_file`]-written table from disk.
#[cfg(feature = "std")]
pub fn load_file(path: &std::path::Path) -> std::io::Result<Box<[Entry]>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut raw = vec![0u8; TABLE_LEN * ENTRY_SIZE];
    file.read_exact(&mut raw)?;

    let mut table = vec![Entry { len: 0, bytes: [0; 4] }; TABLE_LEN].into_boxed_slice();
    for (entry, chunk) in table.iter_mut().zip(raw.chunks_exact(ENTRY_SIZE)) {
        entry.len = chunk[0];
        entry.bytes.copy_from_slice(&chunk[1..5]);
    }
    Ok(table)
}

/// Writes `table` to disk in the layout [`load_file`] expects.
#[cfg(feature = "std")]
pub fn dump_file(path: &std::path::Path, table: &[Entry]) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::File::create(path)?;
    let mut raw = vec![0u8; table.len() * ENTRY_SIZE];
    for (chunk, entry) in raw.chunks_exact_mut(ENTRY_SIZE).zip(table.iter()) {
        chunk[0] = entry.len;
        chunk[1..5].copy_from_slice(&entry.bytes);
    }
    file.write_all(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries_match_scalar_classifier_for_sample_deltas() {
        for &(vr, vg, vb) in &[(0i8, 0i8, 0i8), (1, 1, 0), (10, -10, 5), (-128, 0, 127), (127, -128, -1)] {
            let d = Delta { vr, vg, vb };
            let mut expected = [0u8; 4];
            let mut expected_len = 0usize;
            encode_rgb_opcode(&mut expected, &mut expected_len, &d);

            let table = generate();
            let entry = &table[index_of(vr, vg, vb)];
            assert_eq!(entry.len as usize, expected_len);
            assert_eq!(&entry.bytes[..entry.len as usize], &expected[..expected_len]);
        }
    }

    #[test]
    fn lut_driven_encode_matches_scalar() {
        let mut pixels = vec![0u8; 50 * 4];
        let mut seed = 0x1357u32;
        for p in pixels.chunks_mut(4) {
            seed ^= seed << 7;
            seed ^= seed >> 9;
            seed ^= seed << 8;
            p[0] = seed as u8;
            p[1] = (seed >> 8) as u8;
            p[2] = (seed >> 16) as u8;
            p[3] = if seed % 13 == 0 { 10 } else { 255 };
        }

        let table = generate();
        let mut lut_out = vec![0u8; pixels.len() * 2 + 64];
        let mut lut_cursor = 0;
        let mut lut_state = crate::scalar::r::EncodeState::default();
        encode_pixels(&pixels, 4, &mut lut_state, &mut lut_out, &mut lut_cursor, true, true, &table).unwrap();
        lut_out.truncate(lut_cursor);

        let mut scalar_out = vec![0u8; pixels.len() * 2 + 64];
        let mut scalar_cursor = 0;
        let mut scalar_state = crate::scalar::r::EncodeState::default();
        crate::scalar::r::encode_pixels(
            &pixels,
            4,
            &mut scalar_state,
            &mut scalar_out,
            &mut scalar_cursor,
            true,
            true,
        )
        .unwrap();
        scalar_out.truncate(scalar_cursor);

        assert_eq!(lut_out, scalar_out);
    }
}
