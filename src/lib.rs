//! Quite OK Image family codec: the baseline Q variant (wire-compatible
//! with the original "Quite OK Image" format, 64-entry running-color
//! index, INDEX/DIFF/LUMA/RUN/RGB/RGBA opcodes) and the wide-opcode R
//! variant (no index, a three-tier LUMA232/464/777 ladder, byte-aligned
//! little-endian multi-byte opcodes friendlier to vector lanes).
//!
//! Both variants share the same header shape (magic, BE width/height,
//! channels, colorspace), the same previous-pixel register initialized to
//! `{r:0, g:0, b:0, a:255}`, and the same 8-byte terminator
//! `00 00 00 00 00 00 00 01`.
//!
//! The crate is usable without `std` (and without `alloc`) through the
//! slice-based [`encode`]/[`decode`] entry points; [`encode_alloc`] and
//! [`decode_alloc`] are convenience wrappers that allocate the output
//! buffer for you.

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

pub mod bits;
pub mod descriptor;
pub mod error;
pub mod header;
#[cfg(feature = "mlut")]
pub mod mlut;
pub mod pixel;
pub mod scalar;
#[cfg(feature = "simd")]
pub mod simd;
#[cfg(feature = "io")]
pub mod stream;

pub use descriptor::Descriptor;
pub use error::{DecodeError, EncodeError, InvalidDescriptor, UnknownOption};

/// Which member of the family to encode or decode.
///
/// Decoding never needs this explicitly — [`decode`]/[`decode_alloc`] sniff
/// it from the header magic — but encoding does, since nothing else pins
/// down which wire format a caller wants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Baseline, wire-compatible with the original "Quite OK Image" format.
    Q,
    /// Wide-opcode, SIMD-friendly variant.
    R,
}

/// Which encoder implementation to prefer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Path {
    /// Portable, branch-per-opcode scalar loop.
    #[default]
    Scalar,
    /// Vectorized classification, falling back to scalar compaction.
    /// Only meaningful (and only compiled in) under the `simd` feature;
    /// requesting it without that feature silently behaves like `Scalar`.
    Sse,
}

/// Encode-time knobs. `rle` and `mlut` are meaningful for [`Format::R`]
/// only — [`Options::validate`] rejects setting them against [`Format::Q`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Options {
    /// Scalar vs SIMD encoder selection.
    pub path: Path,
    /// R-only: classify runs of identical pixels through LUMA232 like any
    /// other zero-delta step instead of collapsing them into RUN opcodes.
    /// Setting this to `false` sets colorspace bit 1 on encode.
    pub rle: bool,
    /// R-only: drive opcode selection from the mega-LUT encoder instead of
    /// the scalar classifier. Requires the `mlut` cargo feature.
    pub mlut: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { path: Path::Scalar, rle: true, mlut: false }
    }
}

impl Options {
    pub fn new(path: Path, rle: bool, mlut: bool) -> Self {
        Options { path, rle, mlut }
    }

    /// Rejects `rle`/`mlut` combinations the Q variant doesn't support.
    pub fn validate(&self, format: Format) -> Result<(), UnknownOption> {
        if format == Format::Q && (!self.rle || self.mlut) {
            return Err(UnknownOption::NotSupportedByVariant);
        }
        #[cfg(not(feature = "mlut"))]
        if self.mlut {
            return Err(UnknownOption::NotSupportedByVariant);
        }
        Ok(())
    }

    /// The header colorspace byte to write: the caller's base value, with
    /// bit 1 folded in for the R "RLE disabled" dialect.
    fn colorspace_byte(&self, format: Format, base_colorspace: u8) -> u8 {
        if format == Format::R && !self.rle {
            base_colorspace | 0b10
        } else {
            base_colorspace
        }
    }
}

/// Reads the file-format magic and returns which variant it names.
fn sniff_format(bytes: &[u8]) -> Result<Format, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::ShortRead);
    }
    match &bytes[0..4] {
        b"qoif" => Ok(Format::Q),
        b"roif" => Ok(Format::R),
        _ => Err(DecodeError::BadMagic),
    }
}

/// Upper bound on encoded size for an image matching `desc`, including the
/// header and terminator. Sized off each variant's worst-case
/// bytes-per-pixel; callers driving [`encode`] directly should allocate at
/// least this much.
pub fn encoded_size_limit(desc: &Descriptor, format: Format) -> usize {
    let per_pixel = match format {
        Format::Q => scalar::q::worst_case_opcode_len(desc.channels),
        Format::R => scalar::r::worst_case_opcode_len(desc.channels),
    };
    header::HEADER_SIZE + desc.pixel_count() as usize * per_pixel + header::TERMINATOR_SIZE
}

/// Encodes `pixels` (tightly packed, `desc.channels` bytes per pixel) into
/// `out`, returning the number of bytes written. `out` must be at least
/// [`encoded_size_limit`] bytes; the core never allocates.
pub fn encode(
    pixels: &[u8],
    desc: &Descriptor,
    format: Format,
    options: Options,
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    desc.validate_for_encode(format)?;
    options.validate(format)?;

    let channels = desc.channels;
    let needed_pixel_bytes = desc.pixel_count() as usize * channels as usize;
    if pixels.len() < needed_pixel_bytes {
        return Err(EncodeError::NotEnoughPixelData);
    }
    if out.len() < header::HEADER_SIZE {
        return Err(EncodeError::OutputIsTooSmall);
    }

    let colorspace = options.colorspace_byte(format, desc.colorspace);
    header::write(&mut out[..header::HEADER_SIZE], format, desc, colorspace);
    let mut cursor = header::HEADER_SIZE;

    let pixel_bytes = &pixels[..needed_pixel_bytes];
    match format {
        Format::Q => {
            let mut state = scalar::q::EncodeState::default();
            #[cfg(feature = "simd")]
            if options.path == Path::Sse {
                simd::q::encode_pixels(pixel_bytes, channels, &mut state, out, &mut cursor, true)?;
                return finish_encode(out, cursor);
            }
            scalar::q::encode_pixels(pixel_bytes, channels, &mut state, out, &mut cursor, true)?;
        }
        Format::R => {
            let mut state = scalar::r::EncodeState::default();
            #[cfg(feature = "mlut")]
            if options.mlut {
                let table = mlut::generate();
                mlut::encode_pixels(
                    pixel_bytes,
                    channels,
                    &mut state,
                    out,
                    &mut cursor,
                    options.rle,
                    true,
                    &table,
                )?;
                return finish_encode(out, cursor);
            }
            #[cfg(feature = "simd")]
            if options.path == Path::Sse {
                simd::r::encode_pixels(
                    pixel_bytes,
                    channels,
                    &mut state,
                    out,
                    &mut cursor,
                    options.rle,
                    true,
                )?;
                return finish_encode(out, cursor);
            }
            scalar::r::encode_pixels(
                pixel_bytes,
                channels,
                &mut state,
                out,
                &mut cursor,
                options.rle,
                true,
            )?;
        }
    }

    finish_encode(out, cursor)
}

/// Writes the shared 8-byte terminator at `cursor` and returns the total
/// encoded length. Shared by every encoder path `encode` can dispatch to.
fn finish_encode(out: &mut [u8], mut cursor: usize) -> Result<usize, EncodeError> {
    if out.len() < cursor + header::TERMINATOR_SIZE {
        return Err(EncodeError::OutputIsTooSmall);
    }
    header::write_terminator(&mut out[cursor..cursor + header::TERMINATOR_SIZE]);
    cursor += header::TERMINATOR_SIZE;
    Ok(cursor)
}

/// Encodes `pixels` into a freshly allocated buffer, trimmed to the actual
/// encoded length.
#[cfg(feature = "alloc")]
pub fn encode_alloc(
    pixels: &[u8],
    desc: &Descriptor,
    format: Format,
    options: Options,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = vec![0u8; encoded_size_limit(desc, format)];
    let len = encode(pixels, desc, format, options, &mut out)?;
    out.truncate(len);
    Ok(out)
}

/// Decodes `bytes` (a complete file: header, opcodes, terminator) into
/// `out`. `requested_channels` is 0 (use the file's own channel count), 3,
/// or 4; requesting 4 from a 3-channel file fills alpha with 255, and
/// requesting 3 from a 4-channel file drops alpha. Returns the descriptor
/// parsed from the header.
pub fn decode(bytes: &[u8], requested_channels: u8, out: &mut [u8]) -> Result<Descriptor, DecodeError> {
    if bytes.len() < header::HEADER_SIZE {
        return Err(DecodeError::ShortRead);
    }
    let format = sniff_format(bytes)?;
    let desc = header::parse(bytes, format)?;

    let out_channels = if requested_channels == 0 { desc.channels } else { requested_channels };
    let needed = desc.pixel_count() as usize * out_channels as usize;
    if out.len() < needed {
        return Err(DecodeError::OutputIsTooSmall);
    }

    let body = &bytes[header::HEADER_SIZE..];
    match format {
        Format::Q => scalar::q::decode_all(body, out_channels, desc.pixel_count(), &mut out[..needed])?,
        Format::R => scalar::r::decode_all(body, out_channels, desc.pixel_count(), &mut out[..needed])?,
    }
    Ok(desc)
}

/// Decodes `bytes` into a freshly allocated pixel buffer.
#[cfg(feature = "alloc")]
pub fn decode_alloc(bytes: &[u8], requested_channels: u8) -> Result<(Vec<u8>, Descriptor), DecodeError> {
    if bytes.len() < header::HEADER_SIZE {
        return Err(DecodeError::ShortRead);
    }
    let format = sniff_format(bytes)?;
    let desc = header::parse(bytes, format)?;
    let out_channels = if requested_channels == 0 { desc.channels } else { requested_channels };
    let mut out = vec![0u8; desc.pixel_count() as usize * out_channels as usize];
    decode(bytes, requested_channels, &mut out)?;
    Ok((out, desc))
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_q_rgba() {
        let w = 11u32;
        let h = 3u32;
        let desc = Descriptor::new(w, h, 4, 0);
        let mut pixels = vec![0u8; (w * h) as usize * 4];
        for (i, p) in pixels.chunks_mut(4).enumerate() {
            p[0] = i as u8;
            p[1] = (i * 7) as u8;
            p[2] = (i * 3) as u8;
            p[3] = if i % 5 == 0 { 128 } else { 255 };
        }
        let encoded = encode_alloc(&pixels, &desc, Format::Q, Options::default()).unwrap();
        assert_eq!(&encoded[0..4], b"qoif");
        let (decoded, parsed) = decode_alloc(&encoded, 0).unwrap();
        assert_eq!(parsed, desc);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn roundtrip_r_rgb_with_rle_disabled() {
        let w = 9u32;
        let h = 4u32;
        let desc = Descriptor::new(w, h, 3, 0);
        let mut pixels = vec![0u8; (w * h) as usize * 3];
        for (i, p) in pixels.chunks_mut(3).enumerate() {
            p[0] = (i * 5) as u8;
            p[1] = (i * 2) as u8;
            p[2] = i as u8;
        }
        let options = Options::new(Path::Scalar, false, false);
        let encoded = encode_alloc(&pixels, &desc, Format::R, options).unwrap();
        assert_eq!(&encoded[0..4], b"roif");
        assert_eq!(encoded[13] & 0b10, 0b10);
        let (decoded, parsed) = decode_alloc(&encoded, 0).unwrap();
        assert_eq!(parsed.colorspace & 0b10, 0b10);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn decode_expands_rgb_to_requested_rgba() {
        let desc = Descriptor::new(4, 1, 3, 0);
        let pixels = vec![1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let encoded = encode_alloc(&pixels, &desc, Format::R, Options::default()).unwrap();
        let (decoded, _) = decode_alloc(&encoded, 4).unwrap();
        assert_eq!(decoded.len(), 4 * 4);
        for p in decoded.chunks(4) {
            assert_eq!(p[3], 255);
        }
    }

    #[test]
    fn q_rejects_rle_disabled() {
        let desc = Descriptor::new(2, 2, 3, 0);
        let pixels = vec![0u8; 2 * 2 * 3];
        let err = encode_alloc(&pixels, &desc, Format::Q, Options::new(Path::Scalar, false, false))
            .unwrap_err();
        assert_eq!(err, EncodeError::UnknownOption(UnknownOption::NotSupportedByVariant));
    }
}
