//! Chunked streaming encode/decode driver: the one-shot codec applied over
//! a fixed-size working window so arbitrarily large images never need to
//! live fully in memory. State (run counter, previous pixel, Q's running
//! index) is threaded across chunk calls exactly as the one-shot driver
//! threads it across a single call.

use std::io::{Read, Write};

use crate::descriptor::Descriptor;
use crate::error::{StreamDecodeError, StreamEncodeError};
use crate::header;
use crate::scalar;
#[cfg(feature = "mlut")]
use crate::mlut;
#[cfg(feature = "simd")]
use crate::simd;
use crate::{sniff_format, Format, Options};
#[cfg(feature = "simd")]
use crate::Path;

/// Pixels per chunk; a multiple of 64 to leave room for SIMD-width tails.
const CHUNK_PIXELS: usize = 65_536;

/// Encodes pixels read from `reader` as `desc.pixel_count()` tightly packed
/// `desc.channels`-byte pixels, writing a complete file (header, opcodes,
/// terminator) to `writer`.
pub fn encode_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    desc: &Descriptor,
    format: Format,
    options: Options,
) -> Result<(), StreamEncodeError> {
    desc.validate_for_encode(format)?;
    options.validate(format)?;

    let channels = desc.channels as usize;
    let worst_case = match format {
        Format::Q => scalar::q::worst_case_opcode_len(desc.channels),
        Format::R => scalar::r::worst_case_opcode_len(desc.channels),
    };

    let mut header_buf = [0u8; header::HEADER_SIZE];
    let colorspace = options.colorspace_byte(format, desc.colorspace);
    header::write(&mut header_buf, format, desc, colorspace);
    writer.write_all(&header_buf)?;

    let mut in_buf = vec![0u8; CHUNK_PIXELS * channels];
    let mut out_buf = vec![0u8; CHUNK_PIXELS * worst_case];

    let mut q_state = scalar::q::EncodeState::default();
    let mut r_state = scalar::r::EncodeState::default();

    #[cfg(feature = "mlut")]
    let mlut_table = if format == Format::R && options.mlut { Some(mlut::generate()) } else { None };

    let mut remaining = desc.pixel_count();
    loop {
        let this_chunk_pixels = (remaining as usize).min(CHUNK_PIXELS);
        let is_last = this_chunk_pixels as u64 == remaining;
        let n_bytes = this_chunk_pixels * channels;
        if n_bytes > 0 {
            reader.read_exact(&mut in_buf[..n_bytes])?;
        }

        let mut cursor = 0;
        let chunk = &in_buf[..n_bytes];

        #[cfg(feature = "simd")]
        let want_simd = options.path == Path::Sse;
        #[cfg(not(feature = "simd"))]
        let want_simd = false;

        match format {
            Format::Q if want_simd => {
                #[cfg(feature = "simd")]
                simd::q::encode_pixels(chunk, desc.channels, &mut q_state, &mut out_buf, &mut cursor, is_last)?;
            }
            Format::Q => {
                scalar::q::encode_pixels(chunk, desc.channels, &mut q_state, &mut out_buf, &mut cursor, is_last)?;
            }
            #[cfg(feature = "mlut")]
            Format::R if mlut_table.is_some() => {
                mlut::encode_pixels(
                    chunk,
                    desc.channels,
                    &mut r_state,
                    &mut out_buf,
                    &mut cursor,
                    options.rle,
                    is_last,
                    mlut_table.as_ref().unwrap(),
                )?;
            }
            Format::R if want_simd => {
                #[cfg(feature = "simd")]
                simd::r::encode_pixels(
                    chunk,
                    desc.channels,
                    &mut r_state,
                    &mut out_buf,
                    &mut cursor,
                    options.rle,
                    is_last,
                )?;
            }
            Format::R => {
                scalar::r::encode_pixels(
                    chunk,
                    desc.channels,
                    &mut r_state,
                    &mut out_buf,
                    &mut cursor,
                    options.rle,
                    is_last,
                )?;
            }
        }
        writer.write_all(&out_buf[..cursor])?;

        remaining -= this_chunk_pixels as u64;
        if is_last {
            break;
        }
    }

    let mut terminator = [0u8; header::TERMINATOR_SIZE];
    header::write_terminator(&mut terminator);
    writer.write_all(&terminator)?;
    Ok(())
}

/// Decodes a complete file read from `reader`, writing `out_channels`-sized
/// pixels to `writer` as they're produced. Returns the descriptor parsed
/// from the header.
pub fn decode_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    requested_channels: u8,
) -> Result<Descriptor, StreamDecodeError> {
    let mut header_buf = [0u8; header::HEADER_SIZE];
    reader.read_exact(&mut header_buf)?;
    let format = sniff_format(&header_buf)?;
    let desc = header::parse(&header_buf, format)?;

    let out_channels = if requested_channels == 0 { desc.channels } else { requested_channels };
    let max_opcode_len = match format {
        Format::Q => 5,
        Format::R => 6,
    };

    let in_cap = CHUNK_PIXELS * max_opcode_len;
    let mut in_buf = vec![0u8; in_cap];
    let mut in_len = 0usize;
    let mut out_buf = vec![0u8; CHUNK_PIXELS * out_channels as usize];

    let mut q_state = scalar::q::DecodeState::default();
    let mut r_state = scalar::r::DecodeState::default();

    let mut remaining = desc.pixel_count();
    while remaining > 0 {
        let n_read = reader.read(&mut in_buf[in_len..])?;
        in_len += n_read;

        let (consumed, produced) = match format {
            Format::Q => scalar::q::decode_pixels(&in_buf[..in_len], out_channels, &mut q_state, &mut out_buf),
            Format::R => scalar::r::decode_pixels(&in_buf[..in_len], out_channels, &mut r_state, &mut out_buf),
        };

        if produced == 0 && n_read == 0 {
            return Err(StreamDecodeError::Decode(crate::DecodeError::TruncatedStream));
        }

        let produced_bytes = produced * out_channels as usize;
        writer.write_all(&out_buf[..produced_bytes])?;
        remaining -= produced as u64;

        in_buf.copy_within(consumed..in_len, 0);
        in_len -= consumed;
    }

    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Path;

    #[test]
    fn streaming_roundtrip_matches_one_shot_q() {
        let w = 200u32;
        let h = 3u32;
        let desc = Descriptor::new(w, h, 4, 0);
        let mut pixels = vec![0u8; (w * h) as usize * 4];
        for (i, p) in pixels.chunks_mut(4).enumerate() {
            p[0] = i as u8;
            p[1] = (i * 3) as u8;
            p[2] = (i * 5) as u8;
            p[3] = if i % 11 == 0 { 10 } else { 255 };
        }

        let mut encoded = Vec::new();
        encode_stream(&mut &pixels[..], &mut encoded, &desc, Format::Q, Options::default()).unwrap();

        let one_shot = crate::encode_alloc(&pixels, &desc, Format::Q, Options::default()).unwrap();
        assert_eq!(encoded, one_shot);

        let mut decoded = Vec::new();
        let parsed = decode_stream(&mut &encoded[..], &mut decoded, 0).unwrap();
        assert_eq!(parsed, desc);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn streaming_roundtrip_matches_one_shot_r() {
        let w = 300u32;
        let h = 1u32;
        let desc = Descriptor::new(w, h, 3, 0);
        let mut pixels = vec![0u8; w as usize * 3];
        for (i, p) in pixels.chunks_mut(3).enumerate() {
            p[0] = (i * 2) as u8;
            p[1] = i as u8;
            p[2] = (i / 2) as u8;
        }
        let options = Options::new(Path::Scalar, true, false);

        let mut encoded = Vec::new();
        encode_stream(&mut &pixels[..], &mut encoded, &desc, Format::R, options).unwrap();

        let mut decoded = Vec::new();
        let parsed = decode_stream(&mut &encoded[..], &mut decoded, 0).unwrap();
        assert_eq!(parsed, desc);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn truncated_source_is_reported() {
        let desc = Descriptor::new(50, 1, 3, 0);
        let pixels = vec![7u8; 50 * 3];
        let mut encoded = Vec::new();
        encode_stream(&mut &pixels[..], &mut encoded, &desc, Format::Q, Options::default()).unwrap();
        encoded.truncate(encoded.len() - 4);

        let mut decoded = Vec::new();
        let err = decode_stream(&mut &encoded[..], &mut decoded, 0).unwrap_err();
        assert!(matches!(err, StreamDecodeError::Decode(crate::DecodeError::TruncatedStream)));
    }
}
