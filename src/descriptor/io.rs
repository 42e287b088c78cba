//! File-based convenience wrappers over the in-memory codec.
//!
//! Thin glue over [`crate::encode_alloc`]/[`crate::decode_alloc`] and
//! `std::fs::File`; callers who want to stream a file larger than memory
//! allows should reach for [`crate::stream::encode_stream`]/
//! [`crate::stream::decode_stream`] directly instead.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{StreamDecodeError, StreamEncodeError};
use crate::{decode_alloc, encode_alloc, Descriptor, Format, Options};

/// Encodes `pixels` and writes a complete file (header, opcodes, terminator)
/// to `path`, creating it or truncating an existing one.
pub fn encode_file(
    path: &Path,
    pixels: &[u8],
    desc: &Descriptor,
    format: Format,
    options: Options,
) -> Result<(), StreamEncodeError> {
    let encoded = encode_alloc(pixels, desc, format, options)?;
    let mut file = File::create(path)?;
    file.write_all(&encoded)?;
    Ok(())
}

/// Reads a complete file at `path` and decodes it into a freshly allocated
/// pixel buffer. `requested_channels` is 0 (use the file's own channel
/// count), 3, or 4, exactly as in [`crate::decode_alloc`].
pub fn decode_file(path: &Path, requested_channels: u8) -> Result<(Vec<u8>, Descriptor), StreamDecodeError> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let (pixels, desc) = decode_alloc(&bytes, requested_channels)?;
    Ok((pixels, desc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;

    #[test]
    fn roundtrip_through_a_real_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("qoif-io-test-{}.qoi", std::process::id()));

        let desc = Descriptor::new(5, 5, 4, 0);
        let mut pixels = vec![0u8; 25 * 4];
        for (i, p) in pixels.chunks_mut(4).enumerate() {
            p[0] = i as u8;
            p[1] = (i * 2) as u8;
            p[2] = (i * 3) as u8;
            p[3] = 255;
        }

        encode_file(&path, &pixels, &desc, Format::Q, Options::default()).unwrap();
        let (decoded, parsed) = decode_file(&path, 0).unwrap();
        assert_eq!(parsed, desc);
        assert_eq!(decoded, pixels);

        std::fs::remove_file(&path).ok();
    }
}
