use crate::bits::{peek_u32be, poke_u32be};
use crate::descriptor::Descriptor;
use crate::error::DecodeError;
use crate::Format;

pub const HEADER_SIZE: usize = 14;
pub const TERMINATOR_SIZE: usize = 8;

const MAGIC_Q: u32 = u32::from_be_bytes(*b"qoif");
const MAGIC_R: u32 = u32::from_be_bytes(*b"roif");

#[inline(always)]
fn magic_for(format: Format) -> u32 {
    match format {
        Format::Q => MAGIC_Q,
        Format::R => MAGIC_R,
    }
}

/// Writes the 14-byte header: magic(4, BE) || width(4, BE) || height(4, BE)
/// || channels(1) || colorspace(1).
///
/// `colorspace` here is the raw byte to write (already folded with the
/// RLE-disabled bit for R, see `Options::colorspace_bit`); callers validate
/// the descriptor before calling this.
pub fn write(buf: &mut [u8], format: Format, desc: &Descriptor, colorspace: u8) {
    let mut c = 0;
    poke_u32be(buf, &mut c, magic_for(format));
    poke_u32be(buf, &mut c, desc.width);
    poke_u32be(buf, &mut c, desc.height);
    buf[c] = desc.channels;
    buf[c + 1] = colorspace;
}

/// Parses a 14-byte header and validates it for `format`.
pub fn parse(buf: &[u8], format: Format) -> Result<Descriptor, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::ShortRead);
    }

    let magic = peek_u32be(buf, 0);
    if magic != magic_for(format) {
        return Err(DecodeError::BadMagic);
    }

    let width = peek_u32be(buf, 4);
    let height = peek_u32be(buf, 8);
    let channels = buf[12];
    let colorspace = buf[13];

    if width == 0 || height == 0 {
        return Err(DecodeError::TooManyPixels);
    }
    if channels != 3 && channels != 4 {
        return Err(DecodeError::InvalidChannelsValue);
    }
    let max_colorspace = match format {
        Format::Q => 1,
        Format::R => 3,
    };
    if colorspace > max_colorspace {
        return Err(DecodeError::InvalidColorSpaceValue);
    }
    if width as u64 * height as u64 >= crate::descriptor::PIXELS_MAX {
        return Err(DecodeError::TooManyPixels);
    }

    Ok(Descriptor { width, height, channels, colorspace })
}

/// Writes the 8-byte terminator `00 00 00 00 00 00 00 01`.
#[inline(always)]
pub fn write_terminator(buf: &mut [u8]) {
    buf[..7].fill(0);
    buf[7] = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_q() {
        let desc = Descriptor::new(640, 480, 4, 0);
        let mut buf = [0u8; HEADER_SIZE];
        write(&mut buf, Format::Q, &desc, desc.colorspace);
        let parsed = parse(&buf, Format::Q).unwrap();
        assert_eq!(parsed, desc);
        assert_eq!(&buf[0..4], b"qoif");
    }

    #[test]
    fn header_roundtrip_r_with_rle_bit() {
        let desc = Descriptor::new(10, 10, 3, 0);
        let mut buf = [0u8; HEADER_SIZE];
        write(&mut buf, Format::R, &desc, 2); // rle disabled
        let parsed = parse(&buf, Format::R).unwrap();
        assert_eq!(parsed.colorspace, 2);
        assert_eq!(&buf[0..4], b"roif");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"xoif");
        assert_eq!(parse(&buf, Format::Q), Err(DecodeError::BadMagic));
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; 4];
        assert_eq!(parse(&buf, Format::Q), Err(DecodeError::ShortRead));
    }

    #[test]
    fn q_rejects_colorspace_above_one() {
        let mut buf = [0u8; HEADER_SIZE];
        write(&mut buf, Format::Q, &Descriptor::new(1, 1, 3, 0), 2);
        assert_eq!(parse(&buf, Format::Q), Err(DecodeError::InvalidColorSpaceValue));
    }
}
