use crate::error::InvalidDescriptor;
use crate::Format;

#[cfg(feature = "io")]
pub mod io;

/// Maximum number of pixels an image may contain.
pub const PIXELS_MAX: u64 = 400_000_000;

/// Width/height/channels/colorspace tuple parsed from (or written to) a
/// 14-byte file header.
///
/// `colorspace` is kept as the raw header byte rather than collapsed into a
/// bool: the R variant overloads bit 1 to mean "encoder disabled RLE" (see
/// `Options::rle` and DESIGN.md), and a decoder must be able to read it back
/// even though the crate treats it as informational.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub colorspace: u8,
}

impl Descriptor {
    pub fn new(width: u32, height: u32, channels: u8, colorspace: u8) -> Self {
        Descriptor {
            width,
            height,
            channels,
            colorspace,
        }
    }

    /// True if the image carries an alpha channel.
    #[inline(always)]
    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    #[inline(always)]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Validates the descriptor for encoding under `format`.
    ///
    /// The colorspace byte accepted on *encode* input is stricter than what
    /// a decoder must tolerate on *input*: encoders only ever originate
    /// values 0 or 1; the RLE-disabled bit is added
    /// separately by the header codec from `Options::rle`, never supplied
    /// by the caller.
    pub fn validate_for_encode(&self, _format: Format) -> Result<(), InvalidDescriptor> {
        if self.width == 0 || self.height == 0 {
            return Err(InvalidDescriptor::ZeroDimension);
        }
        if self.channels != 3 && self.channels != 4 {
            return Err(InvalidDescriptor::BadChannels);
        }
        if self.colorspace > 1 {
            return Err(InvalidDescriptor::BadColorspace);
        }
        if self.pixel_count() >= PIXELS_MAX {
            return Err(InvalidDescriptor::TooManyPixels);
        }
        Ok(())
    }

    /// Validates a descriptor parsed off the wire for `format`.
    ///
    /// Unlike `validate_for_encode`, the R variant tolerates colorspace
    /// values up to 3 here (bit 1 may legitimately be set by an encoder
    /// that disabled RLE; bits above that are reserved for future
    /// extension and are only required to round-trip, not to be
    /// meaningful).
    pub fn validate_for_decode(&self, format: Format) -> Result<(), InvalidDescriptor> {
        if self.width == 0 || self.height == 0 {
            return Err(InvalidDescriptor::ZeroDimension);
        }
        if self.channels != 3 && self.channels != 4 {
            return Err(InvalidDescriptor::BadChannels);
        }
        let max_colorspace = match format {
            Format::Q => 1,
            Format::R => 3,
        };
        if self.colorspace > max_colorspace {
            return Err(InvalidDescriptor::BadColorspace);
        }
        if self.pixel_count() >= PIXELS_MAX {
            return Err(InvalidDescriptor::TooManyPixels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dims() {
        let d = Descriptor::new(0, 4, 3, 0);
        assert_eq!(
            d.validate_for_encode(Format::Q),
            Err(InvalidDescriptor::ZeroDimension)
        );
    }

    #[test]
    fn rejects_bad_channels() {
        let d = Descriptor::new(4, 4, 5, 0);
        assert_eq!(
            d.validate_for_encode(Format::R),
            Err(InvalidDescriptor::BadChannels)
        );
    }

    #[test]
    fn rejects_huge_images() {
        let d = Descriptor::new(30_000, 30_000, 3, 0);
        assert_eq!(
            d.validate_for_encode(Format::Q),
            Err(InvalidDescriptor::TooManyPixels)
        );
    }

    #[test]
    fn r_decode_tolerates_colorspace_bit1() {
        let d = Descriptor::new(4, 4, 3, 2);
        assert!(d.validate_for_decode(Format::R).is_ok());
        assert_eq!(
            d.validate_for_decode(Format::Q),
            Err(InvalidDescriptor::BadColorspace)
        );
    }
}
