use core::fmt::{self, Display};

/// Errors that can occur while validating an [`crate::Descriptor`] or
/// constructing an [`crate::Options`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidDescriptor {
    /// `width` or `height` is zero.
    ZeroDimension,
    /// `channels` is not 3 or 4.
    BadChannels,
    /// `colorspace` is out of range for the target variant.
    BadColorspace,
    /// `width * height` reaches or exceeds 400,000,000 pixels.
    TooManyPixels,
}

impl Display for InvalidDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidDescriptor::ZeroDimension => "width or height is zero",
            InvalidDescriptor::BadChannels => "channels must be 3 or 4",
            InvalidDescriptor::BadColorspace => "colorspace byte out of range",
            InvalidDescriptor::TooManyPixels => "width * height reaches the 400,000,000 pixel limit",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidDescriptor {}

/// Errors that may occur during image encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncodeError {
    /// The descriptor failed validation.
    InvalidDescriptor(InvalidDescriptor),
    /// The requested [`crate::Options`] aren't supported by the target format.
    UnknownOption(UnknownOption),
    /// The pixel buffer is smaller than `width * height * channels`.
    NotEnoughPixelData,
    /// The output buffer cannot hold the worst-case encoded size.
    OutputIsTooSmall,
}

impl From<InvalidDescriptor> for EncodeError {
    fn from(e: InvalidDescriptor) -> Self {
        EncodeError::InvalidDescriptor(e)
    }
}

impl From<UnknownOption> for EncodeError {
    fn from(e: UnknownOption) -> Self {
        EncodeError::UnknownOption(e)
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::InvalidDescriptor(e) => write!(f, "invalid descriptor: {}", e),
            EncodeError::UnknownOption(e) => write!(f, "{}", e),
            EncodeError::NotEnoughPixelData => f.write_str("pixel buffer too small for image"),
            EncodeError::OutputIsTooSmall => f.write_str("output buffer too small for encoded image"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// Errors that may occur during image decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// Buffer does not contain a full 14-byte header.
    ShortRead,
    /// Header magic did not match `qoif` or `roif`.
    BadMagic,
    /// Header `channels` byte was not 3 or 4.
    InvalidChannelsValue,
    /// Header `colorspace` byte was out of range for the variant.
    InvalidColorSpaceValue,
    /// `width * height` reaches or exceeds the 400,000,000 pixel limit.
    TooManyPixels,
    /// Output buffer cannot hold the decoded image.
    OutputIsTooSmall,
    /// The opcode stream ended before every pixel was produced.
    TruncatedStream,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecodeError::ShortRead => "buffer does not contain a full header",
            DecodeError::BadMagic => "header magic does not match qoif or roif",
            DecodeError::InvalidChannelsValue => "header channels value must be 3 or 4",
            DecodeError::InvalidColorSpaceValue => "header colorspace value out of range",
            DecodeError::TooManyPixels => "header declares more than 400,000,000 pixels",
            DecodeError::OutputIsTooSmall => "output buffer too small for decoded image",
            DecodeError::TruncatedStream => "opcode stream ended before all pixels were produced",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// Errors surfaced by [`crate::Options`] construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnknownOption {
    /// `rle`/`mlut` were requested for a variant that doesn't support them.
    NotSupportedByVariant,
}

impl Display for UnknownOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("option is not supported by the selected format variant")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownOption {}

/// Errors from the streaming driver, layering I/O failures over the
/// in-memory [`EncodeError`]/[`DecodeError`] kinds.
#[derive(Debug)]
#[cfg(feature = "io")]
pub enum StreamEncodeError {
    /// Propagated from the in-memory chunk encoder.
    Encode(EncodeError),
    /// The writer returned an error or short-wrote.
    Io(std::io::Error),
}

#[cfg(feature = "io")]
impl From<EncodeError> for StreamEncodeError {
    fn from(e: EncodeError) -> Self {
        StreamEncodeError::Encode(e)
    }
}

#[cfg(feature = "io")]
impl From<InvalidDescriptor> for StreamEncodeError {
    fn from(e: InvalidDescriptor) -> Self {
        StreamEncodeError::Encode(EncodeError::InvalidDescriptor(e))
    }
}

#[cfg(feature = "io")]
impl From<UnknownOption> for StreamEncodeError {
    fn from(e: UnknownOption) -> Self {
        StreamEncodeError::Encode(EncodeError::UnknownOption(e))
    }
}

#[cfg(feature = "io")]
impl From<std::io::Error> for StreamEncodeError {
    fn from(e: std::io::Error) -> Self {
        StreamEncodeError::Io(e)
    }
}

#[cfg(feature = "io")]
impl Display for StreamEncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEncodeError::Encode(e) => write!(f, "{}", e),
            StreamEncodeError::Io(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "io")]
impl std::error::Error for StreamEncodeError {}

#[derive(Debug)]
#[cfg(feature = "io")]
pub enum StreamDecodeError {
    /// Propagated from the in-memory chunk decoder.
    Decode(DecodeError),
    /// The reader/writer returned an error.
    Io(std::io::Error),
}

#[cfg(feature = "io")]
impl From<DecodeError> for StreamDecodeError {
    fn from(e: DecodeError) -> Self {
        StreamDecodeError::Decode(e)
    }
}

#[cfg(feature = "io")]
impl From<std::io::Error> for StreamDecodeError {
    fn from(e: std::io::Error) -> Self {
        StreamDecodeError::Io(e)
    }
}

#[cfg(feature = "io")]
impl Display for StreamDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDecodeError::Decode(e) => write!(f, "{}", e),
            StreamDecodeError::Io(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "io")]
impl std::error::Error for StreamDecodeError {}
