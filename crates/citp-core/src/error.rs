//! Error types for the CITP codecs

use thiserror::Error;

use crate::fourcc::FourCC;
use crate::version::MsexVersion;

/// Result type alias for CITP codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// CITP codec error types
#[derive(Error, Debug)]
pub enum Error {
    /// FourCC with no mapping in the target enum
    #[error("unrecognised identifier: {0}")]
    UnrecognizedIdentifier(FourCC),

    /// Buffer underrun while decoding
    #[error("truncated data: need {needed} bytes, have {have}")]
    TruncatedData { needed: usize, have: usize },

    /// Wire or MSEX version outside the supported set
    #[error("unsupported version: v{major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// Packet does not start with the CITP cookie
    #[error("invalid packet cookie: {0}")]
    InvalidCookie(FourCC),

    /// Unknown layer identifier in the packet header
    #[error("unrecognised content type: {0}")]
    UnrecognizedContentType(FourCC),

    /// Unknown message type within a known layer
    #[error("unrecognised message type: {0}")]
    UnrecognizedMessageType(FourCC),

    /// String payload with bad UTF-8, a missing terminator or a wrong
    /// character count
    #[error("malformed string: {0}")]
    MalformedString(String),

    /// Unknown element library type value
    #[error("unrecognised library type: {0}")]
    UnrecognizedLibraryType(u8),

    /// Library identifier deeper than the version's path limit
    #[error("library id level {level} cannot be encoded for MSEX {version}")]
    LibraryIdTooDeep { level: u8, version: MsexVersion },

    /// Collection, string or buffer too large for its count prefix
    #[error("payload too large: {0} items or bytes")]
    PayloadTooLarge(usize),

    /// Maximum packet size leaves no room for any payload
    #[error("maximum packet size {0} does not exceed the header length")]
    FragmentLimit(usize),

    /// Message part index outside the declared part count
    #[error("part index {index} out of range for {count}-part message")]
    PartIndexOutOfRange { index: u16, count: u16 },
}
