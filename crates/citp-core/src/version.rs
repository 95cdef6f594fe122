//! MSEX protocol versions

use std::fmt;

use crate::error::{Error, Result};

/// Negotiable MSEX versions
///
/// Several wire structures change field widths or drop fields entirely
/// depending on the version a message was encoded at; see [`crate::types`].
/// Negotiation failure is represented by [`Error::UnsupportedVersion`],
/// never by a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MsexVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl MsexVersion {
    pub const ALL: &'static [MsexVersion] =
        &[MsexVersion::V1_0, MsexVersion::V1_1, MsexVersion::V1_2];

    /// Highest version this implementation speaks
    pub const LATEST: MsexVersion = MsexVersion::V1_2;

    pub fn from_pair(major: u8, minor: u8) -> Result<Self> {
        match (major, minor) {
            (1, 0) => Ok(MsexVersion::V1_0),
            (1, 1) => Ok(MsexVersion::V1_1),
            (1, 2) => Ok(MsexVersion::V1_2),
            _ => Err(Error::UnsupportedVersion { major, minor }),
        }
    }

    pub const fn to_pair(self) -> (u8, u8) {
        match self {
            MsexVersion::V1_0 => (1, 0),
            MsexVersion::V1_1 => (1, 1),
            MsexVersion::V1_2 => (1, 2),
        }
    }

    /// Deepest library nesting expressible at this version
    pub const fn max_library_depth(self) -> u8 {
        match self {
            MsexVersion::V1_0 => 1,
            MsexVersion::V1_1 | MsexVersion::V1_2 => 3,
        }
    }
}

impl fmt::Display for MsexVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.to_pair();
        write!(f, "{major}.{minor}")
    }
}
