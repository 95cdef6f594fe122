//! FourCC identifiers
//!
//! Every CITP layer and message type is named on the wire by a 4-byte
//! ASCII code. Each wire-mapped enum carries an exhaustive `id()` /
//! `from_id()` pair plus an `ALL` table, so the mapping is checked by the
//! compiler in one direction and by the bijection tests in the other.

use std::fmt;

use crate::error::{Error, Result};

/// A 4-byte ASCII wire identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC(\"{self}\")")
    }
}

/// CITP layer identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    PeerInformation,
    SendDmx,
    FixturePatch,
    FixtureSelection,
    FixtureInformation,
    MediaServerExtensions,
}

impl LayerType {
    pub const ALL: &'static [LayerType] = &[
        LayerType::PeerInformation,
        LayerType::SendDmx,
        LayerType::FixturePatch,
        LayerType::FixtureSelection,
        LayerType::FixtureInformation,
        LayerType::MediaServerExtensions,
    ];

    pub const fn id(self) -> FourCC {
        match self {
            LayerType::PeerInformation => FourCC(*b"PINF"),
            LayerType::SendDmx => FourCC(*b"SDMX"),
            LayerType::FixturePatch => FourCC(*b"FPTC"),
            LayerType::FixtureSelection => FourCC(*b"FSEL"),
            LayerType::FixtureInformation => FourCC(*b"FINF"),
            LayerType::MediaServerExtensions => FourCC(*b"MSEX"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"PINF" => Ok(LayerType::PeerInformation),
            b"SDMX" => Ok(LayerType::SendDmx),
            b"FPTC" => Ok(LayerType::FixturePatch),
            b"FSEL" => Ok(LayerType::FixtureSelection),
            b"FINF" => Ok(LayerType::FixtureInformation),
            b"MSEX" => Ok(LayerType::MediaServerExtensions),
            _ => Err(Error::UnrecognizedContentType(id)),
        }
    }
}

/// Send DMX layer message identifiers (layer declared, bodies out of scope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdmxMessageType {
    Capabilities,
    UniverseName,
    EncryptionIdentifier,
    ChannelBlock,
    ChannelList,
    SetExternalSource,
    SetExternalUniverseSource,
}

impl SdmxMessageType {
    pub const ALL: &'static [SdmxMessageType] = &[
        SdmxMessageType::Capabilities,
        SdmxMessageType::UniverseName,
        SdmxMessageType::EncryptionIdentifier,
        SdmxMessageType::ChannelBlock,
        SdmxMessageType::ChannelList,
        SdmxMessageType::SetExternalSource,
        SdmxMessageType::SetExternalUniverseSource,
    ];

    pub const fn id(self) -> FourCC {
        match self {
            SdmxMessageType::Capabilities => FourCC(*b"Capa"),
            SdmxMessageType::UniverseName => FourCC(*b"UNam"),
            SdmxMessageType::EncryptionIdentifier => FourCC(*b"EnId"),
            SdmxMessageType::ChannelBlock => FourCC(*b"ChBk"),
            SdmxMessageType::ChannelList => FourCC(*b"ChLs"),
            SdmxMessageType::SetExternalSource => FourCC(*b"SXSr"),
            SdmxMessageType::SetExternalUniverseSource => FourCC(*b"SXUS"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"Capa" => Ok(SdmxMessageType::Capabilities),
            b"UNam" => Ok(SdmxMessageType::UniverseName),
            b"EnId" => Ok(SdmxMessageType::EncryptionIdentifier),
            b"ChBk" => Ok(SdmxMessageType::ChannelBlock),
            b"ChLs" => Ok(SdmxMessageType::ChannelList),
            b"SXSr" => Ok(SdmxMessageType::SetExternalSource),
            b"SXUS" => Ok(SdmxMessageType::SetExternalUniverseSource),
            _ => Err(Error::UnrecognizedMessageType(id)),
        }
    }
}

/// Fixture patch layer message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FptcMessageType {
    Patch,
    Unpatch,
    SendPatch,
}

impl FptcMessageType {
    pub const ALL: &'static [FptcMessageType] = &[
        FptcMessageType::Patch,
        FptcMessageType::Unpatch,
        FptcMessageType::SendPatch,
    ];

    pub const fn id(self) -> FourCC {
        match self {
            FptcMessageType::Patch => FourCC(*b"Ptch"),
            FptcMessageType::Unpatch => FourCC(*b"UPtc"),
            FptcMessageType::SendPatch => FourCC(*b"SPtc"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"Ptch" => Ok(FptcMessageType::Patch),
            b"UPtc" => Ok(FptcMessageType::Unpatch),
            b"SPtc" => Ok(FptcMessageType::SendPatch),
            _ => Err(Error::UnrecognizedMessageType(id)),
        }
    }
}

/// Fixture selection layer message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FselMessageType {
    Select,
    Deselect,
}

impl FselMessageType {
    pub const ALL: &'static [FselMessageType] = &[FselMessageType::Select, FselMessageType::Deselect];

    pub const fn id(self) -> FourCC {
        match self {
            FselMessageType::Select => FourCC(*b"Sele"),
            FselMessageType::Deselect => FourCC(*b"DeSe"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"Sele" => Ok(FselMessageType::Select),
            b"DeSe" => Ok(FselMessageType::Deselect),
            _ => Err(Error::UnrecognizedMessageType(id)),
        }
    }
}

/// Fixture information layer message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinfMessageType {
    SendFrames,
    Frames,
    SendPosition,
    Position,
    LiveStatus,
}

impl FinfMessageType {
    pub const ALL: &'static [FinfMessageType] = &[
        FinfMessageType::SendFrames,
        FinfMessageType::Frames,
        FinfMessageType::SendPosition,
        FinfMessageType::Position,
        FinfMessageType::LiveStatus,
    ];

    pub const fn id(self) -> FourCC {
        match self {
            FinfMessageType::SendFrames => FourCC(*b"SFra"),
            FinfMessageType::Frames => FourCC(*b"Fram"),
            FinfMessageType::SendPosition => FourCC(*b"SPos"),
            FinfMessageType::Position => FourCC(*b"Posi"),
            FinfMessageType::LiveStatus => FourCC(*b"LSta"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"SFra" => Ok(FinfMessageType::SendFrames),
            b"Fram" => Ok(FinfMessageType::Frames),
            b"SPos" => Ok(FinfMessageType::SendPosition),
            b"Posi" => Ok(FinfMessageType::Position),
            b"LSta" => Ok(FinfMessageType::LiveStatus),
            _ => Err(Error::UnrecognizedMessageType(id)),
        }
    }
}
