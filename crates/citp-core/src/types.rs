//! Protocol entities and their version-dependent serializers
//!
//! Every entity owns an `encode`/`decode` pair that branches exhaustively
//! on [`MsexVersion`]. Field widths and presence differ between versions;
//! an unsupported combination is a hard error, never a silent clamp.

use std::cmp::Ordering;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::io::{CountWidth, Reader, Writer};
use crate::version::MsexVersion;

/// Hierarchical address of an element library
///
/// `level` is the nesting depth and `path[..level]` the library number at
/// each level; the root has level 0 and no number of its own. Under MSEX
/// 1.0 only a flat, single-level number exists on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryId {
    level: u8,
    path: [u8; 3],
}

impl LibraryId {
    pub const ROOT: LibraryId = LibraryId {
        level: 0,
        path: [0; 3],
    };

    /// Deepest nesting any MSEX version can express
    pub const MAX_LEVEL: u8 = 3;

    pub fn new(level: u8, path: [u8; 3]) -> Result<Self> {
        if level > Self::MAX_LEVEL {
            return Err(Error::LibraryIdTooDeep {
                level,
                version: MsexVersion::LATEST,
            });
        }
        // Entries past the level are not addressable; zero them so equality
        // and ordering see one canonical form.
        let mut canonical = [0u8; 3];
        canonical[..level as usize].copy_from_slice(&path[..level as usize]);
        Ok(LibraryId {
            level,
            path: canonical,
        })
    }

    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Library number within the parent; `None` for the root
    pub fn library_number(&self) -> Option<u8> {
        if self.level == 0 {
            None
        } else {
            Some(self.path[self.level as usize - 1])
        }
    }

    /// Identifier of the library numbered `number` directly below this one
    pub fn child(&self, number: u8) -> Result<Self> {
        if self.level >= Self::MAX_LEVEL {
            return Err(Error::LibraryIdTooDeep {
                level: self.level + 1,
                version: MsexVersion::LATEST,
            });
        }
        let mut path = self.path;
        path[self.level as usize] = number;
        Ok(LibraryId {
            level: self.level + 1,
            path,
        })
    }

    /// Whether this library sits directly under `parent`
    pub fn is_child_of(&self, parent: &LibraryId) -> bool {
        self.level == parent.level + 1
            && self.path[..parent.level as usize] == parent.path[..parent.level as usize]
    }

    /// True while the version's depth limit leaves room for children
    pub fn can_have_children(&self, version: MsexVersion) -> bool {
        self.level < version.max_library_depth()
    }

    pub fn encode(&self, w: &mut Writer, version: MsexVersion) -> Result<()> {
        match version {
            MsexVersion::V1_0 => {
                if self.level > version.max_library_depth() {
                    return Err(Error::LibraryIdTooDeep {
                        level: self.level,
                        version,
                    });
                }
                // the root itself has no number; it flattens to 0
                w.u8(self.library_number().unwrap_or(0));
            }
            MsexVersion::V1_1 | MsexVersion::V1_2 => {
                w.u8(self.level);
                w.bytes(&self.path);
            }
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>, version: MsexVersion) -> Result<Self> {
        match version {
            MsexVersion::V1_0 => {
                let number = r.u8()?;
                LibraryId::ROOT.child(number)
            }
            MsexVersion::V1_1 | MsexVersion::V1_2 => {
                let level = r.u8()?;
                let raw = r.bytes(3)?;
                let mut path = [0u8; 3];
                path.copy_from_slice(raw);
                LibraryId::new(level, path)
            }
        }
    }

    fn effective_path(&self) -> &[u8] {
        &self.path[..self.level as usize]
    }
}

impl PartialOrd for LibraryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LibraryId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.effective_path().cmp(other.effective_path())
    }
}

/// Element library categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LibraryType {
    Media = 1,
    Effects = 2,
    Cues = 3,
    Crossfades = 4,
    Mask = 5,
    BlendPresets = 6,
    EffectPresets = 7,
    ImagePresets = 8,
    Meshes = 9,
}

impl LibraryType {
    pub const ALL: &'static [LibraryType] = &[
        LibraryType::Media,
        LibraryType::Effects,
        LibraryType::Cues,
        LibraryType::Crossfades,
        LibraryType::Mask,
        LibraryType::BlendPresets,
        LibraryType::EffectPresets,
        LibraryType::ImagePresets,
        LibraryType::Meshes,
    ];

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(LibraryType::Media),
            2 => Ok(LibraryType::Effects),
            3 => Ok(LibraryType::Cues),
            4 => Ok(LibraryType::Crossfades),
            5 => Ok(LibraryType::Mask),
            6 => Ok(LibraryType::BlendPresets),
            7 => Ok(LibraryType::EffectPresets),
            8 => Ok(LibraryType::ImagePresets),
            9 => Ok(LibraryType::Meshes),
            other => Err(Error::UnrecognizedLibraryType(other)),
        }
    }

    /// Bitmask form used by the server information message
    pub fn mask(types: &[LibraryType]) -> u16 {
        types.iter().fold(0, |mask, t| mask | 1 << (*t as u8 - 1))
    }

    pub fn from_mask(mask: u16) -> Vec<LibraryType> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| mask & (1 << (*t as u8 - 1)) != 0)
            .collect()
    }
}

/// Thumbnail and stream image encodings
///
/// The pixel payload itself is opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Rgb8,
    Png,
    Jpeg,
    FragmentedJpeg,
    FragmentedPng,
}

impl ImageFormat {
    pub const ALL: &'static [ImageFormat] = &[
        ImageFormat::Rgb8,
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::FragmentedJpeg,
        ImageFormat::FragmentedPng,
    ];

    pub const fn id(self) -> FourCC {
        match self {
            ImageFormat::Rgb8 => FourCC(*b"RGB8"),
            ImageFormat::Png => FourCC(*b"PNG "),
            ImageFormat::Jpeg => FourCC(*b"JPEG"),
            ImageFormat::FragmentedJpeg => FourCC(*b"fJPG"),
            ImageFormat::FragmentedPng => FourCC(*b"fPNG"),
        }
    }

    pub fn from_id(id: FourCC) -> Result<Self> {
        match &id.0 {
            b"RGB8" => Ok(ImageFormat::Rgb8),
            b"PNG " => Ok(ImageFormat::Png),
            b"JPEG" => Ok(ImageFormat::Jpeg),
            b"fJPG" => Ok(ImageFormat::FragmentedJpeg),
            b"fPNG" => Ok(ImageFormat::FragmentedPng),
            _ => Err(Error::UnrecognizedIdentifier(id)),
        }
    }
}

/// Status bits reported for a media layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerStatusFlags(pub u32);

impl LayerStatusFlags {
    pub const NONE: Self = Self(0);
    pub const MEDIA_PLAYING: Self = Self(0x0001);
    pub const MEDIA_PLAYBACK_REVERSE: Self = Self(0x0002);
    pub const MEDIA_PLAYBACK_LOOPING: Self = Self(0x0004);
    pub const MEDIA_PLAYBACK_BOUNCING: Self = Self(0x0008);
    pub const MEDIA_PLAYBACK_RANDOM: Self = Self(0x0010);
    pub const MEDIA_PAUSED: Self = Self(0x0020);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LayerStatusFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Change bits carried by a library-updated notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementLibraryUpdatedFlags(pub u8);

impl ElementLibraryUpdatedFlags {
    pub const NONE: Self = Self(0);
    pub const EXISTING_ELEMENTS_UPDATED: Self = Self(0x01);
    pub const ELEMENTS_ADDED_OR_REMOVED: Self = Self(0x02);
    pub const SUB_LIBRARIES_UPDATED: Self = Self(0x04);
    pub const SUB_LIBRARIES_ADDED_OR_REMOVED: Self = Self(0x08);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ElementLibraryUpdatedFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Options on a thumbnail request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThumbnailFlags(pub u8);

impl ThumbnailFlags {
    pub const NONE: Self = Self(0);
    pub const PRESERVE_ASPECT_RATIO: Self = Self(0x01);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ThumbnailFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Capability bits of a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoSourceFlags(pub u16);

impl VideoSourceFlags {
    pub const NONE: Self = Self(0);
    pub const WITHOUT_EFFECTS: Self = Self(0x0001);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for VideoSourceFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Descriptor for one element library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLibraryInformation {
    pub id: LibraryId,
    /// On the wire for MSEX 1.2 only
    pub serial_number: u32,
    pub dmx_range_min: u8,
    pub dmx_range_max: u8,
    pub name: String,
    pub library_count: u16,
    pub element_count: u16,
}

impl ElementLibraryInformation {
    pub fn encode(&self, w: &mut Writer, version: MsexVersion) -> Result<()> {
        self.id.encode(w, version)?;
        if version == MsexVersion::V1_2 {
            w.u32(self.serial_number);
        }
        w.u8(self.dmx_range_min);
        w.u8(self.dmx_range_max);
        w.string(&self.name)?;
        match version {
            MsexVersion::V1_0 => w.u8(self.element_count as u8),
            MsexVersion::V1_1 => {
                w.u8(self.library_count as u8);
                w.u8(self.element_count as u8);
            }
            MsexVersion::V1_2 => {
                w.u16(self.library_count);
                w.u16(self.element_count);
            }
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>, version: MsexVersion) -> Result<Self> {
        let id = LibraryId::decode(r, version)?;
        let serial_number = if version == MsexVersion::V1_2 {
            r.u32()?
        } else {
            0
        };
        let dmx_range_min = r.u8()?;
        let dmx_range_max = r.u8()?;
        let name = r.string()?;
        let (library_count, element_count) = match version {
            MsexVersion::V1_0 => (0, u16::from(r.u8()?)),
            MsexVersion::V1_1 => (u16::from(r.u8()?), u16::from(r.u8()?)),
            MsexVersion::V1_2 => (r.u16()?, r.u16()?),
        };
        Ok(ElementLibraryInformation {
            id,
            serial_number,
            dmx_range_min,
            dmx_range_max,
            name,
            library_count,
            element_count,
        })
    }
}

impl PartialOrd for ElementLibraryInformation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementLibraryInformation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.serial_number.cmp(&other.serial_number))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| {
                (
                    self.dmx_range_min,
                    self.dmx_range_max,
                    self.library_count,
                    self.element_count,
                )
                    .cmp(&(
                        other.dmx_range_min,
                        other.dmx_range_max,
                        other.library_count,
                        other.element_count,
                    ))
            })
    }
}

/// Kind-specific payload of an element descriptor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementKind {
    Media {
        version_timestamp: u64,
        width: u16,
        height: u16,
        length: u32,
        fps: u8,
    },
    Effect {
        parameter_names: Vec<String>,
    },
    Generic {
        version_timestamp: u64,
    },
}

impl ElementKind {
    fn rank(&self) -> u8 {
        match self {
            ElementKind::Media { .. } => 0,
            ElementKind::Effect { .. } => 1,
            ElementKind::Generic { .. } => 2,
        }
    }
}

/// Descriptor for one element within a library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInformation {
    /// Unique within the owning library
    pub number: u8,
    /// On the wire for MSEX 1.2 only
    pub serial_number: u32,
    pub dmx_range_min: u8,
    pub dmx_range_max: u8,
    pub name: String,
    pub kind: ElementKind,
}

impl ElementInformation {
    fn encode_shared(&self, w: &mut Writer, version: MsexVersion) -> Result<()> {
        w.u8(self.number);
        if version == MsexVersion::V1_2 {
            w.u32(self.serial_number);
        }
        w.u8(self.dmx_range_min);
        w.u8(self.dmx_range_max);
        w.string(&self.name)
    }

    pub fn encode(&self, w: &mut Writer, version: MsexVersion) -> Result<()> {
        self.encode_shared(w, version)?;
        match &self.kind {
            ElementKind::Media {
                version_timestamp,
                width,
                height,
                length,
                fps,
            } => {
                w.u64(*version_timestamp);
                w.u16(*width);
                w.u16(*height);
                w.u32(*length);
                w.u8(*fps);
                Ok(())
            }
            ElementKind::Effect { parameter_names } => {
                w.collection(CountWidth::One, parameter_names, |w, name| w.string(name))
            }
            ElementKind::Generic { version_timestamp } => {
                w.u64(*version_timestamp);
                Ok(())
            }
        }
    }

    fn decode_shared(r: &mut Reader<'_>, version: MsexVersion) -> Result<(u8, u32, u8, u8, String)> {
        let number = r.u8()?;
        let serial_number = if version == MsexVersion::V1_2 {
            r.u32()?
        } else {
            0
        };
        let dmx_range_min = r.u8()?;
        let dmx_range_max = r.u8()?;
        let name = r.string()?;
        Ok((number, serial_number, dmx_range_min, dmx_range_max, name))
    }

    pub fn decode_media(r: &mut Reader<'_>, version: MsexVersion) -> Result<Self> {
        let (number, serial_number, dmx_range_min, dmx_range_max, name) =
            Self::decode_shared(r, version)?;
        Ok(ElementInformation {
            number,
            serial_number,
            dmx_range_min,
            dmx_range_max,
            name,
            kind: ElementKind::Media {
                version_timestamp: r.u64()?,
                width: r.u16()?,
                height: r.u16()?,
                length: r.u32()?,
                fps: r.u8()?,
            },
        })
    }

    pub fn decode_effect(r: &mut Reader<'_>, version: MsexVersion) -> Result<Self> {
        let (number, serial_number, dmx_range_min, dmx_range_max, name) =
            Self::decode_shared(r, version)?;
        let parameter_names = r.collection(CountWidth::One, |r| r.string())?;
        Ok(ElementInformation {
            number,
            serial_number,
            dmx_range_min,
            dmx_range_max,
            name,
            kind: ElementKind::Effect { parameter_names },
        })
    }

    pub fn decode_generic(r: &mut Reader<'_>, version: MsexVersion) -> Result<Self> {
        let (number, serial_number, dmx_range_min, dmx_range_max, name) =
            Self::decode_shared(r, version)?;
        Ok(ElementInformation {
            number,
            serial_number,
            dmx_range_min,
            dmx_range_max,
            name,
            kind: ElementKind::Generic {
                version_timestamp: r.u64()?,
            },
        })
    }
}

impl PartialOrd for ElementInformation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementInformation {
    // kind first, then element number; remaining fields only break ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .rank()
            .cmp(&other.kind.rank())
            .then_with(|| self.number.cmp(&other.number))
            .then_with(|| self.serial_number.cmp(&other.serial_number))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| {
                (self.dmx_range_min, self.dmx_range_max).cmp(&(other.dmx_range_min, other.dmx_range_max))
            })
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

/// A video source available for streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSourceInformation {
    pub source_identifier: u16,
    pub source_name: String,
    /// `None` encodes as the 0xFF sentinel
    pub physical_output: Option<u8>,
    /// `None` encodes as the 0xFF sentinel
    pub layer_number: Option<u8>,
    pub flags: VideoSourceFlags,
    pub width: u16,
    pub height: u16,
}

impl VideoSourceInformation {
    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        w.u16(self.source_identifier);
        w.string(&self.source_name)?;
        w.u8(self.physical_output.unwrap_or(0xFF));
        w.u8(self.layer_number.unwrap_or(0xFF));
        w.u16(self.flags.0);
        w.u16(self.width);
        w.u16(self.height);
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let source_identifier = r.u16()?;
        let source_name = r.string()?;
        let physical_output = match r.u8()? {
            0xFF => None,
            value => Some(value),
        };
        let layer_number = match r.u8()? {
            0xFF => None,
            value => Some(value),
        };
        let flags = VideoSourceFlags(r.u16()?);
        let width = r.u16()?;
        let height = r.u16()?;
        Ok(VideoSourceInformation {
            source_identifier,
            source_name,
            physical_output,
            layer_number,
            flags,
            width,
            height,
        })
    }
}

impl PartialOrd for VideoSourceInformation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VideoSourceInformation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source_identifier
            .cmp(&other.source_identifier)
            .then_with(|| self.source_name.cmp(&other.source_name))
            .then_with(|| {
                (
                    self.physical_output,
                    self.layer_number,
                    self.flags.0,
                    self.width,
                    self.height,
                )
                    .cmp(&(
                        other.physical_output,
                        other.layer_number,
                        other.flags.0,
                        other.width,
                        other.height,
                    ))
            })
    }
}

/// Playback status of one media layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStatus {
    pub layer_number: u8,
    pub physical_output: u8,
    pub media_library: LibraryId,
    pub media_number: u8,
    pub media_name: String,
    pub media_position: u32,
    pub media_length: u32,
    pub media_fps: u8,
    pub flags: LayerStatusFlags,
}

impl LayerStatus {
    pub fn encode(&self, w: &mut Writer, version: MsexVersion) -> Result<()> {
        w.u8(self.layer_number);
        w.u8(self.physical_output);
        self.media_library.encode(w, version)?;
        w.u8(self.media_number);
        w.string(&self.media_name)?;
        w.u32(self.media_position);
        w.u32(self.media_length);
        w.u8(self.media_fps);
        w.u32(self.flags.0);
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>, version: MsexVersion) -> Result<Self> {
        Ok(LayerStatus {
            layer_number: r.u8()?,
            physical_output: r.u8()?,
            media_library: LibraryId::decode(r, version)?,
            media_number: r.u8()?,
            media_name: r.string()?,
            media_position: r.u32()?,
            media_length: r.u32()?,
            media_fps: r.u8()?,
            flags: LayerStatusFlags(r.u32()?),
        })
    }
}

// image payloads are u16-length-prefixed opaque bytes
pub(crate) fn write_image_buffer(w: &mut Writer, data: &Bytes) -> Result<()> {
    if data.len() > u16::MAX as usize {
        return Err(Error::PayloadTooLarge(data.len()));
    }
    w.u16(data.len() as u16);
    w.bytes(data);
    Ok(())
}

pub(crate) fn read_image_buffer(r: &mut Reader<'_>) -> Result<Bytes> {
    let len = r.u16()? as usize;
    Ok(Bytes::copy_from_slice(r.bytes(len)?))
}
