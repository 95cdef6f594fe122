//! Device collaborator interface
//!
//! The engine never enumerates real media or renders pixels itself; a
//! [`MediaServerDevice`] supplies identity, inventory and imagery.
//! Thumbnail and frame calls may be slow external work and are awaited
//! per item, so one source cannot stall another.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use citp_core::types::{
    ElementInformation, ElementLibraryInformation, ImageFormat, LayerStatus, LibraryId,
    LibraryType, VideoSourceInformation,
};
use citp_core::MsexVersion;

/// An element library with its contents, keyed by element number
#[derive(Debug, Clone)]
pub struct ElementLibrary {
    pub library_type: LibraryType,
    pub information: ElementLibraryInformation,
    pub elements: BTreeMap<u8, ElementInformation>,
}

/// Parameters of a thumbnail lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub width: u16,
    pub height: u16,
    pub format: ImageFormat,
    pub preserve_aspect_ratio: bool,
    /// Version the response will be encoded at; legacy pixel-format
    /// quirks are the device's concern
    pub version: MsexVersion,
}

/// A rendered thumbnail
#[derive(Debug, Clone)]
pub struct ThumbnailImage {
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

/// Parameters of a stream frame lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub source_identifier: u16,
    pub width: u16,
    pub height: u16,
    pub format: ImageFormat,
    pub fps: u8,
    pub version: MsexVersion,
}

/// A produced video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub format: ImageFormat,
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

/// Capability interface a media server host implements
#[async_trait]
pub trait MediaServerDevice: Send + Sync {
    /// Name announced on the peer information layer
    fn peer_name(&self) -> String;

    /// Free-form state string for peer announcements
    fn peer_state(&self) -> String;

    fn uuid(&self) -> Uuid;

    fn product_name(&self) -> String;

    /// (major, minor, bugfix)
    fn product_version(&self) -> (u8, u8, u8);

    fn supported_versions(&self) -> Vec<MsexVersion>;

    fn supported_library_types(&self) -> Vec<LibraryType>;

    fn supported_thumbnail_formats(&self) -> Vec<ImageFormat>;

    fn supported_stream_formats(&self) -> Vec<ImageFormat>;

    /// DMX source descriptor per mixing layer
    fn layer_dmx_sources(&self) -> Vec<String>;

    fn layer_statuses(&self) -> Vec<LayerStatus>;

    /// Current element library inventory
    fn element_libraries(&self) -> BTreeMap<LibraryId, ElementLibrary>;

    /// Renders a thumbnail for a whole library; `None` when no image
    /// exists for it
    async fn library_thumbnail(
        &self,
        request: ThumbnailRequest,
        library: &ElementLibraryInformation,
    ) -> Option<ThumbnailImage>;

    /// Renders a thumbnail for one element; `None` when no image exists
    /// for it
    async fn element_thumbnail(
        &self,
        request: ThumbnailRequest,
        library: &ElementLibraryInformation,
        element: &ElementInformation,
    ) -> Option<ThumbnailImage>;

    fn video_sources(&self) -> Vec<VideoSourceInformation>;

    /// Grabs the current frame for a streaming request; `None` when the
    /// source has nothing to deliver right now
    async fn video_frame(&self, request: FrameRequest) -> Option<VideoFrame>;
}
