//! CITP Server
//!
//! Protocol engine for a CITP media server: per-connection dispatch,
//! stream-request scheduling and peer identity tracking on top of
//! [`citp_core`].
//!
//! Transport is deliberately out of scope. The host owns its sockets and
//! feeds received datagrams to [`CitpMediaServerService::handle_datagram`];
//! the engine hands back encoded responses to send. Device specifics
//! (real media libraries, thumbnail rendering, video capture) enter
//! through the [`MediaServerDevice`] trait.

pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod peers;
pub mod service;
pub mod streams;

pub use config::{ServiceConfig, ServiceFlags};
pub use connection::{Connection, ConnectionState};
pub use device::{
    ElementLibrary, FrameRequest, MediaServerDevice, ThumbnailImage, ThumbnailRequest, VideoFrame,
};
pub use error::{Result, ServiceError};
pub use peers::{Peer, PeerRegistry};
pub use service::CitpMediaServerService;
pub use streams::{StreamManager, StreamRequest};
