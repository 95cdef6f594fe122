//! CITP Core
//!
//! Wire types and codecs for CITP (Controller Interface Transport
//! Protocol), the lighting-industry protocol consoles and media servers
//! use to discover each other, exchange library and thumbnail metadata
//! and stream preview video.
//!
//! This crate provides:
//! - FourCC identifier tables ([`FourCC`], [`LayerType`])
//! - Checked little-endian reading and writing ([`io`])
//! - The 20-byte packet envelope with fragmentation and reassembly
//!   ([`envelope`])
//! - Version-dependent entity serializers ([`types`], [`MsexVersion`])
//! - Packet definitions and the closed decode registry ([`CitpPacket`])
//!
//! Transport is out of scope: everything here operates on byte buffers
//! handed in by the caller.

pub mod envelope;
pub mod error;
pub mod fourcc;
pub mod io;
pub mod msex;
pub mod packet;
pub mod pinf;
pub mod types;
pub mod version;

pub use envelope::{Header, Reassembler};
pub use error::{Error, Result};
pub use fourcc::{FourCC, LayerType};
pub use msex::MsexMessage;
pub use packet::CitpPacket;
pub use pinf::PinfMessage;
pub use version::MsexVersion;

/// Cookie opening every CITP packet
pub const COOKIE: [u8; 4] = *b"CITP";

/// Wire-level protocol version, fixed at 1.0
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// Fixed envelope header length in bytes
pub const HEADER_SIZE: usize = 20;

/// Shortest well-formed packet: header plus a message-type identifier
pub const MIN_PACKET_SIZE: usize = 24;

/// Standard CITP multicast group and UDP port
pub const MULTICAST_ADDR: &str = "224.0.0.180";
pub const MULTICAST_PORT: u16 = 4809;
