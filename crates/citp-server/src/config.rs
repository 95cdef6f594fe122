//! Service configuration

use std::time::Duration;

/// Capability kill-switches
///
/// A disabled capability answers with a negative acknowledge before any
/// device lookup happens, so switched-off features never incur device
/// side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceFlags(u8);

impl ServiceFlags {
    pub const NONE: Self = Self(0);
    pub const DISABLE_LIBRARY_INFORMATION: Self = Self(0x01);
    pub const DISABLE_ELEMENT_INFORMATION: Self = Self(0x02);
    pub const DISABLE_LIBRARY_THUMBNAILS: Self = Self(0x04);
    pub const DISABLE_ELEMENT_THUMBNAILS: Self = Self(0x08);
    /// Gates both the video source listing and stream requests
    pub const DISABLE_STREAMING: Self = Self(0x10);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ServiceFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Capability kill-switches
    pub flags: ServiceFlags,
    /// Datagram size limit applied when framing outbound packets
    pub max_packet_size: usize,
    /// Idle window after which partial reassembly state is dropped
    pub reassembly_ttl: Duration,
    /// Stream frame production cadence
    pub stream_tick: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            flags: ServiceFlags::NONE,
            // largest UDP payload that fits a standard IPv4 datagram
            max_packet_size: 65_507,
            reassembly_ttl: Duration::from_secs(10),
            // 60 Hz
            stream_tick: Duration::from_micros(16_667),
        }
    }
}
