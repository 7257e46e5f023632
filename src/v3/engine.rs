//! Authoritative engine identity: engine id and engine time.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// RFC 3411 format prefix: enterprise 20408 with the "octets" format (5).
const ENGINE_ID_PREFIX: [u8; 5] = [0x80, 0x00, 0x4f, 0xb8, 0x05];

/// Longest engine id RFC 3411 allows.
pub const MAX_ENGINE_ID_LEN: usize = 32;

const HOST_ID_SOURCES: [&str; 3] = [
    "/etc/machine-id",
    "/var/lib/dbus/machine-id",
    "/proc/sys/kernel/hostname",
];

const FALLBACK_HOST_ID: &[u8] = b"async-snmp-agent";

/// snmpEngineID of this agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineId(Bytes);

impl EngineId {
    /// Wrap administratively assigned data with the standard prefix.
    ///
    /// The result is truncated to [`MAX_ENGINE_ID_LEN`].
    pub fn from_data(data: &[u8]) -> Self {
        let mut id = Vec::with_capacity(MAX_ENGINE_ID_LEN);
        id.extend_from_slice(&ENGINE_ID_PREFIX);
        id.extend_from_slice(data);
        id.truncate(MAX_ENGINE_ID_LEN);
        Self(Bytes::from(id))
    }

    /// Use raw bytes as the engine id, without adding a prefix.
    pub fn from_raw(raw: impl Into<Bytes>) -> Self {
        let mut raw: Bytes = raw.into();
        raw.truncate(MAX_ENGINE_ID_LEN);
        Self(raw)
    }

    /// Derive the engine id from a stable host identifier.
    pub fn from_host() -> Self {
        let data = HOST_ID_SOURCES
            .iter()
            .find_map(|path| {
                let raw = std::fs::read(path).ok()?;
                let trimmed = raw.trim_ascii();
                (!trimmed.is_empty()).then(|| trimmed.to_vec())
            })
            .unwrap_or_else(|| FALLBACK_HOST_ID.to_vec());
        Self::from_data(&data)
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::from_host()
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Source of snmpEngineTime, in seconds.
pub trait TimeSource: Send + Sync {
    fn engine_time(&self) -> u32;
}

impl<F> TimeSource for F
where
    F: Fn() -> u32 + Send + Sync,
{
    fn engine_time(&self) -> u32 {
        self()
    }
}

/// Host uptime from `/proc/uptime`, or wall-clock seconds where that is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostUptime;

impl TimeSource for HostUptime {
    fn engine_time(&self) -> u32 {
        read_uptime().unwrap_or_else(wall_clock_secs)
    }
}

fn read_uptime() -> Option<u32> {
    let text = std::fs::read_to_string("/proc/uptime").ok()?;
    let secs: f64 = text.split_whitespace().next()?.parse().ok()?;
    Some(secs as u32)
}

fn wall_clock_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_prefix_and_truncation() {
        let id = EngineId::from_data(&[0x41; 64]);
        assert_eq!(id.as_bytes().len(), MAX_ENGINE_ID_LEN);
        assert_eq!(&id.as_bytes()[..5], &ENGINE_ID_PREFIX);
    }

    #[test]
    fn test_from_host_is_stable() {
        let a = EngineId::from_host();
        let b = EngineId::from_host();
        assert_eq!(a, b);
        assert!(a.as_bytes().len() > ENGINE_ID_PREFIX.len());
    }

    #[test]
    fn test_display_hex() {
        assert_eq!(EngineId::from_data(b"A").to_string(), "80004fb80541");
    }

    #[test]
    fn test_closure_time_source() {
        let source = || 77u32;
        assert_eq!(source.engine_time(), 77);
        let shared: Arc<dyn TimeSource> = Arc::new(HostUptime);
        assert!(shared.engine_time() > 0);
    }
}
