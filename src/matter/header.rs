//! Matter header: who wrote it, when, and with which format version.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BytesMut;

use crate::codec::{put_utf, put_var_u32, put_var_u64, ByteReader};
use crate::error::Result;

/// Current Matter format version
pub const MATTER_VERSION: u32 = 1;

/// Author recorded when none is configured
pub const DEFAULT_AUTHOR: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatterHeader {
    pub author: String,
    /// Unix time in milliseconds
    pub created_at: u64,
    pub version: u32,
}

impl MatterHeader {
    pub fn new(author: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            author: author.into(),
            created_at,
            version: MATTER_VERSION,
        }
    }

    pub fn write(&self, buf: &mut BytesMut) -> Result<()> {
        put_utf(buf, &self.author)?;
        put_var_u64(buf, self.created_at);
        put_var_u32(buf, self.version);
        Ok(())
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            author: reader.read_utf()?,
            created_at: reader.read_var_u64()?,
            version: reader.read_var_u32()?,
        })
    }
}

impl Default for MatterHeader {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR)
    }
}
