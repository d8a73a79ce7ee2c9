//! Wire records and the entities built from them.
//!
//! Records are decoded strictly with serde: a missing or mis-typed field
//! fails at decode time. Entities are immutable once built.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FwError, Result};

/// Timestamp format used by the service (UTC, no fractional seconds).
pub const WIRE_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%SZ";

// ── Wire records ──────────────────────────────────────────────────────────────

/// Device entry as returned by the device list and device info endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name:       String,
    pub identifier: String,
    #[serde(default)]
    pub boards:     Vec<BoardVariant>,
    /// Only present on the device-scoped firmware listing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub firmwares:  Vec<FirmwareRecord>,
}

/// Firmware entry as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareRecord {
    /// Owning device; absent on some device-scoped listings.
    #[serde(default)]
    pub identifier:  Option<String>,
    pub buildid:     String,
    pub version:     String,
    pub url:         String,
    pub filesize:    u64,
    pub sha1sum:     String,
    pub sha256sum:   String,
    pub md5sum:      String,
    pub releasedate: String,
    pub uploaddate:  String,
}

/// Just the signing flag of a firmware info response.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SignedRecord {
    pub signed: bool,
}

// ── Entities ──────────────────────────────────────────────────────────────────

/// One hardware configuration a device model ships as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardVariant {
    pub boardconfig: String,
    pub platform:    String,
    pub cpid:        u32,
    pub bdid:        u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    name:       String,
    identifier: String,
    boards:     Vec<BoardVariant>,
}

impl Device {
    pub fn from_record(rec: DeviceRecord) -> Self {
        Self {
            name:       rec.name,
            identifier: rec.identifier,
            boards:     rec.boards,
        }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Stable, globally unique key (e.g. `iPhone14,7`).
    pub fn identifier(&self) -> &str { &self.identifier }

    pub fn boards(&self) -> &[BoardVariant] { &self.boards }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareChecksums {
    pub sha1:   String,
    pub sha256: String,
    pub md5:    String,
}

impl FirmwareChecksums {
    /// Build from the three wire digests, checking each is hex of the
    /// expected length.
    pub fn new(sha1: String, sha256: String, md5: String) -> Result<Self> {
        Ok(Self {
            sha1:   check_hex("sha1sum", sha1, 40)?,
            sha256: check_hex("sha256sum", sha256, 64)?,
            md5:    check_hex("md5sum", md5, 32)?,
        })
    }
}

fn check_hex(field: &str, value: String, len: usize) -> Result<String> {
    if value.len() != len || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FwError::Decode(format!(
            "{field} must be {len} hex digits, got {value:?}"
        )));
    }
    Ok(value)
}

/// One firmware build for one device.
///
/// Signing status is not stored; `Api::firmware_signed` asks the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Firmware {
    device:    String,
    buildid:   String,
    version:   String,
    size:      u64,
    released:  DateTime<Utc>,
    uploaded:  DateTime<Utc>,
    checksums: FirmwareChecksums,
    url:       String,
}

impl Firmware {
    /// Build a firmware owned by the device with identifier `device`.
    pub fn from_record(rec: FirmwareRecord, device: &str) -> Result<Self> {
        Ok(Self {
            device:    device.to_string(),
            released:  parse_timestamp(&rec.releasedate)?,
            uploaded:  parse_timestamp(&rec.uploaddate)?,
            checksums: FirmwareChecksums::new(rec.sha1sum, rec.sha256sum, rec.md5sum)?,
            buildid:   rec.buildid,
            version:   rec.version,
            size:      rec.filesize,
            url:       rec.url,
        })
    }

    /// Identifier of the owning device.
    pub fn device(&self) -> &str { &self.device }
    pub fn buildid(&self) -> &str { &self.buildid }
    pub fn version(&self) -> &str { &self.version }
    /// Archive size in bytes.
    pub fn size(&self) -> u64 { self.size }
    pub fn released(&self) -> DateTime<Utc> { self.released }
    pub fn uploaded(&self) -> DateTime<Utc> { self.uploaded }
    pub fn checksums(&self) -> &FirmwareChecksums { &self.checksums }
    pub fn url(&self) -> &str { &self.url }
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` wire timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, WIRE_TIMESTAMP)
        .map(|naive| naive.and_utc())
        .map_err(|source| FwError::Timestamp { value: value.to_string(), source })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn board(boardconfig: &str, cpid: u32, bdid: u32) -> Value {
        json!({ "boardconfig": boardconfig, "platform": "t8110", "cpid": cpid, "bdid": bdid })
    }

    pub fn firmware(identifier: &str, version: &str, buildid: &str) -> Value {
        json!({
            "identifier":  identifier,
            "version":     version,
            "buildid":     buildid,
            "sha1sum":     "a".repeat(40),
            "md5sum":      "b".repeat(32),
            "sha256sum":   "c".repeat(64),
            "filesize":    6_123_456_789u64,
            "url":         format!("https://updates.cdn-apple.com/{identifier}_{version}_{buildid}_Restore.ipsw"),
            "releasedate": "2022-09-12T17:04:17Z",
            "uploaddate":  "2022-09-12T17:21:37Z",
            "signed":      true,
        })
    }
}
