use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{NaiveDate, TimeZone, Utc};
use std::io::Cursor;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
    zip64_marker: bool,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);
        let disk_number = cursor.read_u16::<LittleEndian>()?;
        let disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        let disk_entries = cursor.read_u16::<LittleEndian>()?;
        let total_entries = cursor.read_u16::<LittleEndian>()?;
        let cd_size = cursor.read_u32::<LittleEndian>()?;
        let cd_offset = cursor.read_u32::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;

        if disk_number != disk_with_cd && disk_number != 0xFFFF {
            bail!("Multi-disk archives are not supported");
        }

        Ok(Self {
            total_entries,
            cd_size,
            cd_offset,
            comment_len,
            zip64_marker: disk_entries == 0xFFFF
                || total_entries == 0xFFFF
                || cd_size == 0xFFFFFFFF
                || cd_offset == 0xFFFFFFFF,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.zip64_marker
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        // skip the disk holding the ZIP64 EOCD
        let mut cursor = Cursor::new(&data[8..]);
        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        // record size, versions and disk numbers precede the counts
        let mut cursor = Cursor::new(&data[32..]);
        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Extra field carrying 64-bit sizes and offsets
pub const ZIP64_EXTRA_ID: u16 = 0x0001;
/// Extra field carrying Unix timestamps ("UT")
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;

/// Parsed central directory record for one archive member
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// Modification time from the extended timestamp field, in Unix seconds
    pub unix_mtime: Option<i64>,
    pub is_directory: bool,
    /// General purpose flag bit 0; such members are indexed but never decoded
    pub is_encrypted: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Modification time of the member.
    ///
    /// Prefers the extended timestamp; falls back to the MS-DOS fields, read as UTC.
    /// Returns `None` when neither is usable.
    pub fn modified(&self) -> Option<SystemTime> {
        if let Some(secs) = self.unix_mtime {
            return u64::try_from(secs)
                .ok()
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
        }

        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        let naive = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?.and_hms_opt(
            hour as u32,
            minute as u32,
            second as u32,
        )?;
        let secs = Utc.from_utc_datetime(&naive).timestamp();
        u64::try_from(secs)
            .ok()
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Content fingerprint: hex logical size followed by hex CRC-32.
    pub fn fingerprint(&self) -> String {
        format!("{:x}{:x}", self.uncompressed_size, self.crc32)
    }
}
