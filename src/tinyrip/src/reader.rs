//! Aligned binary reader for serialized objects
//!
//! Reads fixed-width integers, length-prefixed byte arrays and strings,
//! and counted arrays from an in-memory slice, in either byte order. The
//! reader also carries the producer version and build flags of the file
//! being decoded so field readers can consult the version policy.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::version::{BuildFlags, Version};
use crate::{Error, Result};

/// Byte order of a serialized file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Cursor over serialized bytes
pub struct AssetReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
    version: Version,
    flags: BuildFlags,
}

impl<'a> AssetReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian, version: Version, flags: BuildFlags) -> Self {
        Self {
            data,
            pos: 0,
            endian,
            version,
            flags,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn flags(&self) -> BuildFlags {
        self.flags
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Take `n` bytes, advancing the cursor
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::DataTooShort {
                needed: n,
                actual: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Advance to the next multiple of `n` (relative to the slice start)
    pub fn align(&mut self, n: usize) {
        let rem = self.pos % n;
        if rem != 0 {
            self.pos = (self.pos + n - rem).min(self.data.len().max(self.pos));
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_i32(bytes),
            Endian::Big => BigEndian::read_i32(bytes),
        })
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_i64(bytes),
            Endian::Big => BigEndian::read_i64(bytes),
        })
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_f32(bytes),
            Endian::Big => BigEndian::read_f32(bytes),
        })
    }

    /// Read an element count, rejecting negative or impossible values
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(Error::InvalidHeader(format!("negative element count {count}")));
        }
        let count = count as usize;
        // Every element occupies at least one byte
        if count > self.remaining() {
            return Err(Error::DataTooShort {
                needed: count,
                actual: self.remaining(),
            });
        }
        Ok(count)
    }

    /// `i32` length followed by that many bytes
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_count()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Length-prefixed UTF-8 string, aligned to 4 afterwards
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_byte_array()?;
        self.align(4);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Null-terminated string
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::DataTooShort {
                needed: rest.len() + 1,
                actual: rest.len(),
            })?;
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(s)
    }

    pub fn read_guid(&mut self) -> Result<[u8; 16]> {
        let mut guid = [0u8; 16];
        guid.copy_from_slice(self.read_bytes(16)?);
        Ok(guid)
    }

    /// `i32` count followed by `count` elements read with `f`
    pub fn read_array<T>(&mut self, mut f: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.read_count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Everything left in the slice
    pub fn read_remainder(&mut self) -> &'a [u8] {
        let start = self.pos.min(self.data.len());
        self.pos = self.data.len();
        &self.data[start..]
    }
}
