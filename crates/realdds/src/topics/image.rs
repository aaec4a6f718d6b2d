// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame messages published on per-stream data topics.
//!
//! Layout: `format u8 | width i32 | height i32 | size u32 | data[size]`.

use super::types::Format;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

/// Shape of every frame published on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub format: Format,
    pub width: i32,
    pub height: i32,
}

impl ImageHeader {
    pub fn new(format: Format, width: i32, height: i32) -> Self {
        Self {
            format,
            width,
            height,
        }
    }

    /// Payload size implied by the header, for byte-aligned formats.
    pub fn expected_size(&self) -> Option<usize> {
        let bpp = self.format.bytes_per_pixel()?;
        let width = usize::try_from(self.width).ok()?;
        let height = usize::try_from(self.height).ok()?;
        width.checked_mul(height)?.checked_mul(bpp)
    }
}

/// One frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMsg {
    pub header: ImageHeader,
    pub data: Vec<u8>,
}

impl ImageMsg {
    /// Type name registered on data topics.
    pub const TYPE_NAME: &'static str = "realdds::image";

    pub const HEADER_SIZE: usize = 13;

    /// Serialize a frame without taking ownership of its bytes.
    pub fn encode(header: &ImageHeader, data: &[u8]) -> Result<Vec<u8>> {
        let size = u32::try_from(data.len()).map_err(|_| {
            Error::Transport(format!("frame of {} bytes exceeds u32 size field", data.len()))
        })?;
        let mut buf = Vec::with_capacity(Self::HEADER_SIZE + data.len());
        buf.write_u8(header.format.as_u8())?;
        buf.write_i32::<LittleEndian>(header.width)?;
        buf.write_i32::<LittleEndian>(header.height)?;
        buf.write_u32::<LittleEndian>(size)?;
        buf.extend_from_slice(data);
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = buf;
        let header = ImageHeader {
            format: Format::try_from(r.read_u8()?)?,
            width: r.read_i32::<LittleEndian>()?,
            height: r.read_i32::<LittleEndian>()?,
        };
        let size = r.read_u32::<LittleEndian>()? as usize;
        if r.len() != size {
            return Err(Error::Decode(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("image data is {} bytes, header says {}", r.len(), size),
            )));
        }
        Ok(Self {
            header,
            data: r.to_vec(),
        })
    }
}
