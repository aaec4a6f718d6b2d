// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream requests sent by subscribers to a device server.
//!
//! Layout: `id u16 | count u16 | uid i16 * count`.

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const OPEN_STREAMS: u16 = 0;
const CLOSE_STREAMS: u16 = 1;

/// Request to open or close streams, addressed by profile unique id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMsg {
    OpenStreams(Vec<i16>),
    CloseStreams(Vec<i16>),
}

impl ControlMsg {
    /// Type name registered on the control topic.
    pub const TYPE_NAME: &'static str = "realdds::control";

    pub fn uids(&self) -> &[i16] {
        match self {
            Self::OpenStreams(uids) | Self::CloseStreams(uids) => uids,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let (id, uids) = match self {
            Self::OpenStreams(uids) => (OPEN_STREAMS, uids),
            Self::CloseStreams(uids) => (CLOSE_STREAMS, uids),
        };
        let count = u16::try_from(uids.len()).map_err(|_| Error::TooManyProfiles {
            count: uids.len(),
            capacity: u16::MAX as usize,
        })?;

        let mut buf = Vec::with_capacity(4 + 2 * uids.len());
        buf.write_u16::<LittleEndian>(id)?;
        buf.write_u16::<LittleEndian>(count)?;
        for uid in uids {
            buf.write_i16::<LittleEndian>(*uid)?;
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = buf;
        let id = r.read_u16::<LittleEndian>()?;
        let count = r.read_u16::<LittleEndian>()?;
        let mut uids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            uids.push(r.read_i16::<LittleEndian>()?);
        }
        match id {
            OPEN_STREAMS => Ok(Self::OpenStreams(uids)),
            CLOSE_STREAMS => Ok(Self::CloseStreams(uids)),
            other => Err(Error::UnknownMessageId(other)),
        }
    }
}
