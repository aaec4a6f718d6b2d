// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream format and stream type enumerations.
//!
//! Discriminants follow the librealsense numbering so values survive the
//! trip through the single-byte wire fields unchanged.

use crate::Error;
use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            /// Wire discriminant.
            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self, Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(Error::InvalidEnum { what: $what, value }),
                }
            }
        }
    };
}

wire_enum! {
    /// Pixel / sample format of a stream.
    Format, "format" {
        Any = 0,
        Z16 = 1,
        Disparity16 = 2,
        Xyz32f = 3,
        Yuyv = 4,
        Rgb8 = 5,
        Bgr8 = 6,
        Rgba8 = 7,
        Bgra8 = 8,
        Y8 = 9,
        Y16 = 10,
        Raw10 = 11,
        Raw16 = 12,
        Raw8 = 13,
        Uyvy = 14,
        MotionRaw = 15,
        MotionXyz32f = 16,
        GpioRaw = 17,
        SixDof = 18,
        Disparity32 = 19,
        Y10bpack = 20,
        Distance = 21,
        Mjpeg = 22,
        Y8i = 23,
        Y12i = 24,
        Inzi = 25,
        Invi = 26,
        W10 = 27,
        Z16h = 28,
        Fg = 29,
        Y411 = 30,
    }
}

wire_enum! {
    /// Kind of data a stream carries.
    StreamType, "stream type" {
        Any = 0,
        Depth = 1,
        Color = 2,
        Infrared = 3,
        Fisheye = 4,
        Gyro = 5,
        Accel = 6,
        Gpio = 7,
        Pose = 8,
        Confidence = 9,
    }
}

impl Format {
    /// Bytes per pixel for uncompressed, byte-aligned image formats.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Y8 | Self::Raw8 => Some(1),
            Self::Z16
            | Self::Disparity16
            | Self::Yuyv
            | Self::Uyvy
            | Self::Y16
            | Self::Raw16
            | Self::Y8i => Some(2),
            Self::Rgb8 | Self::Bgr8 => Some(3),
            Self::Rgba8 | Self::Bgra8 | Self::Disparity32 | Self::Distance => Some(4),
            _ => None,
        }
    }
}
