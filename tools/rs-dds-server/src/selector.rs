// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Default-stream selection policy.

use crate::hardware::{ProfileKind, StreamProfile};
use realdds::topics::{Format, StreamType};
use serde::{Deserialize, Serialize};

/// Picks the profile streamed as soon as a device is bridged.
///
/// Unset fields match anything. Among matching profiles, one flagged
/// default by the hardware wins; otherwise the first match does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSelector {
    pub stream: StreamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<i32>,
}

impl Default for ProfileSelector {
    /// Color, RGB8, 1280x720 @ 30 fps.
    fn default() -> Self {
        Self {
            stream: StreamType::Color,
            format: Some(Format::Rgb8),
            width: Some(1280),
            height: Some(720),
            fps: Some(30),
        }
    }
}

impl ProfileSelector {
    /// Match any profile of a stream type.
    pub fn any(stream: StreamType) -> Self {
        Self {
            stream,
            format: None,
            width: None,
            height: None,
            fps: None,
        }
    }

    pub fn matches(&self, profile: &StreamProfile) -> bool {
        if profile.stream_type != self.stream {
            return false;
        }
        if self.format.is_some_and(|f| f != profile.format) {
            return false;
        }
        if self.fps.is_some_and(|fps| fps != profile.fps) {
            return false;
        }
        match profile.kind {
            ProfileKind::Video { width, height } => {
                self.width.map_or(true, |w| w == width) && self.height.map_or(true, |h| h == height)
            }
            ProfileKind::Motion => self.width.is_none() && self.height.is_none(),
        }
    }

    pub fn select<'a>(&self, profiles: &'a [StreamProfile]) -> Option<&'a StreamProfile> {
        let mut first = None;
        for profile in profiles.iter().filter(|p| self.matches(p)) {
            if profile.is_default {
                return Some(profile);
            }
            first.get_or_insert(profile);
        }
        first
    }

    /// Human-readable form for logs and errors.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("{:?}", self.stream)];
        if let Some(format) = self.format {
            parts.push(format!("{:?}", format));
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) => parts.push(format!("{}x{}", w, h)),
            (Some(w), None) => parts.push(format!("{}x*", w)),
            (None, Some(h)) => parts.push(format!("*x{}", h)),
            (None, None) => {}
        }
        if let Some(fps) = self.fps {
            parts.push(format!("@{}fps", fps));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(uid: i32, format: Format, width: u32, height: u32, fps: i32, def: bool) -> StreamProfile {
        StreamProfile {
            stream_name: "Color".to_string(),
            stream_index: 0,
            unique_id: uid,
            fps,
            format,
            stream_type: StreamType::Color,
            kind: ProfileKind::Video { width, height },
            is_default: def,
        }
    }

    #[test]
    fn test_default_selects_720p_rgb8() {
        let profiles = vec![
            video(1, Format::Yuyv, 1280, 720, 30, true),
            video(2, Format::Rgb8, 640, 480, 30, false),
            video(3, Format::Rgb8, 1280, 720, 30, false),
        ];
        let selected = ProfileSelector::default().select(&profiles).expect("match");
        assert_eq!(selected.unique_id, 3);
    }

    #[test]
    fn test_prefers_hardware_default() {
        let profiles = vec![
            video(1, Format::Rgb8, 640, 480, 15, false),
            video(2, Format::Rgb8, 1280, 720, 30, true),
        ];
        let selector = ProfileSelector::any(StreamType::Color);
        assert_eq!(selector.select(&profiles).map(|p| p.unique_id), Some(2));
    }

    #[test]
    fn test_no_match() {
        let profiles = vec![video(1, Format::Rgb8, 640, 480, 30, true)];
        assert!(ProfileSelector::default().select(&profiles).is_none());
        assert_eq!(ProfileSelector::default().describe(), "Color Rgb8 1280x720 @30fps");
    }
}
