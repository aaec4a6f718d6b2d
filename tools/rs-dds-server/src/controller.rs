// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device controller: which profiles of a device are streaming.
//!
//! A sensor streams a set of profiles at once, so changing one stream of a
//! sensor restarts the sensor with the new set. Frames are dispatched by
//! stream name to the callback registered for that stream.

use crate::hardware::{Device, Frame, FrameCallback, Sensor, StreamProfile};
use crate::{BridgeError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Callbacks = Arc<RwLock<HashMap<String, FrameCallback>>>;

struct ActiveSensor {
    sensor: Arc<dyn Sensor>,
    profiles: Vec<StreamProfile>,
    callbacks: Callbacks,
}

impl ActiveSensor {
    /// (Re)start the sensor with the current profile set.
    fn restart(&self) -> Result<()> {
        self.sensor.stop()?;
        if self.profiles.is_empty() {
            return Ok(());
        }
        let callbacks = Arc::clone(&self.callbacks);
        self.sensor.start(
            &self.profiles,
            Arc::new(move |frame: Frame| {
                let callback = callbacks.read().get(&frame.stream_name).cloned();
                if let Some(callback) = callback {
                    callback(frame);
                }
            }),
        )
    }
}

/// Streams of one device.
pub struct DeviceController {
    device: Arc<dyn Device>,
    /// Streaming sensors keyed by sensor name.
    active: Mutex<BTreeMap<String, ActiveSensor>>,
}

impl DeviceController {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    /// Profile with the given unique id, if any sensor exposes it.
    pub fn find_profile(&self, unique_id: i32) -> Option<StreamProfile> {
        self.device
            .sensors()
            .iter()
            .flat_map(|s| s.stream_profiles())
            .find(|p| p.unique_id == unique_id)
    }

    /// Start `profile`, replacing any profile already streaming on the same stream.
    pub fn start_stream(&self, profile: &StreamProfile, callback: FrameCallback) -> Result<()> {
        let sensor = self
            .device
            .sensors()
            .into_iter()
            .find(|s| {
                s.stream_profiles()
                    .iter()
                    .any(|p| p.unique_id == profile.unique_id)
            })
            .ok_or_else(|| {
                BridgeError::ProfileNotFound(format!(
                    "uid {} on device {}",
                    profile.unique_id,
                    self.device.id()
                ))
            })?;

        let mut active = self.active.lock();
        let entry = active
            .entry(sensor.name())
            .or_insert_with(|| ActiveSensor {
                sensor: Arc::clone(&sensor),
                profiles: Vec::new(),
                callbacks: Arc::new(RwLock::new(HashMap::new())),
            });
        entry
            .profiles
            .retain(|p| p.stream_name != profile.stream_name);
        entry.profiles.push(profile.clone());
        entry
            .callbacks
            .write()
            .insert(profile.stream_name.clone(), callback);

        if let Err(e) = entry.restart() {
            // Leave the sensor without the failed profile
            entry.profiles.retain(|p| p.unique_id != profile.unique_id);
            entry.callbacks.write().remove(&profile.stream_name);
            if let Err(restore) = entry.restart() {
                tracing::warn!("Could not restore sensor '{}': {}", sensor.name(), restore);
            }
            if entry.profiles.is_empty() {
                active.remove(&sensor.name());
            }
            return Err(e);
        }

        tracing::info!(
            "Device {} streaming '{}' (uid {}) on sensor '{}'",
            self.device.id(),
            profile.stream_name,
            profile.unique_id,
            sensor.name()
        );
        Ok(())
    }

    /// Stop the stream of profile `unique_id`. Returns the stopped profile, if it was streaming.
    pub fn stop_stream(&self, unique_id: i32) -> Result<Option<StreamProfile>> {
        let mut active = self.active.lock();
        let Some((name, profile)) = active.iter().find_map(|(name, a)| {
            a.profiles
                .iter()
                .find(|p| p.unique_id == unique_id)
                .map(|p| (name.clone(), p.clone()))
        }) else {
            return Ok(None);
        };

        if let Some(entry) = active.get_mut(&name) {
            entry.profiles.retain(|p| p.unique_id != unique_id);
            entry.callbacks.write().remove(&profile.stream_name);
            let result = entry.restart();
            if entry.profiles.is_empty() {
                active.remove(&name);
            }
            result?;
        }
        tracing::debug!("Device {} stopped '{}'", self.device.id(), profile.stream_name);
        Ok(Some(profile))
    }

    /// Stop every sensor. Returns once no frame callback is running.
    pub fn stop_all_streams(&self) {
        let mut active = self.active.lock();
        for (name, entry) in std::mem::take(&mut *active) {
            if let Err(e) = entry.sensor.stop() {
                tracing::warn!("Failed to stop sensor '{}': {}", name, e);
            }
            entry.callbacks.write().clear();
        }
    }

    /// Profiles currently streaming.
    pub fn active_profiles(&self) -> Vec<StreamProfile> {
        self.active
            .lock()
            .values()
            .flat_map(|a| a.profiles.iter().cloned())
            .collect()
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        self.stop_all_streams();
    }
}
