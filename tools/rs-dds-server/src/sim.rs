// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulated hardware backend.
//!
//! Devices come from [`SimDeviceConfig`] entries and can be attached and
//! detached at runtime. A started sensor runs one generator thread emitting
//! correctly sized synthetic frames for each of its profiles at the profile
//! rate.

use crate::config::{SimDeviceConfig, SimProfileConfig};
use crate::hardware::{
    self, CameraInfo, Context, Device, DeviceId, Frame, FrameCallback, ProfileKind, Sensor,
    SensorKind, StreamProfile,
};
use crate::{BridgeError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Payload size of a motion sample (three f32).
const MOTION_FRAME_SIZE: usize = 12;

/// Simulated [`Context`].
pub struct SimContext {
    devices: Mutex<BTreeMap<DeviceId, Arc<SimDevice>>>,
    next_device_id: AtomicU64,
}

impl SimContext {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(BTreeMap::new()),
            next_device_id: AtomicU64::new(1),
        }
    }

    /// Context with every configured device already attached.
    pub fn from_config(devices: &[SimDeviceConfig]) -> Self {
        let context = Self::new();
        for device in devices {
            context.attach(device);
        }
        context
    }

    /// Plug a device in. Profile unique ids are numbered from 1 within the device.
    pub fn attach(&self, config: &SimDeviceConfig) -> DeviceId {
        let id = DeviceId(self.next_device_id.fetch_add(1, Ordering::Relaxed));
        let mut next_unique_id = 0;
        let sensors = config
            .sensors
            .iter()
            .map(|s| {
                let profiles = s
                    .profiles
                    .iter()
                    .map(|p| {
                        next_unique_id += 1;
                        Self::profile(p, next_unique_id)
                    })
                    .collect::<Vec<_>>();
                Arc::new(SimSensor::new(&s.name, SensorKind::from_label(&s.kind), profiles))
            })
            .collect();

        let device = Arc::new(SimDevice {
            id,
            info: CameraInfo {
                name: config.name.clone(),
                serial: config.serial.clone(),
                product_line: config.product_line.clone(),
                locked: config.locked,
            },
            sensors,
        });
        self.devices.lock().insert(id, device);
        tracing::debug!("[sim] attached '{}' ({}) as {}", config.name, config.serial, id);
        id
    }

    /// Unplug a device. Running sensors are stopped.
    pub fn detach(&self, id: DeviceId) -> bool {
        let Some(device) = self.devices.lock().remove(&id) else {
            return false;
        };
        for sensor in &device.sensors {
            sensor.halt();
        }
        tracing::debug!("[sim] detached {}", id);
        true
    }

    pub fn device(&self, id: DeviceId) -> Option<Arc<SimDevice>> {
        self.devices.lock().get(&id).cloned()
    }

    fn profile(config: &SimProfileConfig, unique_id: i32) -> StreamProfile {
        let kind = match (config.width, config.height) {
            (Some(width), Some(height)) => ProfileKind::Video { width, height },
            _ => ProfileKind::Motion,
        };
        StreamProfile {
            stream_name: hardware::stream_name(config.stream, config.index),
            stream_index: config.index,
            unique_id,
            fps: config.fps,
            format: config.format,
            stream_type: config.stream,
            kind,
            is_default: config.default,
        }
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for SimContext {
    fn query_devices(&self) -> Vec<Arc<dyn Device>> {
        self.devices
            .lock()
            .values()
            .map(|d| Arc::clone(d) as Arc<dyn Device>)
            .collect()
    }
}

/// Simulated [`Device`].
pub struct SimDevice {
    id: DeviceId,
    info: CameraInfo,
    sensors: Vec<Arc<SimSensor>>,
}

impl SimDevice {
    /// Number of sensors currently generating frames.
    pub fn streaming_sensors(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_streaming()).count()
    }
}

impl Device for SimDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn info(&self) -> CameraInfo {
        self.info.clone()
    }

    fn sensors(&self) -> Vec<Arc<dyn Sensor>> {
        self.sensors
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn Sensor>)
            .collect()
    }
}

struct Generator {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Simulated [`Sensor`].
pub struct SimSensor {
    name: String,
    kind: SensorKind,
    profiles: Vec<StreamProfile>,
    generator: Mutex<Option<Generator>>,
}

impl SimSensor {
    fn new(name: &str, kind: SensorKind, profiles: Vec<StreamProfile>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            profiles,
            generator: Mutex::new(None),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.generator.lock().is_some()
    }

    /// Stop the generator and wait for it.
    fn halt(&self) {
        let generator = self.generator.lock().take();
        if let Some(generator) = generator {
            generator.stop.store(true, Ordering::SeqCst);
            if generator.thread.join().is_err() {
                tracing::error!("[sim] frame generator of '{}' panicked", self.name);
            }
        }
    }
}

fn frame_size(profile: &StreamProfile) -> usize {
    match profile.kind {
        ProfileKind::Video { width, height } => {
            let pixels = width as usize * height as usize;
            pixels * profile.format.bytes_per_pixel().unwrap_or(1)
        }
        ProfileKind::Motion => MOTION_FRAME_SIZE,
    }
}

impl Sensor for SimSensor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> SensorKind {
        self.kind.clone()
    }

    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.profiles.clone()
    }

    fn start(&self, profiles: &[StreamProfile], callback: FrameCallback) -> Result<()> {
        let mut generator = self.generator.lock();
        if generator.is_some() {
            return Err(BridgeError::Hardware(format!("sensor '{}' is busy", self.name)));
        }
        if let Some(p) = profiles
            .iter()
            .find(|p| !self.profiles.iter().any(|own| own.unique_id == p.unique_id))
        {
            return Err(BridgeError::Hardware(format!(
                "profile uid {} does not belong to sensor '{}'",
                p.unique_id, self.name
            )));
        }

        let fps = profiles.iter().map(|p| p.fps).max().unwrap_or(30).max(1);
        let period = Duration::from_secs(1) / fps as u32;
        let streams: Vec<(StreamProfile, usize)> =
            profiles.iter().map(|p| (p.clone(), frame_size(p))).collect();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name(format!("sim-{}", self.name))
            .spawn(move || {
                let mut counter: u8 = 0;
                while !stop_flag.load(Ordering::SeqCst) {
                    for (profile, size) in &streams {
                        callback(Frame {
                            stream_name: profile.stream_name.clone(),
                            unique_id: profile.unique_id,
                            data: vec![counter; *size],
                        });
                    }
                    counter = counter.wrapping_add(1);
                    std::thread::sleep(period);
                }
            })?;

        *generator = Some(Generator { stop, thread });
        tracing::debug!("[sim] '{}' streaming {} profile(s)", self.name, profiles.len());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.halt();
        Ok(())
    }
}
