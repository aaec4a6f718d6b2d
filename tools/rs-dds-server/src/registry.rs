// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device-handler registry.
//!
//! Owns one [`DeviceHandler`] per bridged device, keyed by [`DeviceId`].
//!
//! ```text
//! attach:  build init messages -> announce -> init server -> queue messages
//!          -> controller -> auto-start          (any failure: detach order)
//! detach:  stop hardware streams -> stop server streams -> erase -> retract
//! ```
//!
//! Only the control loop touches the registry. Frame callbacks hold their
//! own `Arc<DeviceServer>` and never see the map; stopping the controller
//! waits for them, so nothing publishes once a handler is erased.

use crate::controller::DeviceController;
use crate::hardware::{Device, DeviceId, Frame, StreamProfile};
use crate::init_msgs;
use crate::selector::ProfileSelector;
use crate::{BridgeError, Result};
use realdds::topics::{ControlMsg, DeviceInfo, Notification};
use realdds::{DeviceBroadcaster, DeviceServer, Participant};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bridging state of one device.
pub struct DeviceHandler {
    info: DeviceInfo,
    server: Arc<DeviceServer>,
    controller: Arc<DeviceController>,
}

impl DeviceHandler {
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn server(&self) -> &Arc<DeviceServer> {
        &self.server
    }

    pub fn controller(&self) -> &Arc<DeviceController> {
        &self.controller
    }

    /// Start `profile` on both sides: DDS stream first, then hardware.
    pub fn start_profile(&self, profile: &StreamProfile) -> Result<()> {
        let header = init_msgs::image_header(profile)?;
        self.server.start_streaming(&profile.stream_name, header)?;

        let server = Arc::clone(&self.server);
        let stream_name = profile.stream_name.clone();
        let callback = Arc::new(move |frame: Frame| {
            if let Err(e) = server.publish_image(&stream_name, &frame.data) {
                tracing::debug!("Dropped frame on '{}': {}", stream_name, e);
            }
        });

        if let Err(e) = self.controller.start_stream(profile, callback) {
            // The controller no longer streams anything under this name
            if let Err(stop) = self.server.stop_streaming(&profile.stream_name) {
                tracing::warn!(
                    "'{}': could not stop stream '{}': {}",
                    self.info.topic_root,
                    profile.stream_name,
                    stop
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stop the stream of profile `unique_id` on both sides.
    pub fn stop_profile(&self, unique_id: i32) -> Result<bool> {
        match self.controller.stop_stream(unique_id)? {
            Some(profile) => {
                self.server.stop_streaming(&profile.stream_name)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop everything. Returns once no frame callback of this device runs.
    fn quiesce(&self) {
        self.controller.stop_all_streams();
        self.server.stop_all_streams();
    }

    /// Serve one request uid by uid; a failing uid never blocks the others.
    fn handle_control(&self, request: &ControlMsg) {
        match request {
            ControlMsg::OpenStreams(uids) => {
                for &uid in uids {
                    let Some(profile) = self.controller.find_profile(i32::from(uid)) else {
                        tracing::warn!(
                            "'{}': open request for unknown profile uid {}",
                            self.info.topic_root,
                            uid
                        );
                        continue;
                    };
                    if let Err(e) = self.start_profile(&profile) {
                        tracing::warn!(
                            "'{}': failed to open profile uid {}: {}",
                            self.info.topic_root,
                            uid,
                            e
                        );
                    }
                }
            }
            ControlMsg::CloseStreams(uids) => {
                for &uid in uids {
                    match self.stop_profile(i32::from(uid)) {
                        Ok(true) => {}
                        Ok(false) => tracing::debug!(
                            "'{}': close request for idle profile uid {}",
                            self.info.topic_root,
                            uid
                        ),
                        Err(e) => tracing::warn!(
                            "'{}': failed to close profile uid {}: {}",
                            self.info.topic_root,
                            uid,
                            e
                        ),
                    }
                }
            }
        }
    }
}

/// Bridged devices.
pub struct DeviceHandlerRegistry {
    participant: Arc<Participant>,
    broadcaster: DeviceBroadcaster,
    handlers: BTreeMap<DeviceId, DeviceHandler>,
    auto_start: Option<ProfileSelector>,
}

impl DeviceHandlerRegistry {
    /// `broadcaster` must already be running.
    pub fn new(
        participant: Arc<Participant>,
        broadcaster: DeviceBroadcaster,
        auto_start: Option<ProfileSelector>,
    ) -> Self {
        Self {
            participant,
            broadcaster,
            handlers: BTreeMap::new(),
            auto_start,
        }
    }

    /// Bridge a newly attached device.
    ///
    /// Nothing is left behind on failure. A topic-root collision surfaces as
    /// a fatal error (see [`BridgeError::is_fatal`]); every other error only
    /// concerns this device.
    pub fn on_attach(&mut self, device: Arc<dyn Device>) -> Result<&DeviceHandler> {
        let id = device.id();
        if self.handlers.contains_key(&id) {
            return Err(BridgeError::DeviceAlreadyAttached(id));
        }

        let camera = device.info();
        let info = DeviceInfo::new(&camera.name, &camera.serial, &camera.product_line, camera.locked);
        let msgs = init_msgs::init_messages(&device)?;
        let streams = init_msgs::supported_stream_names(device.as_ref());

        self.broadcaster.add_device(&info)?;

        let handler = match self.bridge(device, info.clone(), &streams, msgs) {
            Ok(handler) => handler,
            Err(e) => {
                self.broadcaster.remove_device(&info);
                return Err(e);
            }
        };

        tracing::info!(
            "Bridged {} '{}' ({}) at '{}' with {} stream(s)",
            id,
            info.name,
            info.serial,
            info.topic_root,
            streams.len()
        );
        Ok(self.handlers.entry(id).or_insert(handler))
    }

    fn bridge(
        &self,
        device: Arc<dyn Device>,
        info: DeviceInfo,
        streams: &[String],
        msgs: Vec<Notification>,
    ) -> Result<DeviceHandler> {
        let mut server = DeviceServer::new(Arc::clone(&self.participant), &info.topic_root);
        server.init(streams)?;
        for msg in msgs {
            server.add_init_msg(msg)?;
        }

        let profiles: Vec<StreamProfile> = device
            .sensors()
            .iter()
            .flat_map(|s| s.stream_profiles())
            .collect();
        let handler = DeviceHandler {
            info,
            server: Arc::new(server),
            controller: Arc::new(DeviceController::new(device)),
        };

        if let Some(selector) = &self.auto_start {
            let result = selector
                .select(&profiles)
                .ok_or_else(|| BridgeError::ProfileNotFound(selector.describe()))
                .and_then(|profile| handler.start_profile(profile));
            if let Err(e) = result {
                handler.quiesce();
                return Err(e);
            }
        }
        Ok(handler)
    }

    /// Unbridge a detached device. Returns its identity.
    pub fn on_detach(&mut self, id: DeviceId) -> Result<DeviceInfo> {
        let handler = self.handlers.get(&id).ok_or(BridgeError::UnknownDevice(id))?;
        handler.quiesce();

        let handler = self
            .handlers
            .remove(&id)
            .ok_or(BridgeError::UnknownDevice(id))?;
        self.broadcaster.remove_device(&handler.info);

        tracing::info!("Unbridged {} '{}'", id, handler.info.topic_root);
        Ok(handler.info)
    }

    /// Serve pending subscriber requests of every device.
    ///
    /// Failures are logged per device and never abort the other devices.
    pub fn process_control_requests(&self) {
        for (id, handler) in &self.handlers {
            let requests = match handler.server.take_control_requests() {
                Ok(requests) => requests,
                Err(e) => {
                    tracing::warn!("Control requests of {} unreadable: {}", id, e);
                    continue;
                }
            };
            for request in requests {
                tracing::debug!("{} control request {:?}", id, request);
                handler.handle_control(&request);
            }
        }
    }

    /// Detach every device, in attach-id order.
    pub fn shutdown(&mut self) {
        let ids: Vec<DeviceId> = self.handlers.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.on_detach(id) {
                tracing::warn!("Failed to detach {}: {}", id, e);
            }
        }
    }

    pub fn handler(&self, id: DeviceId) -> Option<&DeviceHandler> {
        self.handlers.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceHandler)> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn broadcaster(&self) -> &DeviceBroadcaster {
        &self.broadcaster
    }
}

impl Drop for DeviceHandlerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimDeviceConfig, SimProfileConfig, SimSensorConfig};
    use crate::sim::SimContext;
    use realdds::topics::{Format, StreamType};
    use crate::hardware::{CameraInfo, FrameCallback, ProfileKind, Sensor, SensorKind};
    use realdds::{DomainState, LocalTransport};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn participant() -> Arc<Participant> {
        let transport = LocalTransport::with_state(Arc::new(DomainState::new(0)));
        Arc::new(
            Participant::builder("registry-test")
                .with_transport(Arc::new(transport))
                .build()
                .expect("participant"),
        )
    }

    fn registry(auto_start: Option<ProfileSelector>) -> DeviceHandlerRegistry {
        let participant = participant();
        let mut broadcaster = DeviceBroadcaster::new(Arc::clone(&participant));
        broadcaster.run().expect("run");
        DeviceHandlerRegistry::new(participant, broadcaster, auto_start)
    }

    fn device(context: &SimContext, config: &SimDeviceConfig) -> Arc<dyn Device> {
        let id = context.attach(config);
        context.device(id).expect("device")
    }

    /// Sensor whose start and stop can be made to fail.
    struct FaultySensor {
        name: String,
        profile: StreamProfile,
        fail_start: bool,
        fail_stop: AtomicBool,
    }

    impl Sensor for FaultySensor {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn kind(&self) -> SensorKind {
            SensorKind::Depth
        }

        fn stream_profiles(&self) -> Vec<StreamProfile> {
            vec![self.profile.clone()]
        }

        fn start(&self, _profiles: &[StreamProfile], _callback: FrameCallback) -> Result<()> {
            if self.fail_start {
                return Err(BridgeError::Hardware(format!("{} refuses to start", self.name)));
            }
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err(BridgeError::Hardware(format!("{} refuses to stop", self.name)));
            }
            Ok(())
        }
    }

    struct FaultyDevice {
        sensors: Vec<Arc<FaultySensor>>,
    }

    impl Device for FaultyDevice {
        fn id(&self) -> DeviceId {
            DeviceId(100)
        }

        fn info(&self) -> CameraInfo {
            CameraInfo {
                name: "Intel RealSense D405".to_string(),
                serial: "100".to_string(),
                product_line: "D400".to_string(),
                locked: true,
            }
        }

        fn sensors(&self) -> Vec<Arc<dyn Sensor>> {
            self.sensors
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn Sensor>)
                .collect()
        }
    }

    fn faulty_sensor(
        name: &str,
        stream_name: &str,
        unique_id: i32,
        fail_start: bool,
    ) -> Arc<FaultySensor> {
        Arc::new(FaultySensor {
            name: name.to_string(),
            profile: StreamProfile {
                stream_name: stream_name.to_string(),
                stream_index: 0,
                unique_id,
                fps: 30,
                format: Format::Z16,
                stream_type: StreamType::Depth,
                kind: ProfileKind::Video {
                    width: 640,
                    height: 480,
                },
                is_default: false,
            },
            fail_start,
            fail_stop: AtomicBool::new(false),
        })
    }

    /// "Broken" (uid 10) never starts; "Left" (uid 20) and "Right" (uid 30) do.
    fn faulty_device() -> Arc<FaultyDevice> {
        Arc::new(FaultyDevice {
            sensors: vec![
                faulty_sensor("Broken", "Broken", 10, true),
                faulty_sensor("Left", "Left", 20, false),
                faulty_sensor("Right", "Right", 30, false),
            ],
        })
    }

    #[test]
    fn test_attach_autostarts_and_detach_retracts() {
        let context = SimContext::new();
        let mut registry = registry(Some(ProfileSelector::default()));
        let device = device(&context, &SimDeviceConfig::d435("1"));
        let id = device.id();

        let handler = registry.on_attach(device).expect("attach");
        let root = handler.info().topic_root.clone();
        assert_eq!(root, "realsense/D435/1");
        assert!(handler.server().is_streaming("Color"));
        assert!(!handler.server().is_streaming("Depth"));
        assert!(registry.broadcaster().contains(&root));

        let info = registry.on_detach(id).expect("detach");
        assert_eq!(info.topic_root, root);
        assert!(registry.is_empty());
        assert!(!registry.broadcaster().contains(&root));
        assert!(matches!(
            registry.on_detach(id),
            Err(BridgeError::UnknownDevice(_))
        ));
    }

    #[test]
    fn test_missing_default_profile_rolls_back() {
        let context = SimContext::new();
        let mut registry = registry(Some(ProfileSelector::any(StreamType::Gyro)));
        let device = device(&context, &SimDeviceConfig::d435("1"));

        assert!(matches!(
            registry.on_attach(device),
            Err(BridgeError::ProfileNotFound(_))
        ));
        assert!(registry.is_empty());
        assert_eq!(registry.broadcaster().device_count(), 0);
    }

    #[test]
    fn test_unsupported_sensor_is_local() {
        let context = SimContext::new();
        let mut registry = registry(None);

        let mut odd = SimDeviceConfig::d435("2");
        odd.sensors.push(SimSensorConfig {
            name: "Thermal".to_string(),
            kind: "thermal".to_string(),
            profiles: vec![SimProfileConfig::video(StreamType::Any, Format::Y16, 160, 120, 9)],
        });
        assert!(registry.on_attach(device(&context, &odd)).is_err());
        assert_eq!(registry.broadcaster().device_count(), 0);

        registry
            .on_attach(device(&context, &SimDeviceConfig::d435("3")))
            .expect("healthy device");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_collision_is_fatal() {
        let context = SimContext::new();
        let mut registry = registry(None);
        registry
            .on_attach(device(&context, &SimDeviceConfig::d435("1")))
            .expect("first");

        let err = match registry.on_attach(device(&context, &SimDeviceConfig::d435("1"))) {
            Ok(_) => panic!("collision accepted"),
            Err(e) => e,
        };
        assert!(err.is_fatal());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_attach_rejected() {
        let context = SimContext::new();
        let mut registry = registry(None);
        let device = device(&context, &SimDeviceConfig::d435("1"));
        registry.on_attach(Arc::clone(&device)).expect("attach");
        assert!(matches!(
            registry.on_attach(device),
            Err(BridgeError::DeviceAlreadyAttached(_))
        ));
    }

    #[test]
    fn test_start_and_stop_profile() {
        let context = SimContext::new();
        let mut registry = registry(None);
        let device = device(&context, &SimDeviceConfig::d435("1"));
        let id = device.id();
        registry.on_attach(device).expect("attach");

        let handler = registry.handler(id).expect("handler");
        let depth = handler
            .controller()
            .find_profile(1)
            .expect("first profile");
        handler.start_profile(&depth).expect("start");
        assert!(handler.server().is_streaming(&depth.stream_name));

        assert!(handler.stop_profile(depth.unique_id).expect("stop"));
        assert!(!handler.stop_profile(depth.unique_id).expect("stop again"));
        assert!(!handler.server().is_streaming(&depth.stream_name));
    }

    #[test]
    fn test_failed_start_stops_server_stream() {
        let mut registry = registry(None);
        let handler = registry.on_attach(faulty_device()).expect("attach");
        let broken = handler.controller().find_profile(10).expect("profile");

        assert!(handler.start_profile(&broken).is_err());
        assert!(!handler.server().is_streaming("Broken"));
        assert!(handler.controller().active_profiles().is_empty());
    }

    #[test]
    fn test_open_request_continues_after_failure() {
        let mut registry = registry(None);
        let handler = registry.on_attach(faulty_device()).expect("attach");

        handler.handle_control(&ControlMsg::OpenStreams(vec![10, 20, 30]));
        assert!(!handler.server().is_streaming("Broken"));
        assert!(handler.server().is_streaming("Left"));
        assert!(handler.server().is_streaming("Right"));
        let mut uids: Vec<i32> = handler
            .controller()
            .active_profiles()
            .iter()
            .map(|p| p.unique_id)
            .collect();
        uids.sort_unstable();
        assert_eq!(uids, vec![20, 30]);
    }

    #[test]
    fn test_close_request_continues_after_failure() {
        let device = faulty_device();
        let mut registry = registry(None);
        let handler = registry
            .on_attach(Arc::clone(&device) as Arc<dyn Device>)
            .expect("attach");
        handler.handle_control(&ControlMsg::OpenStreams(vec![20, 30]));

        device.sensors[1].fail_stop.store(true, Ordering::SeqCst);
        handler.handle_control(&ControlMsg::CloseStreams(vec![20, 30]));
        assert!(!handler.server().is_streaming("Right"));
        assert!(handler.controller().active_profiles().is_empty());
        device.sensors[1].fail_stop.store(false, Ordering::SeqCst);
    }
}
