// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control loop.
//!
//! ```text
//! DeviceWatcher thread --DeviceEvent--> Bridge::step (control thread)
//!                                         +-- on_attach / on_detach
//!                                         +-- subscriber control requests
//! ```

use crate::config::ServerConfig;
use crate::hardware::{Context, DeviceId};
use crate::registry::DeviceHandlerRegistry;
use crate::watcher::{DeviceEvent, DeviceWatcher};
use crate::{BridgeError, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use realdds::{DeviceBroadcaster, Participant, StreamStatsSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Longest wait for an event before serving control requests again.
pub const STEP_INTERVAL: Duration = Duration::from_millis(50);

/// Statistics of one started stream.
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub device: DeviceId,
    pub topic_root: String,
    pub stream: String,
    pub stats: StreamStatsSnapshot,
}

/// Bridges hardware devices onto a DDS participant.
pub struct Bridge {
    registry: DeviceHandlerRegistry,
    events: Receiver<DeviceEvent>,
    watcher: DeviceWatcher,
}

impl Bridge {
    /// Start announcing devices and watching `context`.
    ///
    /// Fails when the discovery endpoint cannot be created.
    pub fn start(
        participant: Arc<Participant>,
        context: Arc<dyn Context>,
        config: &ServerConfig,
    ) -> Result<Self> {
        let mut broadcaster = DeviceBroadcaster::new(Arc::clone(&participant));
        broadcaster.run()?;

        let auto_start = config.auto_start.then(|| config.default_profile.clone());
        match &auto_start {
            Some(selector) => tracing::info!("Default stream: {}", selector.describe()),
            None => tracing::info!("Default stream disabled"),
        }
        let registry = DeviceHandlerRegistry::new(participant, broadcaster, auto_start);

        let (tx, rx) = channel::unbounded();
        let watcher =
            DeviceWatcher::spawn(context, Duration::from_millis(config.watcher_poll_ms), tx)?;

        Ok(Self {
            registry,
            events: rx,
            watcher,
        })
    }

    /// Handle at most one device event, then serve control requests.
    ///
    /// Only fatal errors are returned.
    pub fn step(&mut self, timeout: Duration) -> Result<()> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => self.handle_event(event)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(BridgeError::Hardware("device watcher stopped".into()));
            }
        }
        self.registry.process_control_requests();
        Ok(())
    }

    fn handle_event(&mut self, event: DeviceEvent) -> Result<()> {
        match event {
            DeviceEvent::Attached(device) => {
                let id = device.id();
                match self.registry.on_attach(device) {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => {
                        tracing::error!("Device {}: {}", id, e);
                        return Err(e);
                    }
                    Err(e) => tracing::warn!("Device {} not bridged: {}", id, e),
                }
            }
            DeviceEvent::Detached(id) => match self.registry.on_detach(id) {
                Ok(_) => {}
                Err(BridgeError::UnknownDevice(_)) => {
                    tracing::debug!("Detached device {} was not bridged", id);
                }
                Err(e) => tracing::warn!("Device {} detach: {}", id, e),
            },
        }
        Ok(())
    }

    /// Step until `running` is cleared or a fatal error occurs.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            self.step(STEP_INTERVAL)?;
        }
        Ok(())
    }

    /// Stop watching and detach every device.
    pub fn shutdown(mut self) {
        self.watcher.stop();
        self.registry.shutdown();
        tracing::info!("Bridge stopped");
    }

    pub fn registry(&self) -> &DeviceHandlerRegistry {
        &self.registry
    }

    /// Statistics of every started stream.
    pub fn stream_reports(&self) -> Vec<StreamReport> {
        let mut reports = Vec::new();
        for (id, handler) in self.registry.iter() {
            let server = handler.server();
            for stream in server.stream_names() {
                if !server.is_streaming(&stream) {
                    continue;
                }
                if let Some(stats) = server.stream_stats(&stream) {
                    reports.push(StreamReport {
                        device: *id,
                        topic_root: handler.info().topic_root.clone(),
                        stream,
                        stats,
                    });
                }
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimDeviceConfig;
    use crate::sim::SimContext;
    use realdds::{DomainState, LocalTransport};
    use std::time::Instant;

    fn participant() -> Arc<Participant> {
        let transport = LocalTransport::with_state(Arc::new(DomainState::new(0)));
        Arc::new(
            Participant::builder("bridge-test")
                .with_transport(Arc::new(transport))
                .build()
                .expect("participant"),
        )
    }

    fn step_until(bridge: &mut Bridge, done: impl Fn(&Bridge) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !done(bridge) {
            assert!(Instant::now() < deadline, "timed out");
            bridge.step(Duration::from_millis(10)).expect("step");
        }
    }

    #[test]
    fn test_hotplug_through_the_loop() {
        let context = Arc::new(SimContext::new());
        let config = ServerConfig {
            watcher_poll_ms: 10,
            ..Default::default()
        };
        let mut bridge = Bridge::start(participant(), context.clone(), &config).expect("start");

        let id = context.attach(&SimDeviceConfig::d435("5"));
        step_until(&mut bridge, |b| b.registry().len() == 1);
        assert!(bridge.registry().broadcaster().contains("realsense/D435/5"));

        step_until(&mut bridge, |b| {
            b.stream_reports()
                .iter()
                .any(|r| r.stream == "Color" && r.stats.frames_published > 0)
        });

        context.detach(id);
        step_until(&mut bridge, |b| b.registry().is_empty());
        assert_eq!(bridge.registry().broadcaster().device_count(), 0);
        bridge.shutdown();
    }

    #[test]
    fn test_collision_stops_the_loop() {
        let context = Arc::new(SimContext::new());
        let config = ServerConfig {
            watcher_poll_ms: 10,
            ..Default::default()
        };
        let mut bridge = Bridge::start(participant(), context.clone(), &config).expect("start");
        context.attach(&SimDeviceConfig::d435("5"));
        context.attach(&SimDeviceConfig::d435("5"));

        let running = AtomicBool::new(true);
        let err = bridge.run(&running).expect_err("collision");
        assert!(err.is_fatal());
        assert_eq!(bridge.registry().len(), 1);
        bridge.shutdown();
    }
}
