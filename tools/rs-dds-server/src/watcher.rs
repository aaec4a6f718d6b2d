// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hardware device watcher.
//!
//! Polls a [`Context`] on its own thread and turns presence changes into
//! [`DeviceEvent`]s for the single-consumer control loop. Devices present at
//! startup are reported as attached on the first poll.

use crate::hardware::{Context, Device, DeviceId};
use crate::Result;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Presence change of one device.
#[derive(Clone)]
pub enum DeviceEvent {
    Attached(Arc<dyn Device>),
    Detached(DeviceId),
}

impl std::fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attached(device) => write!(f, "Attached({})", device.id()),
            Self::Detached(id) => write!(f, "Detached({})", id),
        }
    }
}

/// Background poller. Stops when dropped.
pub struct DeviceWatcher {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceWatcher {
    /// Start polling `context` every `poll_interval`.
    pub fn spawn(
        context: Arc<dyn Context>,
        poll_interval: Duration,
        events: Sender<DeviceEvent>,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let thread = std::thread::Builder::new()
            .name("device-watcher".to_string())
            .spawn(move || {
                let mut known = BTreeSet::new();
                loop {
                    if !poll_once(context.as_ref(), &mut known, &events) {
                        tracing::debug!("Event receiver gone, device watcher exiting");
                        return;
                    }
                    match shutdown_rx.recv_timeout(poll_interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            })?;

        tracing::debug!("Device watcher polling every {:?}", poll_interval);
        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Stop polling and wait for the thread.
    pub fn stop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Device watcher thread panicked");
            }
        }
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Diff the attached set against `known`. Returns false once nobody listens.
fn poll_once(
    context: &dyn Context,
    known: &mut BTreeSet<DeviceId>,
    events: &Sender<DeviceEvent>,
) -> bool {
    let devices = context.query_devices();
    let present: BTreeSet<DeviceId> = devices.iter().map(|d| d.id()).collect();

    for id in known.difference(&present) {
        if events.send(DeviceEvent::Detached(*id)).is_err() {
            return false;
        }
    }
    for device in devices {
        if !known.contains(&device.id()) && events.send(DeviceEvent::Attached(device)).is_err() {
            return false;
        }
    }

    *known = present;
    true
}
