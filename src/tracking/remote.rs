//! Remote-process tracker proxy.
//!
//! Forwards frames to an external tracker process over a ZeroMQ REQ
//! socket and merges the replies into the trajectory model. The hosting
//! session treats it exactly like an in-process algorithm.
//!
//! Wire protocol, one request per frame:
//! - part 1: JSON header `{"cmd":"track","frame":N,"rows":R,"cols":C,"type":T}`
//! - part 2: raw frame bytes
//!
//! Reply: JSON `{"objects":[{"id":0,"name":"...","component":{...}}]}`
//! where `component` is a serialized [`TrackedComponent`].

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use opencv::core::Mat;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{TrackedComponent, TrajectorySet};
use crate::registry::TrackerType;

use super::algorithm::{TrackerContext, TrackingAlgorithm};

/// Reply timeout; a remote that stays silent longer is reported as a
/// notification, not an aborted session.
const RECV_TIMEOUT_MS: i32 = 2000;

/// Connection descriptor parsed from a `*.zmq` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    /// Display name of the remote tracker.
    pub name: String,
    /// ZeroMQ endpoint, e.g. `tcp://127.0.0.1:5556`.
    pub address: String,
}

impl RemoteDescriptor {
    /// Parse a descriptor file (YAML with `name` and `address` keys).
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let descriptor: RemoteDescriptor = serde_yaml::from_reader(File::open(path)?)?;
        Ok(descriptor)
    }
}

/// One tracked object in a remote reply.
#[derive(Debug, Deserialize)]
struct RemoteObservation {
    /// Identity assigned by the remote process, stable across frames.
    id: u32,
    name: Option<String>,
    component: TrackedComponent,
}

#[derive(Debug, Deserialize)]
struct RemoteReply {
    #[serde(default)]
    objects: Vec<RemoteObservation>,
}

pub struct RemoteTracker {
    ty: TrackerType,
    descriptor: RemoteDescriptor,
    context: TrackerContext,
    socket: zmq::Socket,
    /// Remote object id → local trajectory id.
    identity_map: HashMap<u32, u32>,
}

impl RemoteTracker {
    pub fn connect(descriptor: RemoteDescriptor, context: TrackerContext) -> Result<Self> {
        let zmq_context = zmq::Context::new();
        let socket = zmq_context.socket(zmq::REQ)?;
        socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;
        socket.set_linger(0)?;
        socket.connect(&descriptor.address)?;
        debug!("connected remote tracker `{}` at {}", descriptor.name, descriptor.address);
        Ok(Self {
            ty: TrackerType::NO_TRACKING,
            descriptor,
            context,
            socket,
            identity_map: HashMap::new(),
        })
    }
}

impl TrackingAlgorithm for RemoteTracker {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn tracker_type(&self) -> TrackerType {
        self.ty
    }

    fn set_tracker_type(&mut self, ty: TrackerType) {
        self.ty = ty;
    }

    fn track(&mut self, frame: &Mat, number: u32) -> Result<()> {
        let header = json!({
            "cmd": "track",
            "frame": number,
            "rows": frame.rows(),
            "cols": frame.cols(),
            "type": frame.typ(),
        });
        self.socket
            .send(header.to_string().as_bytes(), zmq::SNDMORE)?;
        self.socket.send(frame.data_bytes()?, 0)?;

        let reply = self
            .socket
            .recv_bytes(0)
            .map_err(|_| Error::Remote(format!("`{}` did not reply in time", self.descriptor.name)))?;
        let reply: RemoteReply = serde_json::from_slice(&reply)?;

        let mut model = self.context.model.write();
        apply_observations(&mut model, &mut self.identity_map, number, reply.objects);
        Ok(())
    }

    fn reset(&mut self) {
        self.identity_map.clear();
        // Best effort; a silent remote only costs the timeout.
        if self.socket.send(json!({"cmd": "reset"}).to_string().as_bytes(), 0).is_ok() {
            let _ = self.socket.recv_bytes(0);
        }
    }
}

/// Merge one frame's remote observations into the model, creating local
/// trajectories for unseen remote identities.
fn apply_observations(
    model: &mut TrajectorySet,
    identity_map: &mut HashMap<u32, u32>,
    frame: u32,
    observations: Vec<RemoteObservation>,
) {
    for observation in observations {
        let local = match identity_map.get(&observation.id) {
            Some(&id) if model.get(id).is_some() => id,
            _ => {
                let name = observation
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("remote {}", observation.id));
                let id = model.create(name);
                identity_map.insert(observation.id, id);
                id
            }
        };
        if let Some(trajectory) = model.get_mut(local) {
            trajectory.insert(frame, observation.component);
        }
    }
}
