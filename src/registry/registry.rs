//! The tracker catalog: name ↔ type ↔ factory.

use std::collections::HashMap;
use std::path::Path;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::tracking::{RemoteDescriptor, RemoteTracker, TrackerContext, TrackingAlgorithm};

use super::events::{EventHub, RegistryEvent};

/// Identifier of a registered tracking algorithm.
///
/// Ids are assigned sequentially at registration. The reserved
/// [`TrackerType::NO_TRACKING`] always exists and means "tracking
/// disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerType(pub u32);

impl TrackerType {
    /// Tracking disabled; never has a factory.
    pub const NO_TRACKING: TrackerType = TrackerType(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TrackerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Constructs a tracker instance bound to the session's model.
/// Fallible: a remote tracker may not be able to connect.
pub type TrackerFactory =
    Box<dyn Fn(TrackerContext) -> Result<Box<dyn TrackingAlgorithm>> + Send + Sync>;

/// Exported entry point expected from a tracker plugin library. The
/// plugin registers its factories by calling back into the registry.
type PluginEntryPoint = unsafe extern "C" fn(*mut Registry);

/// Symbol name resolved in plugin libraries.
const PLUGIN_ENTRY_SYMBOL: &[u8] = b"register_tracker";

pub struct Registry {
    type_by_name: HashMap<String, TrackerType>,
    name_by_type: HashMap<TrackerType, String>,
    factories: HashMap<TrackerType, TrackerFactory>,
    next_id: u32,
    /// Loaded plugin libraries; kept alive so their factories stay valid
    /// for the registry's lifetime.
    libraries: Vec<libloading::Library>,
    events: EventHub,
}

impl Registry {
    pub fn new() -> Self {
        let mut type_by_name = HashMap::new();
        let mut name_by_type = HashMap::new();
        type_by_name.insert("No Tracking".to_string(), TrackerType::NO_TRACKING);
        name_by_type.insert(TrackerType::NO_TRACKING, "No Tracking".to_string());
        Self {
            type_by_name,
            name_by_type,
            factories: HashMap::new(),
            next_id: 1,
            libraries: Vec::new(),
            events: EventHub::new(),
        }
    }

    /// Register a tracker under a fresh type id.
    ///
    /// Fails with [`Error::DuplicateName`] if the name is taken; the
    /// registry is left untouched in that case.
    pub fn register(&mut self, name: &str, factory: TrackerFactory) -> Result<TrackerType> {
        if self.type_by_name.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        let ty = TrackerType::new(self.next_id);
        self.next_id += 1;
        self.type_by_name.insert(name.to_string(), ty);
        self.name_by_type.insert(ty, name.to_string());
        self.factories.insert(ty, factory);
        info!("registered tracker `{name}` as {ty}");
        self.events.publish(&RegistryEvent::NewTracker {
            ty,
            name: name.to_string(),
        });
        Ok(ty)
    }

    /// Register a remote tracker so it can be selected like any other.
    /// The factory connects the proxy when the tracker is activated.
    pub fn register_remote(&mut self, descriptor: RemoteDescriptor) -> Result<TrackerType> {
        let name = descriptor.name.clone();
        self.register(
            &name,
            Box::new(move |context| {
                Ok(Box::new(RemoteTracker::connect(descriptor.clone(), context)?) as Box<_>)
            }),
        )
    }

    /// Build an instance of a registered tracker, tagged with its type.
    ///
    /// `Ok(None)` for [`TrackerType::NO_TRACKING`] and unknown ids; `Err`
    /// when the factory itself fails (e.g. a remote endpoint refusing the
    /// connection), in which case the caller keeps its previous tracker.
    pub fn construct(
        &self,
        ty: TrackerType,
        context: TrackerContext,
    ) -> Result<Option<Box<dyn TrackingAlgorithm>>> {
        let Some(factory) = self.factories.get(&ty) else {
            return Ok(None);
        };
        let mut tracker = factory(context)?;
        tracker.set_tracker_type(ty);
        Ok(Some(tracker))
    }

    /// Load a tracker module from disk.
    ///
    /// A `*.zmq` path is a remote-tracker descriptor: it is parsed and
    /// announced via [`RegistryEvent::NewRemoteTracker`] without
    /// registering a factory. Anything else is opened as a shared
    /// library whose exported `register_tracker` entry point registers
    /// factories by calling back into this registry.
    pub fn load_tracker_library(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if path.extension().is_some_and(|e| e == "zmq") {
            let descriptor = RemoteDescriptor::from_file(path)?;
            info!("found remote tracker `{}` at {}", descriptor.name, descriptor.address);
            self.events
                .publish(&RegistryEvent::NewRemoteTracker(descriptor));
            return Ok(());
        }

        // SAFETY: the library is a tracker plugin following the documented
        // contract; its entry point only calls back into `register`.
        unsafe {
            let library = libloading::Library::new(path)?;
            let entry: libloading::Symbol<PluginEntryPoint> = library.get(PLUGIN_ENTRY_SYMBOL)?;
            entry(self as *mut Registry);
            self.libraries.push(library);
        }
        Ok(())
    }

    /// Subscribe to registration notifications.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn tracker_type(&self, name: &str) -> Option<TrackerType> {
        self.type_by_name.get(name).copied()
    }

    pub fn name(&self, ty: TrackerType) -> Option<&str> {
        self.name_by_type.get(&ty).map(String::as_str)
    }

    /// All registered trackers in id order, for menu construction.
    pub fn trackers(&self) -> Vec<(TrackerType, String)> {
        let mut entries: Vec<_> = self
            .name_by_type
            .iter()
            .map(|(ty, name)| (*ty, name.clone()))
            .collect();
        entries.sort_by_key(|(ty, _)| ty.0);
        entries
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
