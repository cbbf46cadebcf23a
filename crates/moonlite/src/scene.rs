// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory element hierarchy.
//!
//! This module provides:
//! - [`Instance`], a thread-safe [`Element`] implementation
//! - [`SceneNode`], a serializable scene description loaded from RON
//!
//! Hosts with their own scene graph implement [`Element`] directly; this
//! tree backs the preview binary and the test suites.

use crate::element::{Element, ElementId, ElementRef, PropertyError, PropertyValue};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Class every instance inherits from
pub const BASE_CLASS: &str = "Instance";

/// A node in the in-memory hierarchy
pub struct Instance {
    id: ElementId,
    name: RwLock<String>,
    class_name: String,
    superclasses: Vec<String>,
    properties: RwLock<IndexMap<String, PropertyValue>>,
    children: RwLock<Vec<Arc<Instance>>>,
    parent: RwLock<Weak<Instance>>,
    destroyed: AtomicBool,
    writes: AtomicU64,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .field("class_name", &self.class_name)
            .field("destroyed", &self.destroyed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Instance {
    /// Create a detached instance
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Arc<Self> {
        Self::with_superclasses(name, class_name, Vec::new())
    }

    /// Create a detached instance that also satisfies `is_a` for `superclasses`
    pub fn with_superclasses(
        name: impl Into<String>,
        class_name: impl Into<String>,
        superclasses: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ElementId::new(),
            name: RwLock::new(name.into()),
            class_name: class_name.into(),
            superclasses,
            properties: RwLock::new(IndexMap::new()),
            children: RwLock::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
            destroyed: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        })
    }

    /// Declare a property with its initial value
    pub fn insert_property(&self, property: impl Into<String>, value: PropertyValue) {
        self.properties.write().insert(property.into(), value);
    }

    /// Builder-style property declaration
    pub fn with_property(self: Arc<Self>, property: impl Into<String>, value: PropertyValue) -> Arc<Self> {
        self.insert_property(property, value);
        self
    }

    /// Rename the instance
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Parent `child` under `parent`, detaching it from any previous parent
    pub fn add_child(parent: &Arc<Self>, child: Arc<Self>) {
        child.detach();
        *child.parent.write() = Arc::downgrade(parent);
        parent.children.write().push(child);
    }

    /// Builder-style [`Instance::add_child`]
    pub fn with_child(self: Arc<Self>, child: Arc<Self>) -> Arc<Self> {
        Self::add_child(&self, child);
        self
    }

    /// Remove this instance from its parent
    pub fn detach(&self) {
        let parent = std::mem::take(&mut *self.parent.write());
        if let Some(parent) = parent.upgrade() {
            parent.children.write().retain(|c| c.id != self.id);
        }
    }

    /// Current parent, if any
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.read().upgrade()
    }

    /// Destroy this instance and all of its descendants
    pub fn destroy(&self) {
        self.detach();
        self.destroy_subtree();
    }

    fn destroy_subtree(&self) {
        self.destroyed.store(true, Ordering::Release);
        let children = std::mem::take(&mut *self.children.write());
        for child in children {
            *child.parent.write() = Weak::new();
            child.destroy_subtree();
        }
    }

    /// Find a descendant by a `.`-separated path of names
    pub fn descendant(self: &Arc<Self>, path: &str) -> Option<Arc<Self>> {
        let mut current = Arc::clone(self);
        for segment in path.split('.') {
            let next = current
                .children
                .read()
                .iter()
                .find(|c| *c.name.read() == segment)
                .cloned()?;
            current = next;
        }
        Some(current)
    }

    /// Number of accepted property writes
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Coerce into a shared element handle
    pub fn as_element(self: &Arc<Self>) -> ElementRef {
        Arc::clone(self) as ElementRef
    }
}

impl Element for Instance {
    fn id(&self) -> ElementId {
        self.id
    }

    fn name(&self) -> String {
        self.name.read().clone()
    }

    fn class_name(&self) -> String {
        self.class_name.clone()
    }

    fn is_a(&self, type_name: &str) -> bool {
        type_name == BASE_CLASS
            || self.class_name == type_name
            || self.superclasses.iter().any(|s| s == type_name)
    }

    fn is_alive(&self) -> bool {
        !self.destroyed.load(Ordering::Acquire)
    }

    fn find_first_child(&self, name: &str) -> Option<ElementRef> {
        self.children
            .read()
            .iter()
            .find(|c| *c.name.read() == name)
            .map(|c| Arc::clone(c) as ElementRef)
    }

    fn children(&self) -> Vec<ElementRef> {
        self.children
            .read()
            .iter()
            .map(|c| Arc::clone(c) as ElementRef)
            .collect()
    }

    fn get_property(&self, property: &str) -> Option<PropertyValue> {
        self.properties.read().get(property).cloned()
    }

    fn set_property(&self, property: &str, value: PropertyValue) -> Result<(), PropertyError> {
        if !self.is_alive() {
            return Err(PropertyError::Destroyed);
        }

        let mut properties = self.properties.write();
        let slot = properties
            .get_mut(property)
            .ok_or_else(|| PropertyError::UnknownProperty(property.to_string()))?;

        if slot.kind() != value.kind() {
            return Err(PropertyError::KindMismatch {
                property: property.to_string(),
                expected: slot.kind(),
                actual: value.kind(),
            });
        }

        *slot = value;
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Error loading a scene description
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Scene parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Serializable description of an instance tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    /// Instance name
    pub name: String,
    /// Class name
    pub class: String,
    /// Additional classes satisfied by `is_a`
    #[serde(default)]
    pub superclasses: Vec<String>,
    /// Declared properties with initial values
    #[serde(default)]
    pub properties: IndexMap<String, PropertyValue>,
    /// Child nodes
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self, SceneError> {
        Ok(ron::from_str(s)?)
    }

    /// Load a scene description from a RON file
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Instantiate the described tree
    pub fn build(&self) -> Arc<Instance> {
        let instance = Instance::with_superclasses(
            self.name.clone(),
            self.class.clone(),
            self.superclasses.clone(),
        );
        for (property, value) in &self.properties {
            instance.insert_property(property.clone(), value.clone());
        }
        for child in &self.children {
            Instance::add_child(&instance, child.build());
        }
        instance
    }
}
