// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host element model.
//!
//! Tracks never own the objects they animate. The host exposes its object
//! hierarchy through the [`Element`] trait, and the track keeps only weak
//! references to whatever it resolves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identity of a host element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
    /// Create a new random element ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean
    Bool,
    /// Scalar number
    Number,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// RGB color
    Color3,
    /// Position + rotation frame
    CFrame,
    /// String
    Text,
}

impl ValueKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Number => "Number",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Color3 => "Color3",
            Self::CFrame => "CFrame",
            Self::Text => "Text",
        }
    }

    /// Whether values of this kind blend between keyframes
    pub fn is_continuous(&self) -> bool {
        !matches!(self, Self::Bool | Self::Text)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of an element property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Scalar number
    Number(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// RGB color, components in 0..=1
    Color3([f32; 3]),
    /// Position and unit quaternion rotation (x, y, z, w)
    CFrame {
        /// Translation
        position: [f32; 3],
        /// Rotation quaternion
        rotation: [f32; 4],
    },
    /// String
    Text(String),
}

impl PropertyValue {
    /// Get the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::Vector2(_) => ValueKind::Vector2,
            Self::Vector3(_) => ValueKind::Vector3,
            Self::Color3(_) => ValueKind::Color3,
            Self::CFrame { .. } => ValueKind::CFrame,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Get as number if possible
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as Vector3 if possible
    pub fn as_vector3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as text if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Error reported by the host when a property write is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    /// The element has no such property
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// The value kind does not match the property
    #[error("Property {property} expects {expected}, got {actual}")]
    KindMismatch {
        /// Property name
        property: String,
        /// Kind the property holds
        expected: ValueKind,
        /// Kind that was written
        actual: ValueKind,
    },

    /// The element was destroyed
    #[error("Element is destroyed")]
    Destroyed,

    /// Host-specific failure
    #[error("{0}")]
    Custom(String),
}

/// Shared handle to a host element
pub type ElementRef = Arc<dyn Element>;

/// An externally-owned object whose properties a track may write.
///
/// Implementations must be cheap to query; resolution walks the hierarchy
/// through [`Element::find_first_child`] on every cache miss.
pub trait Element: Send + Sync {
    /// Stable identity, used as the lock table key
    fn id(&self) -> ElementId;

    /// Current name of the element
    fn name(&self) -> String;

    /// Concrete class name
    fn class_name(&self) -> String;

    /// Whether this element is of the given type or inherits from it
    fn is_a(&self, type_name: &str) -> bool {
        self.class_name() == type_name
    }

    /// False once the host has destroyed the element
    fn is_alive(&self) -> bool {
        true
    }

    /// First direct child with the given name
    fn find_first_child(&self, name: &str) -> Option<ElementRef>;

    /// Direct children in host order
    fn children(&self) -> Vec<ElementRef>;

    /// Read a property
    fn get_property(&self, property: &str) -> Option<PropertyValue>;

    /// Write a property
    fn set_property(&self, property: &str, value: PropertyValue) -> Result<(), PropertyError>;
}

/// Identity comparison between two element handles
pub fn same_element(a: &ElementRef, b: &ElementRef) -> bool {
    a.id() == b.id()
}
