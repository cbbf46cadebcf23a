// SPDX-License-Identifier: MIT OR Apache-2.0
//! Element resolution.
//!
//! Authored paths are resolved against the root on demand and cached as weak
//! handles. A cached handle is only trusted while its element is alive;
//! anything else triggers a fresh walk. Replacements registered through
//! [`ElementResolver::replace`] take precedence over walking.

use crate::element::{Element, ElementId, ElementRef};
use crate::sequence::{ElementPath, SequenceDefinition};
use std::sync::{Arc, Weak};

/// Weak binding from an authored path to a live element
#[derive(Clone)]
pub struct ElementHandle {
    id: ElementId,
    element: Weak<dyn Element>,
}

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandle")
            .field("id", &self.id)
            .field("alive", &self.get().is_some())
            .finish()
    }
}

impl ElementHandle {
    /// Create a handle to an element
    pub fn new(element: &ElementRef) -> Self {
        Self {
            id: element.id(),
            element: Arc::downgrade(element),
        }
    }

    /// Identity of the bound element
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The element, if it still exists and is alive
    pub fn get(&self) -> Option<ElementRef> {
        self.element.upgrade().filter(|e| e.is_alive())
    }
}

/// What the resolver needs to know about one authored element
#[derive(Debug, Clone)]
struct Target {
    path: ElementPath,
    class_hint: String,
    cached: Option<ElementHandle>,
    replacement: Option<ElementHandle>,
}

/// Resolves authored element paths under a root
#[derive(Debug)]
pub struct ElementResolver {
    root: Option<ElementHandle>,
    targets: Vec<Target>,
    strict_types: bool,
}

impl ElementResolver {
    /// Create a resolver for every element of `sequence`
    pub fn new(root: Option<&ElementRef>, sequence: &SequenceDefinition, strict_types: bool) -> Self {
        let targets = sequence
            .elements()
            .iter()
            .map(|descriptor| Target {
                path: descriptor.path.clone(),
                class_hint: descriptor.class_hint.clone(),
                cached: None,
                replacement: None,
            })
            .collect();

        Self {
            root: root.map(ElementHandle::new),
            targets,
            strict_types,
        }
    }

    /// Number of authored targets
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Resolve the element for descriptor `index`
    pub fn resolve(&mut self, index: usize) -> Option<ElementRef> {
        let root = self.root.as_ref().and_then(ElementHandle::get);
        let strict_types = self.strict_types;
        let target = self.targets.get_mut(index)?;

        if let Some(replacement) = &target.replacement {
            return replacement.get();
        }

        if let Some(element) = target.cached.as_ref().and_then(ElementHandle::get) {
            return Some(element);
        }

        let found = root.and_then(|root| walk(&root, &target.path));
        let found = match found {
            Some(element) if strict_types && !element.is_a(&target.class_hint) => {
                tracing::warn!(
                    "Element at {} is a {}, expected {}",
                    target.path,
                    element.class_name(),
                    target.class_hint
                );
                None
            }
            other => other,
        };

        match &found {
            Some(element) => {
                tracing::debug!("Resolved {} to {}", target.path, element.id());
                target.cached = Some(ElementHandle::new(element));
            }
            None => {
                if target.cached.take().is_some() {
                    tracing::debug!("Lost binding for {}", target.path);
                } else {
                    tracing::debug!("No element at {}", target.path);
                }
            }
        }

        found
    }

    /// Resolve every target, in authored order, skipping misses
    pub fn resolve_all(&mut self) -> Vec<(usize, ElementRef)> {
        (0..self.targets.len())
            .filter_map(|index| self.resolve(index).map(|element| (index, element)))
            .collect()
    }

    /// Override resolution of `path` with `replacement`.
    /// Returns false if no authored element has that path.
    pub fn replace(&mut self, path: &ElementPath, replacement: &ElementRef) -> bool {
        let Some(target) = self.targets.iter_mut().find(|t| &t.path == path) else {
            return false;
        };
        target.replacement = Some(ElementHandle::new(replacement));
        target.cached = None;
        true
    }
}

/// Follow `path` from `root` through first-child lookups
fn walk(root: &ElementRef, path: &ElementPath) -> Option<ElementRef> {
    let mut current = Arc::clone(root);
    for segment in path.segments() {
        current = current.find_first_child(segment)?;
    }
    current.is_alive().then_some(current)
}
