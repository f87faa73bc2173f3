//! # Physical Asset Description
//!
//! The capability description a physical adapter exposes: the actions it can
//! execute, and the properties, events and relationships it reports.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::DescriptionError;

/// An action the physical asset can execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAssetAction {
    /// Action key, used to build the action-trigger topic.
    pub key: String,
    /// Semantic action type (e.g. `switch.toggle`).
    pub action_type: String,
    /// Content type of the action payload.
    pub content_type: String,
}

impl PhysicalAssetAction {
    pub fn new(
        key: impl Into<String>,
        action_type: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            action_type: action_type.into(),
            content_type: content_type.into(),
        }
    }
}

/// A property reported by the physical asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalAssetProperty {
    pub key: String,
    pub initial_value: serde_json::Value,
}

impl PhysicalAssetProperty {
    pub fn new(key: impl Into<String>, initial_value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            initial_value,
        }
    }
}

/// An event notification the physical asset can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAssetEvent {
    pub key: String,
    pub event_type: String,
}

impl PhysicalAssetEvent {
    pub fn new(key: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            event_type: event_type.into(),
        }
    }
}

/// A relationship the physical asset can take part in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAssetRelationship {
    pub name: String,
    pub relationship_type: String,
}

impl PhysicalAssetRelationship {
    pub fn new(name: impl Into<String>, relationship_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relationship_type: relationship_type.into(),
        }
    }
}

/// Capability description of a physical adapter (PAD).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalAssetDescription {
    pub actions: Vec<PhysicalAssetAction>,
    pub properties: Vec<PhysicalAssetProperty>,
    pub events: Vec<PhysicalAssetEvent>,
    pub relationships: Vec<PhysicalAssetRelationship>,
}

impl PhysicalAssetDescription {
    /// Create an empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper to add an action.
    #[must_use]
    pub fn with_action(mut self, action: PhysicalAssetAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Builder-style helper to add a property.
    #[must_use]
    pub fn with_property(mut self, property: PhysicalAssetProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Builder-style helper to add an event.
    #[must_use]
    pub fn with_event(mut self, event: PhysicalAssetEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Builder-style helper to add a relationship.
    #[must_use]
    pub fn with_relationship(mut self, relationship: PhysicalAssetRelationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Keys of the exposed actions, in declaration order.
    pub fn action_keys(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|a| a.key.as_str())
    }

    /// Check the description is well formed.
    ///
    /// Every key must be non-empty and action keys must be unique, since each
    /// one maps to exactly one action-trigger topic.
    pub fn validate(&self) -> Result<(), DescriptionError> {
        let mut seen = HashSet::new();
        for action in &self.actions {
            if action.key.is_empty() {
                return Err(DescriptionError::EmptyKey { kind: "action" });
            }
            if !seen.insert(action.key.as_str()) {
                return Err(DescriptionError::DuplicateAction(action.key.clone()));
            }
        }
        if self.properties.iter().any(|p| p.key.is_empty()) {
            return Err(DescriptionError::EmptyKey { kind: "property" });
        }
        if self.events.iter().any(|e| e.key.is_empty()) {
            return Err(DescriptionError::EmptyKey { kind: "event" });
        }
        if self.relationships.iter().any(|r| r.name.is_empty()) {
            return Err(DescriptionError::EmptyKey {
                kind: "relationship",
            });
        }
        Ok(())
    }
}
