//! Effect - Side effects described as values
//!
//! An Effect describes one operation against the cloud. Nothing happens
//! until the Interpreter executes it.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Evaluate a data source
    Read { resource: Resource },
    /// Create a resource
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    /// Delete then recreate a resource (a ForceNew attribute changed)
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource using its cloud-side identifier
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    /// Whether this Effect changes anything in the cloud
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read { .. })
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read { resource } => &resource.id,
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } | Effect::Delete { id, .. } => id,
        }
    }
}
