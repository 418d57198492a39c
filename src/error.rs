// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity handle was destroyed or never allocated
    InvalidEntity(Entity),

    /// Entity is not a member of the archetype it was looked up in
    EntityNotFound(Entity),

    /// Entity is already a member of the archetype
    DuplicateEntity(Entity),

    /// Component type was used before being registered
    UnregisteredComponent(&'static str),

    /// No component type was ever registered under this id
    UnknownComponentTypeId(ComponentTypeId),

    /// A value or column did not have the type registered for its id
    ComponentTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Archetype does not store this component type (type name or id)
    ComponentNotInArchetype(String),

    /// Component type was registered without a default fabricator
    MissingFabricator(ComponentTypeId),

    /// No archetype exists at this index
    UnknownArchetype(usize),

    /// Too many distinct signatures (archetype explosion)
    ArchetypeLimitExceeded(usize),

    /// Configuration could not be parsed
    ConfigError(String),

    /// A system with this name is already registered
    DuplicateSystem(String),

    /// A system reported a failure
    SystemError {
        system: String,
        message: String,
    },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidEntity(entity) => write!(f, "Invalid entity {entity}"),
            EcsError::EntityNotFound(entity) => {
                write!(f, "Entity {entity} does not exist in archetype")
            }
            EcsError::DuplicateEntity(entity) => {
                write!(f, "Entity {entity} already exists in archetype")
            }
            EcsError::UnregisteredComponent(name) => {
                write!(f, "Component {name} not registered")
            }
            EcsError::UnknownComponentTypeId(id) => {
                write!(f, "Component type {id} not registered")
            }
            EcsError::ComponentTypeMismatch { expected, found } => {
                write!(f, "Component type mismatch: expected {expected}, found {found}")
            }
            EcsError::ComponentNotInArchetype(name) => {
                write!(f, "Component {name} does not exist in archetype")
            }
            EcsError::MissingFabricator(id) => {
                write!(f, "Component type {id} has no default fabricator")
            }
            EcsError::UnknownArchetype(id) => write!(f, "Archetype {id} does not exist"),
            EcsError::ArchetypeLimitExceeded(limit) => {
                write!(f, "Archetype limit exceeded ({limit})")
            }
            EcsError::ConfigError(msg) => write!(f, "Config error: {msg}"),
            EcsError::DuplicateSystem(name) => write!(f, "System {name} already registered"),
            EcsError::SystemError { system, message } => {
                write!(f, "System {system} failed: {message}")
            }
        }
    }
}

impl std::error::Error for EcsError {}

impl From<serde_json::Error> for EcsError {
    fn from(err: serde_json::Error) -> Self {
        EcsError::ConfigError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
