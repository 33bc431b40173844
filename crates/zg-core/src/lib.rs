//! Core types for Zeitgeber: entities, poses, volumes, and the entity registry.
//!
//! This crate defines the data model the time-control engine operates on. It
//! carries no simulation logic: you can construct a [`World`] programmatically
//! and hand it to the engine, or serialize one to JSON.

/// Entity identifiers, player identifiers, and the entity record.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Spatial pose: position and orientation.
pub mod pose;
/// Spatial volumes used by time-dilation regions.
pub mod volume;
/// The entity registry that owns all entities.
pub mod world;

/// Re-export core entity types.
pub use entity::{Entity, EntityId, PlayerId};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export the pose type.
pub use pose::Pose;
/// Re-export the sphere volume.
pub use volume::Sphere;
/// Re-export the entity registry.
pub use world::World;
