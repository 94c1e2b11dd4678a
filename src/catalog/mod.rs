//! # Catalog
//!
//! Backstage catalog integration: the entity model, the processors for the
//! custom AWS kinds and a REST client for catalog maintenance.

mod client;
mod entity;
pub mod graph;
pub mod processor;
mod schema;

pub use client::{CatalogApi, CatalogClient, Location};
pub use entity::{
    parse_entity_ref, stringify_entity_ref, CompoundEntityRef, Entity, EntityMeta, RefDefaults,
    StoredRelation,
};
pub use graph::DependencyGraph;
pub use processor::{
    collect_relations, AwsEnvironmentEntitiesProcessor, AwsEnvironmentProviderEntitiesProcessor,
    CatalogProcessor, EntityRelation, LocationSpec, ProcessingResult,
};
pub use schema::EntitySchema;
