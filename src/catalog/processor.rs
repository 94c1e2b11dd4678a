//! # Catalog Processors
//!
//! Processors for the `AWSEnvironment` and `AWSEnvironmentProvider` kinds.
//!
//! Each processor accepts entities of its kind that pass the kind's JSON
//! schema, then derives relations from the entity during post-processing:
//!
//! - `spec.owner` becomes an `ownedBy` / `ownerOf` pair (default kind `Group`)
//! - `spec.dependsOn` of environments becomes `dependsOn` / `dependencyOf`
//!   pairs towards `awsenvironmentprovider` entities
//!
//! Relations are derived, never stored by the processors.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::entity::{parse_entity_ref, CompoundEntityRef, Entity, RefDefaults};
use super::graph::DependencyGraph;
use super::schema::EntitySchema;
use crate::constants::{AWS_API_VERSION, AWS_ENVIRONMENT_KIND, AWS_ENVIRONMENT_PROVIDER_KIND};
use crate::error::CatalogError;
use crate::observability::metrics;

pub const RELATION_OWNED_BY: &str = "ownedBy";
pub const RELATION_OWNER_OF: &str = "ownerOf";
pub const RELATION_DEPENDS_ON: &str = "dependsOn";
pub const RELATION_DEPENDENCY_OF: &str = "dependencyOf";

/// Kind that `dependsOn` entries of an environment must resolve to
pub const PROVIDER_REF_KIND: &str = "awsenvironmentprovider";

/// Where an entity was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSpec {
    #[serde(rename = "type")]
    pub location_type: String,
    pub target: String,
}

impl LocationSpec {
    pub fn url(target: impl Into<String>) -> Self {
        Self {
            location_type: "url".to_string(),
            target: target.into(),
        }
    }
}

/// A directed relation between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRelation {
    pub source: CompoundEntityRef,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub target: CompoundEntityRef,
}

/// Output of a processing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessingResult {
    Relation { relation: EntityRelation },
}

impl ProcessingResult {
    #[must_use]
    pub fn relation(
        source: &CompoundEntityRef,
        relation_type: &str,
        target: &CompoundEntityRef,
    ) -> Self {
        ProcessingResult::Relation {
            relation: EntityRelation {
                source: source.clone(),
                relation_type: relation_type.to_string(),
                target: target.clone(),
            },
        }
    }
}

/// A catalog processing stage for one entity kind
pub trait CatalogProcessor: Send + Sync {
    fn processor_name(&self) -> &'static str;

    /// Whether this processor accepts `entity` as a valid instance of its kind
    fn validate_entity_kind(&self, entity: &Entity) -> bool;

    /// Emit the relations derived from `entity`
    fn post_process_entity(
        &self,
        entity: &Entity,
        location: &LocationSpec,
        emit: &mut dyn FnMut(ProcessingResult),
    ) -> Result<(), CatalogError>;
}

fn matches_kind(entity: &Entity, kind: &str) -> bool {
    entity.api_version == AWS_API_VERSION && entity.kind == kind
}

fn validate(processor: &str, entity: &Entity, kind: &str, schema: EntitySchema) -> bool {
    if !matches_kind(entity, kind) {
        return false;
    }
    let Ok(value) = serde_json::to_value(entity) else {
        return false;
    };
    let errors = schema.errors(&value);
    if errors.is_empty() {
        return true;
    }
    warn!(
        processor,
        entity = %entity.entity_ref(),
        "entity does not match schema: {}",
        errors.join("; ")
    );
    false
}

/// Emit `ownedBy` and `ownerOf` for `spec.owner`
fn emit_owner_relations(
    processor: &'static str,
    entity: &Entity,
    this: &CompoundEntityRef,
    emit: &mut dyn FnMut(ProcessingResult),
) -> Result<(), CatalogError> {
    let Some(owner) = entity.spec_str("owner").filter(|o| !o.is_empty()) else {
        return Ok(());
    };
    let owner = parse_entity_ref(
        owner,
        RefDefaults {
            kind: Some("Group"),
            namespace: Some(this.namespace.as_str()),
        },
    )?;
    emit(ProcessingResult::relation(this, RELATION_OWNED_BY, &owner));
    emit(ProcessingResult::relation(&owner, RELATION_OWNER_OF, this));
    metrics::increment_relations_emitted(processor, RELATION_OWNED_BY);
    metrics::increment_relations_emitted(processor, RELATION_OWNER_OF);
    Ok(())
}

/// Processor for `AWSEnvironment` entities
///
/// With [`AwsEnvironmentEntitiesProcessor::with_cycle_check`] every emitted
/// `dependsOn` edge is also recorded in a shared [`DependencyGraph`], and
/// edges that would close a cycle are rejected.
///
/// This processor only ever adds environment to provider edges, which cannot
/// form a cycle on their own. The check guards graphs that callers also
/// extend with other edges, such as provider dependencies.
#[derive(Debug, Clone, Default)]
pub struct AwsEnvironmentEntitiesProcessor {
    graph: Option<Arc<Mutex<DependencyGraph>>>,
}

impl AwsEnvironmentEntitiesProcessor {
    pub const NAME: &'static str = "AWSEnvironmentEntitiesProcessor";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cycle_check(graph: Arc<Mutex<DependencyGraph>>) -> Self {
        Self { graph: Some(graph) }
    }

    fn check_edge(&self, this: &CompoundEntityRef, target: &CompoundEntityRef) -> Result<(), CatalogError> {
        let Some(graph) = &self.graph else {
            return Ok(());
        };
        let mut graph = graph.lock().unwrap_or_else(PoisonError::into_inner);
        let (from, to) = (this.to_string(), target.to_string());
        if graph.would_cycle(&from, &to) {
            let mut candidate = graph.clone();
            candidate.add_edge(from.clone(), to.clone());
            let cycle = candidate
                .find_cycle()
                .unwrap_or_else(|| vec![from.clone(), to, from]);
            return Err(CatalogError::DependencyCycle { cycle });
        }
        graph.add_edge(from, to);
        Ok(())
    }
}

impl CatalogProcessor for AwsEnvironmentEntitiesProcessor {
    fn processor_name(&self) -> &'static str {
        Self::NAME
    }

    fn validate_entity_kind(&self, entity: &Entity) -> bool {
        validate(Self::NAME, entity, AWS_ENVIRONMENT_KIND, EntitySchema::AwsEnvironment)
    }

    fn post_process_entity(
        &self,
        entity: &Entity,
        _location: &LocationSpec,
        emit: &mut dyn FnMut(ProcessingResult),
    ) -> Result<(), CatalogError> {
        if !matches_kind(entity, AWS_ENVIRONMENT_KIND) {
            return Ok(());
        }
        let this = entity.compound_ref();
        emit_owner_relations(Self::NAME, entity, &this, emit)?;

        for dependency in entity.spec_str_list("dependsOn") {
            let target = parse_entity_ref(
                &dependency,
                RefDefaults {
                    kind: Some(PROVIDER_REF_KIND),
                    namespace: Some(this.namespace.as_str()),
                },
            )?;
            // exact match: `AWSEnvironmentProvider:x` is not a provider ref here
            if target.kind != PROVIDER_REF_KIND {
                debug!(
                    entity = %this,
                    dependency = %target,
                    "ignoring dependency that is not an environment provider"
                );
                continue;
            }
            self.check_edge(&this, &target)?;
            emit(ProcessingResult::relation(&this, RELATION_DEPENDS_ON, &target));
            emit(ProcessingResult::relation(&target, RELATION_DEPENDENCY_OF, &this));
            metrics::increment_relations_emitted(Self::NAME, RELATION_DEPENDS_ON);
            metrics::increment_relations_emitted(Self::NAME, RELATION_DEPENDENCY_OF);
        }
        Ok(())
    }
}

/// Processor for `AWSEnvironmentProvider` entities
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsEnvironmentProviderEntitiesProcessor;

impl AwsEnvironmentProviderEntitiesProcessor {
    pub const NAME: &'static str = "AWSEnvironmentProviderEntitiesProcessor";
}

impl CatalogProcessor for AwsEnvironmentProviderEntitiesProcessor {
    fn processor_name(&self) -> &'static str {
        Self::NAME
    }

    fn validate_entity_kind(&self, entity: &Entity) -> bool {
        validate(
            Self::NAME,
            entity,
            AWS_ENVIRONMENT_PROVIDER_KIND,
            EntitySchema::AwsEnvironmentProvider,
        )
    }

    fn post_process_entity(
        &self,
        entity: &Entity,
        _location: &LocationSpec,
        emit: &mut dyn FnMut(ProcessingResult),
    ) -> Result<(), CatalogError> {
        if !matches_kind(entity, AWS_ENVIRONMENT_PROVIDER_KIND) {
            return Ok(());
        }
        let this = entity.compound_ref();
        emit_owner_relations(Self::NAME, entity, &this, emit)
    }
}

/// Run `processor` over `entity` and collect what it emits
pub fn collect_relations(
    processor: &dyn CatalogProcessor,
    entity: &Entity,
    location: &LocationSpec,
) -> Result<Vec<ProcessingResult>, CatalogError> {
    let mut results = Vec::new();
    processor.post_process_entity(entity, location, &mut |result| results.push(result))?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn environment(spec: serde_json::Value) -> Entity {
        serde_json::from_value(json!({
            "apiVersion": "aws.backstage.io/v1alpha",
            "kind": "AWSEnvironment",
            "metadata": { "name": "n" },
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn test_relation_serializes_in_catalog_shape() {
        let this = CompoundEntityRef {
            kind: "AWSEnvironment".to_string(),
            namespace: "default".to_string(),
            name: "n".to_string(),
        };
        let owner = CompoundEntityRef {
            kind: "Group".to_string(),
            namespace: "default".to_string(),
            name: "o".to_string(),
        };
        let value = serde_json::to_value(ProcessingResult::relation(&this, RELATION_OWNED_BY, &owner)).unwrap();
        assert_eq!(value["type"], "relation");
        assert_eq!(value["relation"]["type"], "ownedBy");
        assert_eq!(value["relation"]["target"]["name"], "o");
    }

    #[test]
    fn test_cycle_check_rejects_back_edge() {
        let graph = Arc::new(Mutex::new(DependencyGraph::new()));
        graph
            .lock()
            .unwrap()
            .add_edge("awsenvironmentprovider:default/p", "awsenvironment:default/n");
        let processor = AwsEnvironmentEntitiesProcessor::with_cycle_check(Arc::clone(&graph));
        let entity = environment(json!({
            "type": "environment",
            "lifecycle": "dev",
            "dependsOn": ["p"],
        }));
        let err = collect_relations(&processor, &entity, &LocationSpec::url("file:///x")).unwrap_err();
        assert!(matches!(err, CatalogError::DependencyCycle { .. }), "got {err}");
    }

    #[test]
    fn test_without_cycle_check_edges_are_emitted() {
        let processor = AwsEnvironmentEntitiesProcessor::new();
        let entity = environment(json!({
            "type": "environment",
            "lifecycle": "dev",
            "dependsOn": ["p"],
        }));
        let results = collect_relations(&processor, &entity, &LocationSpec::url("file:///x")).unwrap();
        assert_eq!(results.len(), 2);
    }
}
