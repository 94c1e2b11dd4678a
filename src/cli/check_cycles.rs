//! Check-cycles command
//!
//! Loads several descriptors, collects their `dependsOn` relations and
//! reports the first dependency cycle, or the provisioning order.
//!
//! Provider descriptors may list their own `dependsOn` refs. Those edges are
//! added as well, so a provider that depends on an environment using it is
//! reported as a cycle.

use anyhow::{Context, Result};
use harmonix_platform::catalog::{
    collect_relations, parse_entity_ref, AwsEnvironmentEntitiesProcessor,
    AwsEnvironmentProviderEntitiesProcessor, CatalogProcessor, DependencyGraph, Entity,
    LocationSpec, RefDefaults,
};
use std::path::PathBuf;

/// Edges from a provider to the entities listed in its `dependsOn`
fn add_provider_dependencies(graph: &mut DependencyGraph, provider: &Entity) -> Result<()> {
    let this = provider.compound_ref();
    for dependency in provider.spec_str_list("dependsOn") {
        let target = parse_entity_ref(
            &dependency,
            RefDefaults {
                kind: Some("awsenvironment"),
                namespace: Some(this.namespace.as_str()),
            },
        )?;
        graph.add_edge(this.to_string(), target.to_string());
    }
    Ok(())
}

pub fn check_cycles_command(files: &[PathBuf]) -> Result<()> {
    let environments = AwsEnvironmentEntitiesProcessor::new();
    let providers = AwsEnvironmentProviderEntitiesProcessor;
    let mut graph = DependencyGraph::new();

    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let entity = Entity::from_yaml(&text)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        if providers.validate_entity_kind(&entity) {
            add_provider_dependencies(&mut graph, &entity)?;
            continue;
        }
        if !environments.validate_entity_kind(&entity) {
            continue;
        }
        let location = LocationSpec::url(format!("file:{}", file.display()));
        let relations = collect_relations(&environments, &entity, &location)?;
        graph.extend_from_results(&relations);
    }

    match graph.provisioning_order() {
        Ok(order) => {
            println!("✅ no dependency cycle");
            for (i, node) in order.iter().enumerate() {
                println!("  {}. {}", i + 1, node);
            }
            Ok(())
        }
        Err(cycle) => Err(anyhow::anyhow!(
            "Dependency cycle detected: {}",
            cycle.join(" -> ")
        )),
    }
}
