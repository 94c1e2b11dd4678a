//! Validate command
//!
//! Runs both catalog processors over a descriptor, the way the catalog would
//! when ingesting it.

use anyhow::{Context, Result};
use harmonix_platform::catalog::{
    collect_relations, AwsEnvironmentEntitiesProcessor, AwsEnvironmentProviderEntitiesProcessor,
    CatalogProcessor, Entity, LocationSpec,
};
use std::path::Path;

pub fn validate_command(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let entity = Entity::from_yaml(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let location = LocationSpec::url(format!("file:{}", file.display()));

    let processors: [&dyn CatalogProcessor; 2] = [
        &AwsEnvironmentEntitiesProcessor::new(),
        &AwsEnvironmentProviderEntitiesProcessor,
    ];

    println!("► {} ({})", entity.entity_ref(), entity.kind);
    let mut accepted = false;
    for processor in processors {
        if !processor.validate_entity_kind(&entity) {
            continue;
        }
        accepted = true;
        println!("✔ accepted by {}", processor.processor_name());
        let relations = collect_relations(processor, &entity, &location)?;
        println!("{}", serde_json::to_string_pretty(&relations)?);
    }

    if !accepted {
        return Err(anyhow::anyhow!(
            "{} is not a valid AWSEnvironment or AWSEnvironmentProvider",
            entity.entity_ref()
        ));
    }
    Ok(())
}
