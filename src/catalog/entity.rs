//! # Catalog Entities
//!
//! Minimal Backstage entity model: envelope, metadata, stored relations and
//! entity references.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::DEFAULT_NAMESPACE;
use crate::error::CatalogError;

/// A catalog entity as stored by the Backstage catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub api_version: String,
    pub kind: String,
    pub metadata: EntityMeta,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<StoredRelation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Custom metadata fields (`envType`, `awsAccount`, `gitProvider`, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Relation attached to an entity read back from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelation {
    #[serde(rename = "type")]
    pub relation_type: String,
    pub target_ref: String,
}

impl Entity {
    /// Parse an entity from YAML or JSON text
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    #[must_use]
    pub fn compound_ref(&self) -> CompoundEntityRef {
        CompoundEntityRef {
            kind: self.kind.clone(),
            namespace: self.namespace().to_string(),
            name: self.metadata.name.clone(),
        }
    }

    /// `kind:namespace/name` reference of this entity
    #[must_use]
    pub fn entity_ref(&self) -> String {
        self.compound_ref().to_string()
    }

    /// Custom string field of `metadata`
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.extra.get(key).and_then(Value::as_str)
    }

    /// Custom scalar field of `metadata` rendered as text
    ///
    /// Numbers and booleans are accepted because YAML authors rarely quote
    /// account ids or flags.
    #[must_use]
    pub fn metadata_text(&self, key: &str) -> Option<String> {
        match self.metadata.extra.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Custom string field of `metadata`, or an error naming it
    pub fn require_metadata_str(&self, key: &str) -> Result<&str, CatalogError> {
        self.metadata_str(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CatalogError::MissingField {
                entity: self.entity_ref(),
                field: format!("metadata.{key}"),
            })
    }

    #[must_use]
    pub fn spec_str(&self, key: &str) -> Option<&str> {
        self.spec.get(key).and_then(Value::as_str)
    }

    /// String entries of a `spec` array; non-string entries are skipped
    #[must_use]
    pub fn spec_str_list(&self, key: &str) -> Vec<String> {
        self.spec
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Targets of stored relations of `relation_type`
    pub fn relation_targets<'a>(&'a self, relation_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.relations
            .iter()
            .filter(move |r| r.relation_type == relation_type)
            .map(|r| r.target_ref.as_str())
    }
}

/// Fully qualified entity reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompoundEntityRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for CompoundEntityRef {
    /// Kind and namespace are case-insensitive and rendered lower-case
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.kind.to_lowercase(),
            self.namespace.to_lowercase(),
            self.name
        )
    }
}

/// Defaults applied to the parts a reference leaves out
#[derive(Debug, Clone, Copy, Default)]
pub struct RefDefaults<'a> {
    pub kind: Option<&'a str>,
    pub namespace: Option<&'a str>,
}

/// Parse `[kind:][namespace/]name`
pub fn parse_entity_ref(
    reference: &str,
    defaults: RefDefaults<'_>,
) -> Result<CompoundEntityRef, CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidRef {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(invalid("reference is empty"));
    }

    let (kind, rest) = match trimmed.split_once(':') {
        Some((kind, rest)) => (Some(kind), rest),
        None => (None, trimmed),
    };
    let (namespace, name) = match rest.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, rest),
    };

    let kind = kind
        .or(defaults.kind)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| invalid("kind is missing and no default was given"))?;
    let namespace = namespace
        .or(defaults.namespace)
        .unwrap_or(DEFAULT_NAMESPACE);
    if namespace.is_empty() {
        return Err(invalid("namespace is empty"));
    }
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }

    Ok(CompoundEntityRef {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    })
}

/// `kind:namespace/name` with kind and namespace lower-cased
#[must_use]
pub fn stringify_entity_ref(kind: &str, namespace: Option<&str>, name: &str) -> String {
    CompoundEntityRef {
        kind: kind.to_string(),
        namespace: namespace.unwrap_or(DEFAULT_NAMESPACE).to_string(),
        name: name.to_string(),
    }
    .to_string()
}
