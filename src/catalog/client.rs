//! # Catalog Client
//!
//! Access to the Backstage catalog REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, info_span, Instrument};
use zeroize::Zeroizing;

use super::entity::{parse_entity_ref, Entity, RefDefaults};
use crate::error::CatalogError;

/// A registered catalog location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(rename = "type")]
    pub location_type: String,
    pub target: String,
}

impl Location {
    /// `type:target`, the form used by the `managed-by-location` annotation
    #[must_use]
    pub fn location_ref(&self) -> String {
        format!("{}:{}", self.location_type, self.target)
    }
}

/// Catalog operations used by the platform workflows and actions
#[async_trait]
pub trait CatalogApi: Send + Sync + std::fmt::Debug {
    /// `None` when the catalog has no such entity
    async fn get_entity_by_ref(&self, entity_ref: &str) -> Result<Option<Entity>, CatalogError>;

    /// Entities in the same order as `entity_refs`; missing ones are `None`
    async fn get_entities_by_refs(
        &self,
        entity_refs: &[String],
    ) -> Result<Vec<Option<Entity>>, CatalogError>;

    async fn refresh_entity(&self, entity_ref: &str) -> Result<(), CatalogError>;

    async fn remove_entity_by_uid(&self, uid: &str) -> Result<(), CatalogError>;

    async fn get_location_by_ref(&self, location_ref: &str) -> Result<Option<Location>, CatalogError>;

    async fn remove_location_by_id(&self, id: &str) -> Result<(), CatalogError>;
}

/// REST implementation of [`CatalogApi`]
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct LocationEnvelope {
    data: Location,
}

#[derive(Deserialize)]
struct EntitiesByRefs {
    items: Vec<Option<Entity>>,
}

impl CatalogClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Authenticate requests with a backend service token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Zeroizing::new(token.into()));
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<reqwest::Response>, CatalogError> {
        let response = request
            .send()
            .await
            .map_err(|source| CatalogError::Transport { operation, source })?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                operation,
                status: status.as_u16(),
                message,
            });
        }
        Ok(Some(response))
    }

    async fn json<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, CatalogError> {
        response
            .json::<T>()
            .await
            .map_err(|source| CatalogError::Transport { operation, source })
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn get_entity_by_ref(&self, entity_ref: &str) -> Result<Option<Entity>, CatalogError> {
        let parsed = parse_entity_ref(entity_ref, RefDefaults::default())?;
        let path = format!(
            "/entities/by-name/{}/{}/{}",
            parsed.kind.to_lowercase(),
            parsed.namespace.to_lowercase(),
            parsed.name
        );
        let span = info_span!("catalog.get_entity_by_ref", entity_ref);
        async move {
            match self
                .send("get_entity_by_ref", self.request(reqwest::Method::GET, &path))
                .await?
            {
                Some(response) => Ok(Some(Self::json("get_entity_by_ref", response).await?)),
                None => {
                    debug!("Entity {} not found", entity_ref);
                    Ok(None)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn get_entities_by_refs(
        &self,
        entity_refs: &[String],
    ) -> Result<Vec<Option<Entity>>, CatalogError> {
        let span = info_span!("catalog.get_entities_by_refs", count = entity_refs.len());
        async move {
            let request = self
                .request(reqwest::Method::POST, "/entities/by-refs")
                .json(&json!({ "entityRefs": entity_refs }));
            match self.send("get_entities_by_refs", request).await? {
                Some(response) => {
                    let body: EntitiesByRefs = Self::json("get_entities_by_refs", response).await?;
                    Ok(body.items)
                }
                None => Ok(vec![None; entity_refs.len()]),
            }
        }
        .instrument(span)
        .await
    }

    async fn refresh_entity(&self, entity_ref: &str) -> Result<(), CatalogError> {
        let span = info_span!("catalog.refresh_entity", entity_ref);
        async move {
            let request = self
                .request(reqwest::Method::POST, "/refresh")
                .json(&json!({ "entityRef": entity_ref }));
            match self.send("refresh_entity", request).await? {
                Some(_) => {
                    debug!("Scheduled refresh of {}", entity_ref);
                    Ok(())
                }
                None => Err(CatalogError::NotFound(entity_ref.to_string())),
            }
        }
        .instrument(span)
        .await
    }

    async fn remove_entity_by_uid(&self, uid: &str) -> Result<(), CatalogError> {
        let path = format!("/entities/by-uid/{uid}");
        let span = info_span!("catalog.remove_entity_by_uid", uid);
        async move {
            match self
                .send("remove_entity_by_uid", self.request(reqwest::Method::DELETE, &path))
                .await?
            {
                Some(_) => {
                    info!("Removed entity {} from the catalog", uid);
                    Ok(())
                }
                None => Err(CatalogError::NotFound(uid.to_string())),
            }
        }
        .instrument(span)
        .await
    }

    async fn get_location_by_ref(&self, location_ref: &str) -> Result<Option<Location>, CatalogError> {
        let span = info_span!("catalog.get_location_by_ref", location_ref);
        async move {
            let Some(response) = self
                .send("get_location_by_ref", self.request(reqwest::Method::GET, "/locations"))
                .await?
            else {
                return Ok(None);
            };
            let locations: Vec<LocationEnvelope> =
                Self::json("get_location_by_ref", response).await?;
            Ok(locations
                .into_iter()
                .map(|l| l.data)
                .find(|l| l.location_ref() == location_ref))
        }
        .instrument(span)
        .await
    }

    async fn remove_location_by_id(&self, id: &str) -> Result<(), CatalogError> {
        let path = format!("/locations/{id}");
        let span = info_span!("catalog.remove_location_by_id", id);
        async move {
            match self
                .send("remove_location_by_id", self.request(reqwest::Method::DELETE, &path))
                .await?
            {
                Some(_) => {
                    info!("Removed location {} from the catalog", id);
                    Ok(())
                }
                None => Err(CatalogError::NotFound(id.to_string())),
            }
        }
        .instrument(span)
        .await
    }
}
