//! # Key Adapter
//!
//! Manages LiteLLM virtual keys.
//!
//! | Operation | Endpoint                   |
//! |-----------|----------------------------|
//! | observe   | `GET /key/info?key=<id>`   |
//! | create    | `POST /key/generate`       |
//! | update    | `POST /key/update`         |
//! | delete    | `POST /key/delete`         |
//! | adopt     | `GET /key/list?key_alias=` |
//!
//! The key's identifier is `status.atProvider.key`, falling back to
//! `spec.forProvider.key` for keys the user names up front. The generated key
//! is published as the `key` connection detail.
//!
//! Without an identifier, observe looks the key up by `key_alias` through
//! `GET /key/list` so a key whose creation response was lost is adopted
//! rather than generated twice. An adopted key is identified by its hashed
//! token, which `/key/info` accepts but which is not usable as a key, so no
//! connection detail is published for it.

use crate::controller::reconciler::{
    ClientConstructor, ConnectionDetails, ExternalClient, ExternalError, ExternalObservation,
};
use crate::crd::{Key, KeyObservation, KeyParameters};
use crate::managed::Managed;
use crate::provider::diff;
use crate::provider::litellm::requests::{DeleteKeysRequest, KeyRequest};
use crate::provider::litellm::responses::{
    KeyInfo, KeyInfoResponse, KeyListResponse, KeyResponse,
};
use crate::provider::litellm::LiteLlmClient;
use crate::provider::setup_managed;
use crate::runtime::SetupContext;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

pub const KIND: &str = "Key";

/// Connection detail holding the key
pub const CONNECTION_KEY: &str = "key";

/// `ExternalClient` for `Key` records
#[derive(Debug)]
pub struct KeyClient {
    client: LiteLlmClient,
}

impl KeyClient {
    pub fn new(client: LiteLlmClient) -> Self {
        Self { client }
    }

    /// Find a key carrying the desired alias; returns its token and info
    async fn find_by_alias(
        &self,
        desired: &KeyParameters,
    ) -> Result<Option<(String, KeyInfo)>, ExternalError> {
        let Some(alias) = desired.key_alias.as_deref().filter(|a| !a.is_empty()) else {
            debug!("No key identifier or alias known yet");
            return Ok(None);
        };

        let response: Option<KeyListResponse> = self
            .client
            .get(
                "observe",
                "/key/list",
                &[("key_alias", alias), ("return_full_object", "true")],
            )
            .instrument(info_span!("litellm.key.list"))
            .await?;
        let mut matches = response
            .map(|r| r.keys)
            .unwrap_or_default()
            .into_iter()
            .filter(|k| k.info.key_alias.as_deref() == Some(alias));

        let Some(found) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            warn!("Several keys carry alias {}, adopting the first", alias);
        }
        let Some(token) = found.token.filter(|t| !t.is_empty()) else {
            return Err(ExternalError::Decode {
                operation: "observe",
                message: format!("listed key with alias {alias} carries no token"),
            });
        };
        info!("Adopting existing key with alias {}", alias);
        Ok(Some((token, found.info)))
    }
}

/// Hashed tokens identify a key but are not usable as one
fn is_key_value(id: &str) -> bool {
    id.starts_with("sk-")
}

/// Constructor handed to the connector
pub fn client_constructor() -> ClientConstructor {
    Arc::new(|params| {
        let client = LiteLlmClient::new(params)?;
        Ok(Box::new(KeyClient::new(client)) as Box<dyn ExternalClient>)
    })
}

fn as_key(mr: &mut dyn Managed) -> Result<&mut Key, ExternalError> {
    let actual = mr.kind();
    mr.as_any_mut()
        .downcast_mut::<Key>()
        .ok_or_else(|| ExternalError::NotManagedRecord {
            expected: KIND,
            actual: actual.to_string(),
        })
}

fn connection_details(key: &str) -> ConnectionDetails {
    ConnectionDetails::from([(CONNECTION_KEY.to_string(), key.as_bytes().to_vec())])
}

/// Whether the key the proxy reports matches the desired parameters
///
/// `duration` only applies at creation and is not compared.
pub fn is_up_to_date(desired: &KeyParameters, observed: &KeyInfo) -> bool {
    diff::field_matches(desired.key_alias.as_ref(), observed.key_alias.as_ref())
        && diff::field_matches(desired.team_id.as_ref(), observed.team_id.as_ref())
        && diff::field_matches(desired.user_id.as_ref(), observed.user_id.as_ref())
        && diff::models_match(&desired.models, observed.models.as_ref())
        && diff::budget_matches(desired.max_budget, observed.max_budget)
        && diff::field_matches(
            desired.budget_duration.as_ref(),
            observed.budget_duration.as_ref(),
        )
        && diff::metadata_matches(&desired.metadata, observed.metadata.as_ref())
}

fn observation(fallback_key: &str, response: KeyResponse) -> KeyObservation {
    KeyObservation {
        key: response
            .key
            .filter(|k| !k.is_empty())
            .or_else(|| Some(fallback_key.to_string())),
        expires: response.expires,
        user_id: response.user_id,
        status: response.status,
    }
}

#[async_trait]
impl ExternalClient for KeyClient {
    async fn observe(&self, mr: &mut dyn Managed) -> Result<ExternalObservation, ExternalError> {
        let key = as_key(mr)?;
        let (id, info) = match key.external_id().map(str::to_string) {
            Some(id) => {
                let response: Option<KeyInfoResponse> = self
                    .client
                    .get("observe", "/key/info", &[("key", id.as_str())])
                    .instrument(info_span!("litellm.key.observe"))
                    .await?;
                let Some(response) = response else {
                    return Ok(ExternalObservation::absent());
                };
                (id, response.info)
            }
            None => match self.find_by_alias(&key.spec.for_provider).await? {
                Some(found) => found,
                None => return Ok(ExternalObservation::absent()),
            },
        };

        let up_to_date = is_up_to_date(&key.spec.for_provider, &info);
        let status = if info.blocked == Some(true) {
            "blocked"
        } else {
            "active"
        };
        key.set_at_provider(KeyObservation {
            key: Some(id.clone()),
            expires: info.expires,
            user_id: info.user_id,
            status: Some(status.to_string()),
        });

        let connection_details = if is_key_value(&id) {
            connection_details(&id)
        } else {
            ConnectionDetails::new()
        };
        Ok(ExternalObservation {
            exists: true,
            up_to_date,
            connection_details,
        })
    }

    async fn create(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError> {
        let key = as_key(mr)?;
        let response: KeyResponse = self
            .client
            .post(
                "create",
                "/key/generate",
                &KeyRequest::generate(&key.spec.for_provider),
            )
            .instrument(info_span!("litellm.key.create"))
            .await?
            .ok_or_else(|| ExternalError::Transport {
                operation: "create",
                message: "HTTP 404: /key/generate not found".to_string(),
            })?;

        let Some(generated) = response.key.clone().filter(|k| !k.is_empty()) else {
            return Err(ExternalError::Decode {
                operation: "create",
                message: "response carries no key".to_string(),
            });
        };
        info!("Generated key for {}", key.name());
        key.set_at_provider(observation(&generated, response));

        Ok(connection_details(&generated))
    }

    async fn update(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError> {
        let key = as_key(mr)?;
        let Some(id) = key.external_id().map(str::to_string) else {
            return Err(ExternalError::Transport {
                operation: "update",
                message: "no key identifier known".to_string(),
            });
        };

        let response: KeyResponse = self
            .client
            .post(
                "update",
                "/key/update",
                &KeyRequest::update(&id, &key.spec.for_provider),
            )
            .instrument(info_span!("litellm.key.update"))
            .await?
            .ok_or_else(|| ExternalError::Transport {
                operation: "update",
                message: format!("HTTP 404: key {} not found", key.name()),
            })?;

        let observed = observation(&id, response);
        let current = observed.key.clone().unwrap_or(id);
        key.set_at_provider(observed);

        Ok(connection_details(&current))
    }

    async fn delete(&self, mr: &mut dyn Managed) -> Result<(), ExternalError> {
        let key = as_key(mr)?;
        let Some(id) = key.external_id().map(str::to_string) else {
            debug!("No key identifier known, nothing to delete");
            return Ok(());
        };

        let deleted: Option<serde_json::Value> = self
            .client
            .post(
                "delete",
                "/key/delete",
                &DeleteKeysRequest {
                    keys: vec![id.as_str()],
                },
            )
            .instrument(info_span!("litellm.key.delete"))
            .await?;
        if deleted.is_none() {
            debug!("Key already absent");
        }
        Ok(())
    }
}

/// Register the `Key` controller
pub fn setup(ctx: &SetupContext) -> Vec<JoinHandle<()>> {
    setup_managed::<Key>(ctx, KIND, client_constructor())
}
