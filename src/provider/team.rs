//! # Team Adapter
//!
//! Manages LiteLLM teams through `/team/info`, `/team/new`, `/team/update`
//! and `/team/delete`. Teams have no connection details.
//!
//! A team without a known `team_id` is looked up by `team_alias` in
//! `GET /team/list` and adopted, so a lost `/team/new` response does not
//! create a second team.

use crate::controller::reconciler::{
    ClientConstructor, ConnectionDetails, ExternalClient, ExternalError, ExternalObservation,
};
use crate::crd::{Team, TeamObservation, TeamParameters};
use crate::managed::Managed;
use crate::provider::diff;
use crate::provider::litellm::requests::{DeleteTeamsRequest, TeamRequest};
use crate::provider::litellm::responses::{TeamInfoResponse, TeamRecord, TeamUpdateResponse};
use crate::provider::litellm::LiteLlmClient;
use crate::provider::setup_managed;
use crate::runtime::SetupContext;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

pub const KIND: &str = "Team";

/// `ExternalClient` for `Team` records
#[derive(Debug)]
pub struct TeamClient {
    client: LiteLlmClient,
}

impl TeamClient {
    pub fn new(client: LiteLlmClient) -> Self {
        Self { client }
    }

    /// Find a team carrying the desired alias; returns its id and record
    async fn find_by_alias(
        &self,
        desired: &TeamParameters,
    ) -> Result<Option<(String, TeamRecord)>, ExternalError> {
        let Some(alias) = desired.team_alias.as_deref().filter(|a| !a.is_empty()) else {
            return Ok(None);
        };

        let teams: Option<Vec<TeamRecord>> = self
            .client
            .get("observe", "/team/list", &[])
            .instrument(info_span!("litellm.team.list"))
            .await?;
        let mut matches = teams
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.team_alias.as_deref() == Some(alias));

        let Some(found) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            warn!("Several teams carry alias {}, adopting the first", alias);
        }
        let Some(team_id) = found.team_id.clone().filter(|id| !id.is_empty()) else {
            return Err(ExternalError::Decode {
                operation: "observe",
                message: format!("listed team with alias {alias} carries no team_id"),
            });
        };
        info!("Adopting existing team {} with alias {}", team_id, alias);
        Ok(Some((team_id, found)))
    }
}

pub fn client_constructor() -> ClientConstructor {
    Arc::new(|params| {
        let client = LiteLlmClient::new(params)?;
        Ok(Box::new(TeamClient::new(client)) as Box<dyn ExternalClient>)
    })
}

fn as_team(mr: &mut dyn Managed) -> Result<&mut Team, ExternalError> {
    let actual = mr.kind();
    mr.as_any_mut()
        .downcast_mut::<Team>()
        .ok_or_else(|| ExternalError::NotManagedRecord {
            expected: KIND,
            actual: actual.to_string(),
        })
}

pub fn is_up_to_date(desired: &TeamParameters, observed: &TeamRecord) -> bool {
    diff::field_matches(desired.team_alias.as_ref(), observed.team_alias.as_ref())
        && diff::models_match(&desired.models, observed.models.as_ref())
        && diff::budget_matches(desired.max_budget, observed.max_budget)
        && diff::field_matches(
            desired.budget_duration.as_ref(),
            observed.budget_duration.as_ref(),
        )
        && diff::metadata_matches(&desired.metadata, observed.metadata.as_ref())
}

fn observation(team_id: &str, record: TeamRecord) -> TeamObservation {
    TeamObservation {
        team_id: record
            .team_id
            .filter(|id| !id.is_empty())
            .or_else(|| Some(team_id.to_string())),
        team_alias: record.team_alias,
    }
}

#[async_trait]
impl ExternalClient for TeamClient {
    async fn observe(&self, mr: &mut dyn Managed) -> Result<ExternalObservation, ExternalError> {
        let team = as_team(mr)?;
        let (id, record) = match team.external_id().map(str::to_string) {
            Some(id) => {
                let response: Option<TeamInfoResponse> = self
                    .client
                    .get("observe", "/team/info", &[("team_id", id.as_str())])
                    .instrument(info_span!("litellm.team.observe"))
                    .await?;
                let Some(response) = response else {
                    return Ok(ExternalObservation::absent());
                };
                let id = response.team_id.filter(|t| !t.is_empty()).unwrap_or(id);
                (id, response.team_info)
            }
            None => match self.find_by_alias(&team.spec.for_provider).await? {
                Some(found) => found,
                None => return Ok(ExternalObservation::absent()),
            },
        };

        let up_to_date = is_up_to_date(&team.spec.for_provider, &record);
        team.set_at_provider(observation(&id, record));

        Ok(ExternalObservation {
            exists: true,
            up_to_date,
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError> {
        let team = as_team(mr)?;
        let created: TeamRecord = self
            .client
            .post(
                "create",
                "/team/new",
                &TeamRequest::new_team(&team.spec.for_provider),
            )
            .instrument(info_span!("litellm.team.create"))
            .await?
            .ok_or_else(|| ExternalError::Transport {
                operation: "create",
                message: "HTTP 404: /team/new not found".to_string(),
            })?;

        let Some(team_id) = created.team_id.clone().filter(|id| !id.is_empty()) else {
            return Err(ExternalError::Decode {
                operation: "create",
                message: "response carries no team_id".to_string(),
            });
        };
        info!("Created team {} for {}", team_id, team.name());
        team.set_at_provider(observation(&team_id, created));

        Ok(ConnectionDetails::new())
    }

    async fn update(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError> {
        let team = as_team(mr)?;
        let Some(id) = team.external_id().map(str::to_string) else {
            return Err(ExternalError::Transport {
                operation: "update",
                message: "no team identifier known".to_string(),
            });
        };

        let response: TeamUpdateResponse = self
            .client
            .post(
                "update",
                "/team/update",
                &TeamRequest::update(&id, &team.spec.for_provider),
            )
            .instrument(info_span!("litellm.team.update"))
            .await?
            .ok_or_else(|| ExternalError::Transport {
                operation: "update",
                message: format!("HTTP 404: team {} not found", id),
            })?;

        let id = response.team_id.filter(|t| !t.is_empty()).unwrap_or(id);
        let record = response.data.unwrap_or_else(|| TeamRecord {
            team_alias: team.spec.for_provider.team_alias.clone(),
            ..Default::default()
        });
        team.set_at_provider(observation(&id, record));

        Ok(ConnectionDetails::new())
    }

    async fn delete(&self, mr: &mut dyn Managed) -> Result<(), ExternalError> {
        let team = as_team(mr)?;
        let Some(id) = team.external_id().map(str::to_string) else {
            debug!("No team identifier known, nothing to delete");
            return Ok(());
        };

        let deleted: Option<serde_json::Value> = self
            .client
            .post(
                "delete",
                "/team/delete",
                &DeleteTeamsRequest {
                    team_ids: vec![id.as_str()],
                },
            )
            .instrument(info_span!("litellm.team.delete"))
            .await?;
        if deleted.is_none() {
            debug!("Team already absent");
        }
        Ok(())
    }
}

/// Register the `Team` controller
pub fn setup(ctx: &SetupContext) -> Vec<JoinHandle<()>> {
    setup_managed::<Team>(ctx, KIND, client_constructor())
}
