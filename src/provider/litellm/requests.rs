//! Request bodies of the LiteLLM proxy management API
//!
//! Unset and empty desired fields are left out so the proxy applies its own
//! defaults.

use crate::crd::{KeyParameters, TeamParameters};
use serde::Serialize;
use std::collections::BTreeMap;

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn no_models(models: &&[String]) -> bool {
    models.is_empty()
}

fn no_metadata(metadata: &&BTreeMap<String, String>) -> bool {
    metadata.is_empty()
}

/// Body of `POST /key/generate` and `POST /key/update`
#[derive(Debug, PartialEq, Serialize)]
pub struct KeyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "no_models")]
    pub models: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_duration: Option<&'a str>,
    #[serde(skip_serializing_if = "no_metadata")]
    pub metadata: &'a BTreeMap<String, String>,
}

impl<'a> KeyRequest<'a> {
    pub fn generate(params: &'a KeyParameters) -> Self {
        Self {
            key: non_empty(params.key.as_ref()),
            duration: non_empty(params.duration.as_ref()),
            ..Self::desired(params)
        }
    }

    /// `duration` only applies at creation
    pub fn update(key: &'a str, params: &'a KeyParameters) -> Self {
        Self {
            key: Some(key),
            ..Self::desired(params)
        }
    }

    fn desired(params: &'a KeyParameters) -> Self {
        Self {
            key: None,
            duration: None,
            key_alias: non_empty(params.key_alias.as_ref()),
            team_id: non_empty(params.team_id.as_ref()),
            user_id: non_empty(params.user_id.as_ref()),
            models: &params.models,
            max_budget: params.max_budget,
            budget_duration: non_empty(params.budget_duration.as_ref()),
            metadata: &params.metadata,
        }
    }
}

/// Body of `POST /key/delete`
#[derive(Debug, PartialEq, Serialize)]
pub struct DeleteKeysRequest<'a> {
    pub keys: Vec<&'a str>,
}

/// Body of `POST /team/new` and `POST /team/update`
#[derive(Debug, PartialEq, Serialize)]
pub struct TeamRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_alias: Option<&'a str>,
    #[serde(skip_serializing_if = "no_models")]
    pub models: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_duration: Option<&'a str>,
    #[serde(skip_serializing_if = "no_metadata")]
    pub metadata: &'a BTreeMap<String, String>,
}

impl<'a> TeamRequest<'a> {
    pub fn new_team(params: &'a TeamParameters) -> Self {
        Self {
            team_id: non_empty(params.team_id.as_ref()),
            team_alias: non_empty(params.team_alias.as_ref()),
            models: &params.models,
            max_budget: params.max_budget,
            budget_duration: non_empty(params.budget_duration.as_ref()),
            metadata: &params.metadata,
        }
    }

    pub fn update(team_id: &'a str, params: &'a TeamParameters) -> Self {
        Self {
            team_id: Some(team_id),
            ..Self::new_team(params)
        }
    }
}

/// Body of `POST /team/delete`
#[derive(Debug, PartialEq, Serialize)]
pub struct DeleteTeamsRequest<'a> {
    pub team_ids: Vec<&'a str>,
}
