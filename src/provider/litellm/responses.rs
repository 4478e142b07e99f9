//! Response bodies of the LiteLLM proxy management API
//!
//! Fields are optional and unknown fields ignored; the proxy adds fields
//! between releases.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Response of `POST /key/generate` and `POST /key/update`
#[derive(Debug, Default, Deserialize)]
pub struct KeyResponse {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of `GET /key/info`
#[derive(Debug, Deserialize)]
pub struct KeyInfoResponse {
    #[serde(default)]
    pub key: Option<String>,
    pub info: KeyInfo,
}

#[derive(Debug, Default, Deserialize)]
pub struct KeyInfo {
    #[serde(default)]
    pub key_alias: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub max_budget: Option<f64>,
    #[serde(default)]
    pub budget_duration: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub blocked: Option<bool>,
}

/// Response of `GET /key/list?return_full_object=true`
#[derive(Debug, Default, Deserialize)]
pub struct KeyListResponse {
    #[serde(default)]
    pub keys: Vec<KeyListEntry>,
}

/// One listed key; `token` is the hashed key, not the key itself
#[derive(Debug, Default, Deserialize)]
pub struct KeyListEntry {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(flatten)]
    pub info: KeyInfo,
}

/// A team as the proxy reports it
#[derive(Debug, Default, Deserialize)]
pub struct TeamRecord {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_alias: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub max_budget: Option<f64>,
    #[serde(default)]
    pub budget_duration: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Response of `GET /team/info`
#[derive(Debug, Deserialize)]
pub struct TeamInfoResponse {
    #[serde(default)]
    pub team_id: Option<String>,
    pub team_info: TeamRecord,
}

/// Response of `POST /team/update`
#[derive(Debug, Default, Deserialize)]
pub struct TeamUpdateResponse {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub data: Option<TeamRecord>,
}

/// Error body: `{"error": {"message": ..}}` or `{"detail": ..}`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<ErrorBody>,
    #[serde(default)]
    pub detail: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<Value>,
}

impl ErrorResponse {
    pub fn message(&self) -> Option<String> {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_ref())
            .or(self.detail.as_ref())
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_info_tolerates_nulls_and_extra_fields() {
        let info: KeyInfoResponse = serde_json::from_str(
            r#"{
                "key": "sk-123",
                "info": {
                    "key_alias": "svc-a",
                    "models": null,
                    "metadata": null,
                    "spend": 0.42,
                    "blocked": null
                }
            }"#,
        )
        .unwrap();
        assert_eq!(info.key.as_deref(), Some("sk-123"));
        assert_eq!(info.info.key_alias.as_deref(), Some("svc-a"));
        assert!(info.info.models.is_none());
        assert!(info.info.blocked.is_none());
    }

    #[test]
    fn test_key_list_entries_carry_token_and_info() {
        let list: KeyListResponse = serde_json::from_str(
            r#"{
                "keys": [
                    {"token": "88dc28d0f030c55ed4ab77ed8faf098196cb1c05df778539800c9f1243fe6b4b", "key_alias": "svc-a", "team_id": null}
                ],
                "total_count": 1,
                "current_page": 1
            }"#,
        )
        .unwrap();
        assert_eq!(list.keys.len(), 1);
        assert!(list.keys[0].token.as_deref().is_some_and(|t| t.starts_with("88dc")));
        assert_eq!(list.keys[0].info.key_alias.as_deref(), Some("svc-a"));
    }

    #[test]
    fn test_error_message_variants() {
        let parsed: ErrorResponse =
            serde_json::from_str(r#"{"detail": {"error": "not allowed"}}"#).unwrap();
        assert_eq!(parsed.message().as_deref(), Some(r#"{"error":"not allowed"}"#));

        let parsed: ErrorResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.message(), None);
    }
}
