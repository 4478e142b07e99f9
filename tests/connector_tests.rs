//! Connector error ordering
//!
//! Kind check, usage tracking, ProviderConfig lookup, credential resolution
//! and client construction fail in that order, each with its own error.

mod common;

use common::*;
use provider_litellm::controller::reconciler::{
    ConnectError, ErrorKind, ExternalConnector, ProviderConnector,
};
use provider_litellm::credentials::CredentialResolver;
use provider_litellm::crd::{
    CredentialsSource, EnvSelector, Key, KeySpec, ProviderConfig, ProviderConfigSpec,
    ProviderCredentials, SecretKeySelector, Team, TeamSpec,
};
use provider_litellm::provider::key;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    usage: Arc<RecordingUsageTracker>,
    configs: Arc<MemoryProviderConfigStore>,
    proxy: Arc<ScriptedProxy>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            usage: Arc::new(RecordingUsageTracker::default()),
            configs: Arc::new(MemoryProviderConfigStore::default()),
            proxy: Arc::new(ScriptedProxy::default()),
        }
    }

    fn connector(&self) -> ProviderConnector {
        ProviderConnector::new(
            "Key",
            Arc::clone(&self.usage) as _,
            Arc::clone(&self.configs) as _,
            CredentialResolver::new(Arc::new(EmptySecretStore))
                .with_env(Arc::new(|name: &str| {
                    (name == "LITELLM_MASTER_KEY").then(|| "sk-from-env".to_string())
                })),
            scripted_constructor(Arc::clone(&self.proxy)),
            Duration::from_secs(5),
        )
    }

    fn add_config(&self, credentials: ProviderCredentials) {
        self.configs.insert(ProviderConfig::new(
            "default",
            ProviderConfigSpec {
                api_base: "http://litellm.test:4000".to_string(),
                credentials,
            },
        ));
    }
}

fn svc_key() -> Key {
    Key::new("svc-a", KeySpec::default())
}

#[tokio::test]
async fn test_wrong_kind_fails_before_tracking() {
    let f = Fixture::new();
    let team = Team::new("platform", TeamSpec::default());

    let err = f.connector().connect(&team).await.err().unwrap();

    assert!(matches!(err, ConnectError::NotManagedRecord { expected: "Key", .. }));
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
    assert!(f.usage.tracked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_tracking_failure_precedes_config_lookup() {
    let f = Fixture::new();
    f.usage.fail.store(true, Ordering::SeqCst);

    let err = f.connector().connect(&svc_key()).await.err().unwrap();

    assert!(matches!(err, ConnectError::TrackFailed(_)));
    assert_eq!(err.kind(), ErrorKind::TransientTransportError);
}

#[tokio::test]
async fn test_missing_provider_config_is_tracked_first() {
    let f = Fixture::new();

    let err = f.connector().connect(&svc_key()).await.err().unwrap();

    assert!(matches!(
        err,
        ConnectError::ProviderConfigNotFound { ref name, source: None } if name == "default"
    ));
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert_eq!(f.usage.tracked.lock().unwrap().as_slice(), ["Key/svc-a"]);
}

#[tokio::test]
async fn test_unresolvable_credentials() {
    let f = Fixture::new();
    f.add_config(ProviderCredentials {
        source: CredentialsSource::Secret,
        secret_ref: Some(SecretKeySelector {
            namespace: "crossplane-system".to_string(),
            name: "litellm".to_string(),
            key: "credentials".to_string(),
        }),
        ..Default::default()
    });

    let err = f.connector().connect(&svc_key()).await.err().unwrap();

    assert!(matches!(err, ConnectError::CredentialUnavailable(_)));
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert!(f.proxy.api_keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_selector_missing_for_source() {
    let f = Fixture::new();
    f.add_config(ProviderCredentials {
        source: CredentialsSource::Inline,
        ..Default::default()
    });

    let err = f.connector().connect(&svc_key()).await.err().unwrap();
    assert!(matches!(err, ConnectError::CredentialUnavailable(_)));
}

#[tokio::test]
async fn test_environment_credentials_reach_constructor() {
    let f = Fixture::new();
    f.add_config(ProviderCredentials {
        source: CredentialsSource::Environment,
        env: Some(EnvSelector {
            name: "LITELLM_MASTER_KEY".to_string(),
        }),
        ..Default::default()
    });

    f.connector().connect(&svc_key()).await.unwrap();

    assert_eq!(f.proxy.api_keys.lock().unwrap().as_slice(), ["sk-from-env"]);
}

#[tokio::test]
async fn test_json_credentials_yield_api_key() {
    let f = Fixture::new();
    f.add_config(ProviderCredentials {
        source: CredentialsSource::Inline,
        inline: Some(r#"{"api_key": "sk-json"}"#.to_string()),
        ..Default::default()
    });

    f.connector().connect(&svc_key()).await.unwrap();

    assert_eq!(f.proxy.api_keys.lock().unwrap().as_slice(), ["sk-json"]);
}

#[tokio::test]
async fn test_litellm_client_rejects_empty_key() {
    init_rustls();
    let f = Fixture::new();
    f.add_config(ProviderCredentials::default());
    let connector = ProviderConnector::new(
        "Key",
        Arc::clone(&f.usage) as _,
        Arc::clone(&f.configs) as _,
        CredentialResolver::new(Arc::new(EmptySecretStore)),
        key::client_constructor(),
        Duration::from_secs(5),
    );

    let err = connector.connect(&svc_key()).await.err().unwrap();

    assert!(matches!(err, ConnectError::ClientConstructionFailed(_)));
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}
