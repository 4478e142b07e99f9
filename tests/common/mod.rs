//! Common test utilities
//!
//! In-memory implementations of the reconciler's collaborators, plus a
//! scripted external client whose behaviour each test sets up front.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use provider_litellm::controller::publisher::ConnectionPublisher;
use provider_litellm::controller::reconciler::{
    ClientConstructor, ConnectionDetails, ExternalClient, ExternalError, ExternalObservation,
    ProviderConfigStore, RecordStore, StoreError, UsageTracker,
};
use provider_litellm::credentials::{CredentialError, SecretStore};
use provider_litellm::crd::{
    CredentialsSource, Key, KeyObservation, KeyParameters, ProviderConfig, ProviderConfigSpec,
    ProviderCredentials,
};
use provider_litellm::managed::{Managed, ManagedResource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Must run before any reqwest client is built.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Record store with resourceVersion preconditions
///
/// Releasing the last finalizer of a deleting record removes it, as the API
/// server would.
pub struct MemoryRecordStore<M> {
    records: Mutex<HashMap<String, M>>,
    version: AtomicUsize,
    /// Fail the next conditional status write with a conflict
    pub conflict_next_status: AtomicBool,
    pub status_writes: AtomicUsize,
    pub forced_status_writes: AtomicUsize,
}

impl<M: ManagedResource> MemoryRecordStore<M> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            version: AtomicUsize::new(1),
            conflict_next_status: AtomicBool::new(false),
            status_writes: AtomicUsize::new(0),
            forced_status_writes: AtomicUsize::new(0),
        }
    }

    fn bump(&self, record: &mut M) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Managed::meta_mut(record).resource_version = Some(version.to_string());
    }

    pub fn insert(&self, mut record: M) {
        self.bump(&mut record);
        let name = Managed::name(&record).to_string();
        self.records.lock().unwrap().insert(name, record);
    }

    pub fn stored(&self, name: &str) -> Option<M> {
        self.records.lock().unwrap().get(name).cloned()
    }

    fn check_version(&self, record: &M) -> Result<(), StoreError> {
        let name = Managed::name(record);
        let records = self.records.lock().unwrap();
        let current = records
            .get(name)
            .ok_or_else(|| StoreError::Unavailable(format!("{name} not found")))?;
        if Managed::meta(current).resource_version != Managed::meta(record).resource_version {
            return Err(StoreError::Conflict {
                name: name.to_string(),
                message: "the object has been modified".to_string(),
            });
        }
        Ok(())
    }

    fn write(&self, record: &M) -> M {
        let mut stored = record.clone();
        self.bump(&mut stored);
        let name = Managed::name(&stored).to_string();
        let mut records = self.records.lock().unwrap();
        let finalizers_empty = Managed::meta(&stored)
            .finalizers
            .as_ref()
            .is_none_or(Vec::is_empty);
        if stored.is_deleting() && finalizers_empty {
            records.remove(&name);
        } else {
            records.insert(name, stored.clone());
        }
        stored
    }
}

#[async_trait]
impl<M: ManagedResource> RecordStore<M> for MemoryRecordStore<M> {
    async fn get(&self, name: &str) -> Result<Option<M>, StoreError> {
        Ok(self.stored(name))
    }

    async fn update(&self, record: &M) -> Result<M, StoreError> {
        self.check_version(record)?;
        Ok(self.write(record))
    }

    async fn update_status(&self, record: &M) -> Result<M, StoreError> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        if self.conflict_next_status.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conflict {
                name: Managed::name(record).to_string(),
                message: "the object has been modified".to_string(),
            });
        }
        self.check_version(record)?;
        Ok(self.write(record))
    }

    async fn force_update_status(&self, record: &M) -> Result<M, StoreError> {
        self.forced_status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.write(record))
    }
}

#[derive(Default)]
pub struct MemoryProviderConfigStore {
    configs: Mutex<HashMap<String, ProviderConfig>>,
}

impl MemoryProviderConfigStore {
    pub fn insert(&self, config: ProviderConfig) {
        let name = config.metadata.name.clone().unwrap_or_default();
        self.configs.lock().unwrap().insert(name, config);
    }
}

#[async_trait]
impl ProviderConfigStore for MemoryProviderConfigStore {
    async fn get(&self, name: &str) -> Result<Option<ProviderConfig>, StoreError> {
        Ok(self.configs.lock().unwrap().get(name).cloned())
    }
}

/// ProviderConfig `name` with an inline master key
pub fn inline_provider_config(name: &str, api_key: &str) -> ProviderConfig {
    ProviderConfig::new(
        name,
        ProviderConfigSpec {
            api_base: "http://litellm.test:4000".to_string(),
            credentials: ProviderCredentials {
                source: CredentialsSource::Inline,
                inline: Some(api_key.to_string()),
                ..Default::default()
            },
        },
    )
}

#[derive(Default)]
pub struct RecordingUsageTracker {
    pub tracked: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl UsageTracker for RecordingUsageTracker {
    async fn track(&self, mr: &dyn Managed) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("usage API down".to_string()));
        }
        self.tracked
            .lock()
            .unwrap()
            .push(format!("{}/{}", mr.kind(), mr.name()));
        Ok(())
    }
}

/// Secret store with no Secrets
pub struct EmptySecretStore;

#[async_trait]
impl SecretStore for EmptySecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
        _key: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        Err(CredentialError::SecretNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<HashMap<String, ConnectionDetails>>,
    pub unpublished: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn details(&self, name: &str) -> Option<ConnectionDetails> {
        self.published.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl ConnectionPublisher for RecordingPublisher {
    async fn publish(&self, mr: &dyn Managed, details: &ConnectionDetails) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("secrets API down".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .insert(mr.name().to_string(), details.clone());
        Ok(())
    }

    async fn unpublish(&self, mr: &dyn Managed) -> Result<(), StoreError> {
        self.published.lock().unwrap().remove(mr.name());
        self.unpublished.lock().unwrap().push(mr.name().to_string());
        Ok(())
    }
}

/// State of the fake proxy behind [`ScriptedKeyClient`]
#[derive(Default)]
pub struct ScriptedProxy {
    pub exists: AtomicBool,
    pub up_to_date: AtomicBool,
    pub fail_observe: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Create stores the key, then fails as if the response was lost
    pub fail_create_after_store: AtomicBool,
    pub calls: Mutex<Vec<&'static str>>,
    pub created_with: Mutex<Option<KeyParameters>>,
    pub stored_alias: Mutex<Option<String>>,
    pub api_keys: Mutex<Vec<String>>,
    /// Cancelled when the named call reaches the proxy
    pub cancel_on: Mutex<Option<(&'static str, CancellationToken)>>,
}

impl ScriptedProxy {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(**c, "create" | "update" | "delete"))
            .count()
    }

    pub fn cancel_during(&self, call: &'static str, token: &CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((call, token.clone()));
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
        if let Some((on, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *on == call {
                token.cancel();
            }
        }
    }
}

/// Key client answering from a [`ScriptedProxy`]
///
/// Create generates `sk-123` with status `generated`. Without an identifier,
/// observe adopts a stored key whose alias matches.
pub struct ScriptedKeyClient {
    proxy: Arc<ScriptedProxy>,
}

pub const GENERATED_KEY: &str = "sk-123";

fn as_key(mr: &mut dyn Managed) -> Result<&mut Key, ExternalError> {
    let actual = mr.kind();
    mr.as_any_mut()
        .downcast_mut::<Key>()
        .ok_or_else(|| ExternalError::NotManagedRecord {
            expected: "Key",
            actual: actual.to_string(),
        })
}

fn key_details(key: &str) -> ConnectionDetails {
    ConnectionDetails::from([("key".to_string(), key.as_bytes().to_vec())])
}

#[async_trait]
impl ExternalClient for ScriptedKeyClient {
    async fn observe(&self, mr: &mut dyn Managed) -> Result<ExternalObservation, ExternalError> {
        let key = as_key(mr)?;
        self.proxy.record("observe");
        if self.proxy.fail_observe.load(Ordering::SeqCst) {
            return Err(ExternalError::Transport {
                operation: "observe",
                message: "connection refused".to_string(),
            });
        }
        if !self.proxy.exists.load(Ordering::SeqCst) {
            return Ok(ExternalObservation::absent());
        }
        let id = match key.external_id() {
            Some(id) => id.to_string(),
            None => {
                let stored = self.proxy.stored_alias.lock().unwrap().clone();
                if stored.is_none() || stored != key.spec.for_provider.key_alias {
                    return Ok(ExternalObservation::absent());
                }
                key.set_at_provider(KeyObservation {
                    key: Some(GENERATED_KEY.to_string()),
                    status: Some("active".to_string()),
                    ..Default::default()
                });
                GENERATED_KEY.to_string()
            }
        };
        Ok(ExternalObservation {
            exists: true,
            up_to_date: self.proxy.up_to_date.load(Ordering::SeqCst),
            connection_details: key_details(&id),
        })
    }

    async fn create(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError> {
        let key = as_key(mr)?;
        self.proxy.record("create");
        *self.proxy.created_with.lock().unwrap() = Some(key.spec.for_provider.clone());
        *self.proxy.stored_alias.lock().unwrap() = key.spec.for_provider.key_alias.clone();
        self.proxy.exists.store(true, Ordering::SeqCst);
        self.proxy.up_to_date.store(true, Ordering::SeqCst);
        if self.proxy.fail_create_after_store.load(Ordering::SeqCst) {
            return Err(ExternalError::Transport {
                operation: "create",
                message: "operation timed out".to_string(),
            });
        }
        key.set_at_provider(KeyObservation {
            key: Some(GENERATED_KEY.to_string()),
            status: Some("generated".to_string()),
            ..Default::default()
        });
        Ok(key_details(GENERATED_KEY))
    }

    async fn update(&self, mr: &mut dyn Managed) -> Result<ConnectionDetails, ExternalError> {
        as_key(mr)?;
        self.proxy.record("update");
        self.proxy.up_to_date.store(true, Ordering::SeqCst);
        Ok(ConnectionDetails::new())
    }

    async fn delete(&self, mr: &mut dyn Managed) -> Result<(), ExternalError> {
        as_key(mr)?;
        self.proxy.record("delete");
        if self.proxy.fail_delete.load(Ordering::SeqCst) {
            return Err(ExternalError::Transport {
                operation: "delete",
                message: "HTTP 503: proxy unavailable".to_string(),
            });
        }
        self.proxy.exists.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Constructor handing out clients bound to `proxy`, recording the API keys
pub fn scripted_constructor(proxy: Arc<ScriptedProxy>) -> ClientConstructor {
    Arc::new(move |params| {
        proxy.api_keys.lock().unwrap().push(params.api_key.to_string());
        Ok(Box::new(ScriptedKeyClient {
            proxy: Arc::clone(&proxy),
        }) as Box<dyn ExternalClient>)
    })
}

/// `record` as the API server returns it once deletion was requested
pub fn mark_deleting<M: ManagedResource>(record: M) -> M {
    let mut value = serde_json::to_value(&record).unwrap();
    value["metadata"]["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}
