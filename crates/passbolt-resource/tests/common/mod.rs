#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use passbolt_resource::{
    ApiError, CryptoError, FetchResourcesRequest, ListSettings, Resource, ResourceApi,
    ResourceLister, ResourceType, ResourceTypeApi, Secret, SecretDecryptor,
};
use rand::Rng;
use uuid::Uuid;

/// Sleep for a random duration up to `max`.
async fn jitter(max: Duration) {
    if max.is_zero() {
        return;
    }
    let millis = rand::thread_rng().gen_range(0..=max.as_millis() as u64);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

pub fn resource_type(slug: &str) -> ResourceType {
    ResourceType {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: None,
        description: None,
    }
}

/// Serves resource types from memory and counts fetches.
#[derive(Default)]
pub struct StubResourceTypes {
    types: HashMap<Uuid, ResourceType>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    max_latency: Duration,
}

impl StubResourceTypes {
    pub fn new<'a>(types: impl IntoIterator<Item = &'a ResourceType>) -> Self {
        Self {
            types: types.into_iter().map(|ty| (ty.id, ty.clone())).collect(),
            ..Default::default()
        }
    }

    /// Fail the next `failures` fetches with a transport error.
    pub fn failing(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceTypeApi for StubResourceTypes {
    async fn fetch_resource_type(&self, id: Uuid) -> Result<ResourceType, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        jitter(self.max_latency).await;

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ApiError::Transport("connection reset".to_string()));
        }

        self.types
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::ResponseContent {
                status: 404,
                message: "The resource type does not exist.".to_string(),
            })
    }
}

/// Maps ciphertexts to plaintexts and counts calls.
#[derive(Default)]
pub struct StubCrypto {
    plaintexts: HashMap<String, String>,
    calls: AtomicUsize,
    max_latency: Duration,
}

impl StubCrypto {
    pub fn with_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretDecryptor for StubCrypto {
    async fn decrypt_ciphertext(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        jitter(self.max_latency).await;
        self.plaintexts
            .get(ciphertext)
            .cloned()
            .ok_or_else(|| CryptoError("session key decryption failed".to_string()))
    }
}

/// Returns a fixed list of resources and records every request.
pub struct StubResources {
    resources: Vec<Resource>,
    requests: Mutex<Vec<FetchResourcesRequest>>,
    latency: Duration,
}

impl StubResources {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<FetchResourcesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceApi for StubResources {
    async fn fetch_resources(
        &self,
        request: &FetchResourcesRequest,
    ) -> Result<Vec<Resource>, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.latency).await;

        let mut resources = self.resources.clone();
        if !request.include_secrets {
            for resource in &mut resources {
                resource.secrets.clear();
            }
        }
        Ok(resources)
    }
}

/// Builds resources along with the plaintexts their ciphertexts decrypt to.
#[derive(Default)]
pub struct Vault {
    pub resources: Vec<Resource>,
    pub plaintexts: HashMap<String, String>,
}

impl Vault {
    /// Add a legacy `password-and-description` resource with a plaintext envelope.
    pub fn legacy(&mut self, ty: &ResourceType, name: &str, uri: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        let ciphertext = format!("secret-{id}");
        self.plaintexts.insert(
            ciphertext.clone(),
            serde_json::json!({ "password": password, "description": "" }).to_string(),
        );
        self.push(Resource {
            name: Some(name.to_string()),
            username: Some("admin".to_string()),
            uri: Some(uri.to_string()),
            secrets: vec![Secret {
                id: None,
                data: ciphertext,
            }],
            ..envelope(id, ty)
        })
    }

    /// Add a `v5-default` resource whose name and URI only exist in encrypted metadata.
    pub fn modern(&mut self, ty: &ResourceType, name: &str, uri: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        let metadata = format!("metadata-{id}");
        let ciphertext = format!("secret-{id}");
        self.plaintexts.insert(
            metadata.clone(),
            serde_json::json!({
                "object_type": "PASSBOLT_RESOURCE_METADATA",
                "resource_type_id": ty.id,
                "name": name,
                "username": "admin",
                "uris": [uri],
                "description": ""
            })
            .to_string(),
        );
        self.plaintexts.insert(
            ciphertext.clone(),
            serde_json::json!({
                "object_type": "PASSBOLT_SECRET_DATA",
                "password": password,
                "description": ""
            })
            .to_string(),
        );
        self.push(Resource {
            metadata: Some(metadata),
            secrets: vec![Secret {
                id: None,
                data: ciphertext,
            }],
            ..envelope(id, ty)
        })
    }

    /// Add a legacy resource the server returned without any secret.
    pub fn without_secret(&mut self, ty: &ResourceType, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.push(Resource {
            name: Some(name.to_string()),
            ..envelope(id, ty)
        })
    }

    /// Make the secret of `id` undecryptable.
    pub fn corrupt(&mut self, id: Uuid) {
        self.plaintexts.remove(&format!("secret-{id}"));
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.resources.iter().map(|resource| resource.id).collect()
    }

    pub fn crypto(&self) -> StubCrypto {
        StubCrypto {
            plaintexts: self.plaintexts.clone(),
            ..Default::default()
        }
    }

    fn push(&mut self, resource: Resource) -> Uuid {
        let id = resource.id;
        self.resources.push(resource);
        id
    }
}

fn envelope(id: Uuid, ty: &ResourceType) -> Resource {
    let created = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
    Resource {
        id,
        folder_parent_id: None,
        resource_type_id: ty.id,
        name: None,
        username: None,
        uri: None,
        description: None,
        metadata: None,
        secrets: Vec::new(),
        created,
        modified: created,
    }
}

/// A lister over `vault`, returning the stubs so tests can inspect calls.
pub fn lister(
    vault: &Vault,
    types: &[&ResourceType],
    settings: ListSettings,
) -> (
    ResourceLister,
    Arc<StubResources>,
    Arc<StubResourceTypes>,
    Arc<StubCrypto>,
) {
    let resources = Arc::new(StubResources::new(vault.resources.clone()));
    let resource_types = Arc::new(StubResourceTypes::new(types.iter().copied()));
    let crypto = Arc::new(vault.crypto());
    let lister = ResourceLister::new(
        resources.clone(),
        resource_types.clone(),
        crypto.clone(),
        settings,
    );
    (lister, resources, resource_types, crypto)
}
