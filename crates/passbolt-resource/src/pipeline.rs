use std::{num::NonZeroUsize, sync::Arc, thread, time::Instant};

use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    ApiError, DecryptError, DecryptedResource, Resource, ResourceDecryptor, ResourceFields,
    ResourceTypeCache, SecretDecryptor,
};

/// Upper bound on the number of concurrent decryption workers.
pub const MAX_DECRYPTION_WORKERS: usize = 16;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Get resource type {resource_type_id} for resource {id}: {source}")]
    ResourceType {
        id: Uuid,
        resource_type_id: Uuid,
        #[source]
        source: ApiError,
    },
    #[error("Decrypt resource {id}: {source}")]
    Decrypt {
        id: Uuid,
        #[source]
        source: DecryptError,
    },
    #[error("Decryption was cancelled")]
    Cancelled,
    #[error("A decryption worker panicked")]
    WorkerPanicked,
}

struct Job {
    index: usize,
    ordinal: usize,
    resource: Resource,
}

struct Completed {
    index: usize,
    outcome: Result<DecryptedResource, PipelineError>,
}

struct Worker {
    crypto: Arc<dyn SecretDecryptor>,
    resource_types: Arc<ResourceTypeCache>,
}

impl Worker {
    async fn run(
        self: Arc<Self>,
        jobs: Arc<Mutex<std::vec::IntoIter<Job>>>,
        results: mpsc::Sender<Completed>,
        cancellation: CancellationToken,
    ) {
        loop {
            if cancellation.is_cancelled() {
                break;
            }
            let Some(job) = jobs.lock().await.next() else {
                break;
            };

            let completed = Completed {
                index: job.index,
                outcome: self.decrypt(job.resource, job.ordinal).await,
            };
            if results.send(completed).await.is_err() {
                break;
            }
        }
    }

    async fn decrypt(
        &self,
        resource: Resource,
        ordinal: usize,
    ) -> Result<DecryptedResource, PipelineError> {
        let resource_type = self
            .resource_types
            .get_or_fetch(resource.resource_type_id)
            .await
            .map_err(|source| PipelineError::ResourceType {
                id: resource.id,
                resource_type_id: resource.resource_type_id,
                source,
            })?;

        let fields = ResourceDecryptor::new(self.crypto.as_ref())
            .decrypt(&resource, &resource_type, true)
            .await
            .map_err(|source| PipelineError::Decrypt {
                id: resource.id,
                source,
            })?;

        Ok(DecryptedResource::new(resource, fields, ordinal))
    }
}

/// Decrypts a list of resources on a bounded pool of workers.
///
/// Results come back in fetch order regardless of which worker finishes first. The first
/// failure cancels the remaining work and is returned on its own; partial results are dropped.
pub struct DecryptionPipeline {
    crypto: Arc<dyn SecretDecryptor>,
    resource_types: Arc<ResourceTypeCache>,
    max_workers: usize,
}

impl DecryptionPipeline {
    #[allow(missing_docs)]
    pub fn new(
        crypto: Arc<dyn SecretDecryptor>,
        resource_types: Arc<ResourceTypeCache>,
        max_workers: usize,
    ) -> Self {
        Self {
            crypto,
            resource_types,
            max_workers,
        }
    }

    /// Decrypt `resources`.
    ///
    /// Without `need_secrets` nothing is decrypted and no resource types are fetched: every
    /// resource is returned with its envelope fields. With `need_secrets`, resources without a
    /// secret are skipped and the rest are fully decrypted.
    #[instrument(skip_all, fields(resources = resources.len(), need_secrets = need_secrets))]
    pub async fn decrypt_all(
        &self,
        resources: Vec<Resource>,
        need_secrets: bool,
        cancellation: &CancellationToken,
    ) -> Result<Vec<DecryptedResource>, PipelineError> {
        if cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        if !need_secrets {
            return Ok(resources
                .into_iter()
                .enumerate()
                .map(|(ordinal, resource)| {
                    let fields = ResourceFields::from_envelope(&resource);
                    DecryptedResource::new(resource, fields, ordinal)
                })
                .collect());
        }

        let jobs: Vec<Job> = resources
            .into_iter()
            .enumerate()
            .filter(|(_, resource)| {
                let has_secret = resource.secret().is_some();
                if !has_secret {
                    debug!(id = %resource.id, "Skipping resource without a secret");
                }
                has_secret
            })
            .enumerate()
            .map(|(index, (ordinal, resource))| Job {
                index,
                ordinal,
                resource,
            })
            .collect();

        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let total = jobs.len();
        let concurrency = worker_count(self.max_workers, total);
        debug!(total, concurrency, "Starting decryption workers");

        // Workers stop between jobs once this is cancelled, either by the caller or by the
        // first failure below.
        let token = cancellation.child_token();
        let _guard = token.clone().drop_guard();

        let queue = Arc::new(Mutex::new(jobs.into_iter()));
        let (results_tx, mut results_rx) = mpsc::channel(concurrency * 2);
        let worker = Arc::new(Worker {
            crypto: self.crypto.clone(),
            resource_types: self.resource_types.clone(),
        });

        let mut workers = JoinSet::new();
        for _ in 0..concurrency {
            workers.spawn(worker.clone().run(
                queue.clone(),
                results_tx.clone(),
                token.clone(),
            ));
        }
        drop(results_tx);

        let mut slots: Vec<Option<DecryptedResource>> =
            std::iter::repeat_with(|| None).take(total).collect();
        loop {
            let completed = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(PipelineError::Cancelled),
                completed = results_rx.recv() => completed,
            };
            let Some(Completed { index, outcome }) = completed else {
                break;
            };
            match outcome {
                Ok(decrypted) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(decrypted);
                    }
                }
                Err(e) => {
                    token.cancel();
                    return Err(e);
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            joined.map_err(|_| PipelineError::WorkerPanicked)?;
        }

        let decrypted = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(PipelineError::WorkerPanicked)?;

        info!(
            resource_types = self.resource_types.len().await,
            "Decrypted {} resources in {:?}",
            decrypted.len(),
            started.elapsed()
        );
        Ok(decrypted)
    }
}

/// Workers to spawn for `jobs` items: one per available core, capped by `max_workers` and
/// never more than there are jobs.
fn worker_count(max_workers: usize, jobs: usize) -> usize {
    let parallelism = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    parallelism.min(max_workers).min(jobs).max(1)
}
