use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;
use uuid::Uuid;

use crate::{ApiError, ResourceType, ResourceTypeApi};

/// Memoizes resource types by id for the duration of one listing.
///
/// Concurrent lookups of the same id share a single fetch. A failed fetch is not cached, the
/// next lookup for that id tries again.
pub struct ResourceTypeCache {
    api: Arc<dyn ResourceTypeApi>,
    entries: Mutex<HashMap<Uuid, Arc<OnceCell<Arc<ResourceType>>>>>,
}

impl ResourceTypeCache {
    #[allow(missing_docs)]
    pub fn new(api: Arc<dyn ResourceTypeApi>) -> Self {
        Self {
            api,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the resource type with `id`, fetching it on first use.
    pub async fn get_or_fetch(&self, id: Uuid) -> Result<Arc<ResourceType>, ApiError> {
        // Only hold the map lock long enough to find the cell; the fetch itself is serialized
        // per id by the cell.
        let cell = self.entries.lock().await.entry(id).or_default().clone();

        let resource_type = cell
            .get_or_try_init(|| async {
                debug!(%id, "Fetching resource type");
                self.api.fetch_resource_type(id).await.map(Arc::new)
            })
            .await?;

        Ok(resource_type.clone())
    }

    /// Number of resource types fetched successfully so far. Failed lookups are not counted.
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Whether no resource type has been fetched successfully yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
