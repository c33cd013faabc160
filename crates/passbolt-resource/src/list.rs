use std::{sync::Arc, time::Duration};

use passbolt_filter::{CompileError, EvalError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    ApiError, DecryptedResource, DecryptionPipeline, FetchResourcesRequest, ListSettings,
    PipelineError, ResourceApi, ResourceField, ResourceFilter, ResourceQuery, ResourceTypeApi,
    ResourceTypeCache, SecretDecryptor,
};

/// How the listed resources will be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// A table with the requested columns.
    #[default]
    Table,
    /// JSON with every field, regardless of the requested columns.
    Json,
}

/// A request for [ResourceLister::list].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResourcesRequest {
    #[allow(missing_docs)]
    pub query: ResourceQuery,
    /// Columns to render. Must not be empty.
    pub columns: Vec<ResourceField>,
    /// Filter expression. `None`, empty and whitespace-only all mean no filtering.
    pub filter: Option<String>,
    #[allow(missing_docs)]
    pub output: OutputFormat,
}

impl Default for ListResourcesRequest {
    fn default() -> Self {
        Self {
            query: ResourceQuery::default(),
            columns: ResourceField::DEFAULT_COLUMNS.to_vec(),
            filter: None,
            output: OutputFormat::Table,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ListError {
    #[error("You need to specify at least one column to return")]
    NoColumns,
    #[error("Invalid filter: {0}")]
    Compile(#[from] CompileError),
    #[error("Listing resources: {0}")]
    Fetch(#[source] ApiError),
    #[error(transparent)]
    Pipeline(PipelineError),
    #[error("Evaluating filter on resource {id}: {source}")]
    Evaluate {
        id: Uuid,
        #[source]
        source: EvalError,
    },
    #[error("No such resources found with filter: {filter}")]
    NoMatches { filter: String },
    #[error("Listing resources did not finish within {0:?}")]
    DeadlineExceeded(Duration),
    #[error("Listing resources was cancelled")]
    Cancelled,
}

impl From<PipelineError> for ListError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Cancelled => ListError::Cancelled,
            e => ListError::Pipeline(e),
        }
    }
}

/// Whether any part of the request needs decrypted secrets: a sensitive column, a filter that
/// reads a sensitive field, or JSON output, which always includes every field.
pub fn need_secrets(
    columns: &[ResourceField],
    filter: Option<&ResourceFilter>,
    output: OutputFormat,
) -> bool {
    output == OutputFormat::Json
        || columns.iter().any(|column| column.is_sensitive())
        || filter.is_some_and(ResourceFilter::references_sensitive)
}

/// Lists, decrypts and filters resources.
pub struct ResourceLister {
    resources: Arc<dyn ResourceApi>,
    resource_types: Arc<dyn ResourceTypeApi>,
    crypto: Arc<dyn SecretDecryptor>,
    settings: ListSettings,
}

impl ResourceLister {
    #[allow(missing_docs)]
    pub fn new(
        resources: Arc<dyn ResourceApi>,
        resource_types: Arc<dyn ResourceTypeApi>,
        crypto: Arc<dyn SecretDecryptor>,
        settings: ListSettings,
    ) -> Self {
        Self {
            resources,
            resource_types,
            crypto,
            settings,
        }
    }

    /// List the resources matching `request`, in server order.
    ///
    /// Returns [ListError::NoMatches] when a filter was given and nothing passed it.
    pub async fn list(
        &self,
        request: ListResourcesRequest,
    ) -> Result<Vec<DecryptedResource>, ListError> {
        self.list_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Like [Self::list], but stops with [ListError::Cancelled] once `cancellation` fires.
    #[instrument(skip_all, fields(output = ?request.output))]
    pub async fn list_with_cancellation(
        &self,
        request: ListResourcesRequest,
        cancellation: CancellationToken,
    ) -> Result<Vec<DecryptedResource>, ListError> {
        if request.columns.is_empty() {
            return Err(ListError::NoColumns);
        }

        let filter = match request.filter.as_deref() {
            Some(expression) if !expression.trim().is_empty() => {
                Some(ResourceFilter::compile(expression)?)
            }
            _ => None,
        };
        let need_secrets = need_secrets(&request.columns, filter.as_ref(), request.output);
        debug!(need_secrets, "Analyzed requested fields");

        // Cancelling the child stops the decryption workers when the deadline passes.
        let token = cancellation.child_token();
        let _guard = token.clone().drop_guard();
        let timeout = self.settings.timeout;

        let run = self.run(request.query, filter, need_secrets, &token);
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(ListError::Cancelled),
            result = tokio::time::timeout(timeout, run) => {
                result.unwrap_or(Err(ListError::DeadlineExceeded(timeout)))
            }
        }
    }

    async fn run(
        &self,
        query: ResourceQuery,
        filter: Option<ResourceFilter>,
        need_secrets: bool,
        cancellation: &CancellationToken,
    ) -> Result<Vec<DecryptedResource>, ListError> {
        let request = FetchResourcesRequest {
            query,
            include_secrets: need_secrets,
            include_resource_types: need_secrets,
        };
        let resources = self
            .resources
            .fetch_resources(&request)
            .await
            .map_err(ListError::Fetch)?;
        info!("Fetched {} resources", resources.len());

        let pipeline = DecryptionPipeline::new(
            self.crypto.clone(),
            Arc::new(ResourceTypeCache::new(self.resource_types.clone())),
            self.settings.max_workers,
        );
        let decrypted = pipeline
            .decrypt_all(resources, need_secrets, cancellation)
            .await?;

        let Some(filter) = filter else {
            return Ok(decrypted);
        };

        let mut matched = Vec::with_capacity(decrypted.len());
        for record in decrypted {
            let keep = filter
                .matches(&record)
                .map_err(|source| ListError::Evaluate {
                    id: record.id(),
                    source,
                })?;
            if keep {
                matched.push(record);
            }
        }
        debug!(matched = matched.len(), "Applied filter");

        if matched.is_empty() {
            return Err(ListError::NoMatches {
                filter: filter.expression().to_owned(),
            });
        }
        Ok(matched)
    }
}
