//! Generic operations over one resource collection of the API.
//!
//! Every resource-specific API is a thin layer on top of [`ApiClient`],
//! which knows the resource path and turns retrieve, list, create, update,
//! delete and search calls into correctly shaped, chunked and concurrently
//! dispatched HTTP requests.

use crate::bulk::execute_tasks;
use crate::client::ClientInner;
use crate::error::{ApiError, Error, Result};
use crate::identifier::IdentifierSequence;
use crate::jobs::ContextualizationJob;
use crate::pagination::{self, ListRequest};
use crate::resource::{FilterSpec, UpdateItem, UpdateMode, WriteItem};
use crate::transport::{HttpRequest, HttpResponse};
use crate::types::{ListMethod, RequestLimits};
use crate::utils::split_into_chunks;
use futures::stream::{Stream, TryStreamExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// POST endpoints that only read data and can be replayed safely
const RETRYABLE_POST_SUFFIXES: [&str; 4] = ["list", "byids", "search", "aggregate"];

/// Base client for one resource collection
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
    resource_path: String,
    limits: RequestLimits,
}

impl ApiClient {
    pub(crate) fn new<S: Into<String>>(inner: Arc<ClientInner>, resource_path: S) -> Self {
        Self {
            inner,
            resource_path: resource_path.into(),
            limits: RequestLimits::default(),
        }
    }

    /// Override the per-request item limits
    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Path of the resource collection, relative to the project
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Per-request item limits
    pub fn limits(&self) -> &RequestLimits {
        &self.limits
    }

    fn max_workers(&self) -> usize {
        self.inner.config.max_workers
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.resource_path, suffix)
    }

    /// GET a path relative to the project
    pub async fn get(&self, path: &str, query: Vec<(String, String)>) -> Result<HttpResponse> {
        self.do_request(Method::GET, path, query, None).await
    }

    /// POST a JSON body to a path relative to the project
    pub async fn post(&self, path: &str, body: Value) -> Result<HttpResponse> {
        self.do_request(Method::POST, path, Vec::new(), Some(body)).await
    }

    /// PUT a JSON body to a path relative to the project
    pub async fn put(&self, path: &str, body: Value) -> Result<HttpResponse> {
        self.do_request(Method::PUT, path, Vec::new(), Some(body)).await
    }

    /// DELETE a path relative to the project
    pub async fn delete(&self, path: &str, query: Vec<(String, String)>) -> Result<HttpResponse> {
        self.do_request(Method::DELETE, path, query, None).await
    }

    async fn do_request(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<HttpResponse> {
        let idempotent = is_retryable_request(&method, path);
        let mut request = HttpRequest::new(method, format!("{}{}", self.inner.project_url, path))
            .with_query(query)
            .with_headers(self.inner.headers.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.inner.executor.execute(&request, idempotent).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = ApiError::from_response(
            response.status.as_u16(),
            &response.body,
            response.x_request_id(),
        );
        log::debug!(
            "HTTP Error {} {} {}: {}",
            error.code,
            request.method,
            request.url,
            error.message
        );
        Err(Error::api(error))
    }

    async fn post_for_items(&self, path: &str, body: Value) -> Result<Vec<Value>> {
        let response = self.post(path, body).await?;
        items_from_response(&response)
    }

    /// Retrieve one resource by id, `None` if it does not exist
    pub async fn retrieve<T: DeserializeOwned>(&self, id: i64) -> Result<Option<T>> {
        match self.get(&self.path(&format!("/{}", id)), Vec::new()).await {
            Ok(response) => Ok(Some(response.json()?)),
            Err(err) if err.status_code() == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Retrieve resources by id and external id.
    ///
    /// Identifiers are chunked to the retrieve limit and fetched concurrently.
    /// If the request addressed exactly one resource and it does not exist,
    /// an empty collection is returned; otherwise the not-found error lists
    /// every missing identifier.
    pub async fn retrieve_multiple<T: DeserializeOwned>(
        &self,
        identifiers: &IdentifierSequence,
        wrap_ids: bool,
        ignore_unknown_ids: bool,
    ) -> Result<Vec<T>> {
        let wire = identifiers.as_wire(wrap_ids)?;
        let chunks = split_into_chunks(&wire, self.limits.retrieve);
        let path = self.path("/byids");

        let summary = execute_tasks(
            |chunk: &Vec<Value>| {
                let mut body = json!({ "items": chunk });
                if ignore_unknown_ids {
                    body["ignoreUnknownIds"] = Value::Bool(true);
                }
                self.post_for_items(&path, body)
            },
            chunks,
            self.max_workers(),
        )
        .await?;

        match summary.raise_compound_exception_if_failed_tasks(|chunk| chunk.clone()) {
            Ok(summary) => deserialize_items(summary.joined_results(|items| items)),
            Err(err) if err.is_not_found() && identifiers.is_singleton() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Retrieve the resource with the given identifier, `None` if it does not exist
    pub async fn retrieve_by_identifier<T, I>(&self, identifier: I) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        I: Into<crate::identifier::Identifier>,
    {
        let identifiers = IdentifierSequence::single(identifier);
        let mut items = self.retrieve_multiple(&identifiers, true, false).await?;
        Ok(items.pop())
    }

    /// List resources, following cursors until `limit` items were received
    /// or the last page was reached
    pub async fn list<T: DeserializeOwned>(
        &self,
        method: ListMethod,
        filter: Option<&FilterSpec>,
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        self.list_generator(method, filter, limit).try_collect().await
    }

    /// Lazily list resources one item at a time
    pub fn list_generator<T: DeserializeOwned>(
        &self,
        method: ListMethod,
        filter: Option<&FilterSpec>,
        limit: Option<usize>,
    ) -> impl Stream<Item = Result<T>> {
        let request = ListRequest::new(method, filter, limit, None);
        pagination::items(self.clone(), request)
    }

    /// Lazily list resources in chunks of exactly `chunk_size` items,
    /// except possibly the last one
    pub fn list_chunks<T: DeserializeOwned>(
        &self,
        method: ListMethod,
        filter: Option<&FilterSpec>,
        limit: Option<usize>,
        chunk_size: usize,
    ) -> impl Stream<Item = Result<Vec<T>>> {
        let request = ListRequest::new(method, filter, limit, Some(chunk_size));
        pagination::chunks(self.clone(), request)
    }

    /// List every resource by reading `partitions` cursor streams concurrently
    pub async fn list_partitioned<T: DeserializeOwned>(
        &self,
        method: ListMethod,
        filter: Option<&FilterSpec>,
        partitions: usize,
    ) -> Result<Vec<T>> {
        if partitions == 0 {
            return Err(Error::validation(
                "partitions must be at least 1",
                Some("partitions".to_string()),
                Some(partitions.to_string()),
            ));
        }

        let labels: Vec<String> = (1..=partitions)
            .map(|i| format!("{}/{}", i, partitions))
            .collect();
        let summary = execute_tasks(
            |label: &String| {
                let request =
                    ListRequest::new(method, filter, None, None).with_partition(label.as_str());
                pagination::items::<Value>(self.clone(), request).try_collect::<Vec<Value>>()
            },
            labels,
            self.max_workers(),
        )
        .await?;

        let summary =
            summary.raise_compound_exception_if_failed_tasks(|label| vec![json!(label)])?;
        deserialize_items(summary.joined_results(|items| items))
    }

    pub(crate) async fn fetch_page(
        &self,
        request: &ListRequest,
        page_limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<Value>, Option<String>)> {
        let response = match request.method {
            ListMethod::Get => {
                let query = request.query(page_limit, cursor);
                self.get(&self.resource_path, query).await?
            }
            ListMethod::Post => {
                let body = request.body(page_limit, cursor);
                self.post(&self.path("/list"), body).await?
            }
        };

        let json: Value = response.json()?;
        let items = match json.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => return Err(Error::serialization("List response has no items array")),
        };
        let next_cursor = json
            .get("nextCursor")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok((items, next_cursor))
    }

    /// Create resources, chunked to the create limit and sent concurrently.
    ///
    /// The created resources are returned in input order. If any chunk fails,
    /// one error is returned whose outcome tells which items were created,
    /// which were rejected and which are of unknown state.
    pub async fn create_multiple<T: DeserializeOwned>(
        &self,
        items: Vec<WriteItem>,
        limit: Option<usize>,
        extra_body_fields: Option<&Map<String, Value>>,
    ) -> Result<Vec<T>> {
        let wire = items
            .into_iter()
            .map(WriteItem::into_wire)
            .collect::<Result<Vec<Value>>>()?;
        let chunks = split_into_chunks(&wire, limit.unwrap_or(self.limits.create));
        let path = self.resource_path.clone();

        let summary = execute_tasks(
            |chunk: &Vec<Value>| self.post_for_items(&path, items_body(chunk, extra_body_fields)),
            chunks,
            self.max_workers(),
        )
        .await?;

        let summary = summary.raise_compound_exception_if_failed_tasks(|chunk| chunk.clone())?;
        deserialize_items(summary.joined_results(|items| items))
    }

    /// Create a single resource
    pub async fn create<T: DeserializeOwned>(&self, item: WriteItem) -> Result<T> {
        let created = self.create_multiple(vec![item], None, None).await?;
        single(created)
    }

    /// Update resources through `{id|externalId, update}` patch objects.
    ///
    /// Full resources are diffed against their updatable attributes using
    /// `mode`; explicit patches are sent as built.
    pub async fn update_multiple<T: DeserializeOwned>(
        &self,
        items: Vec<UpdateItem>,
        mode: UpdateMode,
    ) -> Result<Vec<T>> {
        let patches = items
            .into_iter()
            .map(|item| item.into_wire(mode))
            .collect::<Result<Vec<Value>>>()?;
        let chunks = split_into_chunks(&patches, self.limits.update);
        let path = self.path("/update");

        let summary = execute_tasks(
            |chunk: &Vec<Value>| self.post_for_items(&path, json!({ "items": chunk })),
            chunks,
            self.max_workers(),
        )
        .await?;

        let summary = summary.raise_compound_exception_if_failed_tasks(|chunk| chunk.clone())?;
        deserialize_items(summary.joined_results(|items| items))
    }

    /// Update a single resource
    pub async fn update<T: DeserializeOwned>(&self, item: UpdateItem, mode: UpdateMode) -> Result<T> {
        let updated = self.update_multiple(vec![item], mode).await?;
        single(updated)
    }

    /// Delete resources by id and external id.
    ///
    /// Missing identifiers from every chunk are reported together in one
    /// not-found error, unless exactly one resource was addressed.
    pub async fn delete_multiple(
        &self,
        identifiers: &IdentifierSequence,
        wrap_ids: bool,
        extra_body_fields: Option<&Map<String, Value>>,
    ) -> Result<()> {
        let wire = identifiers.as_wire(wrap_ids)?;
        let chunks = split_into_chunks(&wire, self.limits.delete);
        let path = self.path("/delete");

        let summary = execute_tasks(
            |chunk: &Vec<Value>| self.post(&path, items_body(chunk, extra_body_fields)),
            chunks,
            self.max_workers(),
        )
        .await?;

        match summary.raise_compound_exception_if_failed_tasks(|chunk| chunk.clone()) {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() && identifiers.is_singleton() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Free-text search combined with a structured filter
    pub async fn search<T: DeserializeOwned>(
        &self,
        search: Value,
        filter: Option<&FilterSpec>,
        limit: usize,
    ) -> Result<Vec<T>> {
        let mut body = json!({ "search": search, "limit": limit });
        if let Some(filter) = filter {
            body["filter"] = filter.to_value();
        }
        let items = self.post_for_items(&self.path("/search"), body).await?;
        deserialize_items(items)
    }

    /// Aggregates over the resources matching `filter`
    pub async fn aggregate<T: DeserializeOwned>(&self, filter: Option<&FilterSpec>) -> Result<Vec<T>> {
        let filter = filter.map(FilterSpec::to_value).unwrap_or_else(|| json!({}));
        let items = self
            .post_for_items(&self.path("/aggregate"), json!({ "filter": filter }))
            .await?;
        deserialize_items(items)
    }

    /// Start an asynchronous job at `{resource}{path}`
    pub async fn run_job(&self, path: &str, body: Value) -> Result<ContextualizationJob> {
        let job_path = self.path(path);
        let response = self.post(&job_path, body).await?;
        ContextualizationJob::from_response(self.clone(), job_path, &response.json()?)
    }
}

/// Whether a request may be replayed with the full retry budget
pub fn is_retryable_request(method: &Method, path: &str) -> bool {
    match *method {
        Method::GET | Method::PUT | Method::DELETE | Method::HEAD => true,
        Method::POST => {
            let last_segment = path
                .split('?')
                .next()
                .unwrap_or_default()
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default();
            RETRYABLE_POST_SUFFIXES.contains(&last_segment)
        }
        _ => false,
    }
}

fn items_body(chunk: &[Value], extra_body_fields: Option<&Map<String, Value>>) -> Value {
    let mut body = Map::new();
    body.insert("items".to_string(), Value::Array(chunk.to_vec()));
    if let Some(extra) = extra_body_fields {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }
    Value::Object(body)
}

fn items_from_response(response: &HttpResponse) -> Result<Vec<Value>> {
    let json: Value = response.json()?;
    match json.get("items") {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Err(Error::serialization("Response has no items array")),
    }
}

fn deserialize_items<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(Error::from))
        .collect()
}

fn single<T>(mut items: Vec<T>) -> Result<T> {
    match (items.pop(), items.is_empty()) {
        (Some(item), true) => Ok(item),
        _ => Err(Error::serialization(
            "Expected exactly one item in the response",
        )),
    }
}
