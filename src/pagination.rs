//! Cursor-following list streams.
//!
//! A list call is a sequence of round trips: each page request carries the
//! cursor of the previous response, and the sequence ends when the server
//! returns no cursor or the requested number of items has been received.
//! Pages are exposed lazily as [`Stream`]s, either one item at a time or
//! regrouped into fixed-size chunks.

use crate::api_client::ApiClient;
use crate::error::{Error, Result};
use crate::resource::FilterSpec;
use crate::types::ListMethod;
use crate::utils::query_value;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Parameters of one list call
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    /// How the list endpoint is addressed
    pub method: ListMethod,
    /// Filter sent with every page
    pub filter: Map<String, Value>,
    /// Total number of items to fetch, `None` for all
    pub limit: Option<usize>,
    /// Size of the chunks handed to the caller
    pub chunk_size: Option<usize>,
    /// Partition label in `"i/n"` form
    pub partition: Option<String>,
}

impl ListRequest {
    /// Create a list request
    pub fn new(
        method: ListMethod,
        filter: Option<&FilterSpec>,
        limit: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Self {
        Self {
            method,
            filter: filter.map(|f| f.as_map().clone()).unwrap_or_default(),
            limit,
            chunk_size,
            partition: None,
        }
    }

    /// Restrict the request to one cursor partition
    pub fn with_partition<S: Into<String>>(mut self, partition: S) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Number of items to ask for in the next page
    pub fn page_limit(&self, list_limit: usize, fetched: usize) -> usize {
        let page = match self.chunk_size {
            Some(chunk_size) => chunk_size.min(list_limit),
            None => list_limit,
        };
        match self.limit {
            Some(limit) => page.min(limit.saturating_sub(fetched)),
            None => page,
        }
    }

    /// Query parameters of a `GET` page request
    pub fn query(&self, page_limit: usize, cursor: Option<&str>) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .filter
            .iter()
            .map(|(key, value)| (key.clone(), query_value(value)))
            .collect();
        query.push(("limit".to_string(), page_limit.to_string()));
        if let Some(cursor) = cursor {
            query.push(("cursor".to_string(), cursor.to_string()));
        }
        if let Some(partition) = &self.partition {
            query.push(("partition".to_string(), partition.clone()));
        }
        query
    }

    /// JSON body of a `POST .../list` page request
    pub fn body(&self, page_limit: usize, cursor: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert("filter".to_string(), Value::Object(self.filter.clone()));
        body.insert("limit".to_string(), Value::from(page_limit));
        body.insert(
            "cursor".to_string(),
            cursor.map_or(Value::Null, |c| Value::String(c.to_string())),
        );
        if let Some(partition) = &self.partition {
            body.insert("partition".to_string(), Value::String(partition.clone()));
        }
        Value::Object(body)
    }
}

struct PageState {
    api: ApiClient,
    request: ListRequest,
    cursor: Option<String>,
    fetched: usize,
    done: bool,
}

/// Raw pages, in server order
pub(crate) fn pages(api: ApiClient, request: ListRequest) -> impl Stream<Item = Result<Vec<Value>>> {
    let state = PageState {
        api,
        request,
        cursor: None,
        fetched: 0,
        done: false,
    };

    stream::try_unfold(state, |mut state| async move {
        if state.done {
            return Ok::<_, Error>(None);
        }
        let page_limit = state
            .request
            .page_limit(state.api.limits().list, state.fetched);
        if page_limit == 0 {
            return Ok(None);
        }

        let (mut items, next_cursor) = state
            .api
            .fetch_page(&state.request, page_limit, state.cursor.as_deref())
            .await?;
        items.truncate(page_limit);
        state.fetched += items.len();
        log::debug!(
            "Fetched page of {} items from {} ({} total)",
            items.len(),
            state.api.resource_path(),
            state.fetched
        );

        let limit_reached = state.request.limit.map_or(false, |limit| state.fetched >= limit);
        state.done = next_cursor.is_none() || limit_reached;
        state.cursor = next_cursor;
        Ok(Some((items, state)))
    })
}

/// Items one at a time
pub(crate) fn items<T: DeserializeOwned>(
    api: ApiClient,
    request: ListRequest,
) -> impl Stream<Item = Result<T>> {
    pages(api, request)
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Value, Error>)))
        .try_flatten()
        .map(|item| item.and_then(|value| serde_json::from_value(value).map_err(Error::from)))
}

/// Items regrouped into chunks of `chunk_size`.
///
/// Pages are buffered until a full chunk is available; whatever is left
/// when the pages run out is yielded as a final, shorter chunk.
pub(crate) fn chunks<T: DeserializeOwned>(
    api: ApiClient,
    request: ListRequest,
) -> impl Stream<Item = Result<Vec<T>>> {
    let chunk_size = request.chunk_size.unwrap_or(api.limits().list);
    let pages = Box::pin(pages(api, request));

    stream::try_unfold(
        (pages, Vec::<Value>::new(), false),
        move |(mut pages, mut buffer, mut exhausted)| async move {
            if chunk_size == 0 {
                return Err(Error::validation(
                    "chunk_size must be at least 1",
                    Some("chunk_size".to_string()),
                    Some(chunk_size.to_string()),
                ));
            }
            loop {
                if buffer.len() >= chunk_size {
                    let rest = buffer.split_off(chunk_size);
                    let chunk = std::mem::replace(&mut buffer, rest);
                    return Ok(Some((chunk, (pages, buffer, exhausted))));
                }
                if exhausted {
                    if buffer.is_empty() {
                        return Ok(None);
                    }
                    let chunk = std::mem::take(&mut buffer);
                    return Ok(Some((chunk, (pages, buffer, exhausted))));
                }
                match pages.try_next().await? {
                    Some(page) => buffer.extend(page),
                    None => exhausted = true,
                }
            }
        },
    )
    .map(|chunk| {
        chunk.and_then(|values| {
            values
                .into_iter()
                .map(|value| serde_json::from_value(value).map_err(Error::from))
                .collect()
        })
    })
}
