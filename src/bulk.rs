//! Concurrent execution of independent sub-requests.
//!
//! Bulk operations split their input into chunks, run one request per chunk
//! with at most `max_workers` in flight, and collect every outcome into a
//! [`TasksSummary`]. The summary never raises on its own. The caller turns it
//! into either joined results or one compound error covering all chunks.

use crate::error::{BulkOutcome, Error, ErrorKind, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::future::Future;

/// How a finished task is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The request succeeded
    Successful,
    /// The API rejected the request (status below 500)
    Failed,
    /// The request may or may not have taken effect
    Unknown,
}

impl TaskOutcome {
    /// Classify the result of a task.
    ///
    /// This is independent of retry eligibility: a 429 that exhausted its
    /// retries is still a definite rejection.
    pub fn classify<R>(result: &Result<R>) -> Self {
        match result {
            Ok(_) => TaskOutcome::Successful,
            Err(err) => match &err.kind {
                ErrorKind::Api(api) if api.code < 500 => TaskOutcome::Failed,
                _ => TaskOutcome::Unknown,
            },
        }
    }
}

/// Aggregated outcome of a batch of concurrently executed tasks
#[derive(Debug)]
pub struct TasksSummary<T, R> {
    /// Tasks whose request succeeded, in task order
    pub successful_tasks: Vec<T>,
    /// Tasks rejected by the API, in task order
    pub failed_tasks: Vec<T>,
    /// Tasks with an ambiguous outcome, in task order
    pub unknown_tasks: Vec<T>,
    /// Results of the successful tasks, in task order
    pub results: Vec<R>,
    /// Errors of the failed and unknown tasks, in task order
    pub exceptions: Vec<Error>,
}

impl<T, R> TasksSummary<T, R> {
    fn from_outcomes(outcomes: Vec<(T, Result<R>)>) -> Self {
        let mut summary = Self {
            successful_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            unknown_tasks: Vec::new(),
            results: Vec::new(),
            exceptions: Vec::new(),
        };

        for (task, result) in outcomes {
            match TaskOutcome::classify(&result) {
                TaskOutcome::Successful => summary.successful_tasks.push(task),
                TaskOutcome::Failed => summary.failed_tasks.push(task),
                TaskOutcome::Unknown => summary.unknown_tasks.push(task),
            }
            match result {
                Ok(value) => summary.results.push(value),
                Err(err) => summary.exceptions.push(err),
            }
        }

        summary
    }

    /// Whether any task failed or had an unknown outcome
    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    /// Flatten per-task results into one collection, in task order
    pub fn joined_results<U, F, I>(self, unwrap: F) -> Vec<U>
    where
        F: FnMut(R) -> I,
        I: IntoIterator<Item = U>,
    {
        self.results.into_iter().flat_map(unwrap).collect()
    }

    /// Raise one error covering every task if any task did not succeed.
    ///
    /// `unwrap` maps a task to the domain items it carried. The returned
    /// error is the first API error reporting missing or duplicated
    /// identifiers, or the first captured error when there is none. The
    /// `missing` and `duplicated` lists of every captured API error are
    /// merged into it, and the item-level [`BulkOutcome`] is attached.
    pub fn raise_compound_exception_if_failed_tasks<F>(mut self, unwrap: F) -> Result<Self>
    where
        F: Fn(&T) -> Vec<Value>,
    {
        if self.exceptions.is_empty() {
            return Ok(self);
        }

        let mut exceptions = std::mem::take(&mut self.exceptions);
        let mut missing = Vec::new();
        let mut duplicated = Vec::new();
        for api in exceptions.iter().filter_map(Error::api_error) {
            merge_unique(&mut missing, &api.missing);
            merge_unique(&mut duplicated, &api.duplicated);
        }

        let primary = exceptions
            .iter()
            .position(|err| {
                err.api_error()
                    .map_or(false, |api| !api.missing.is_empty() || !api.duplicated.is_empty())
            })
            .unwrap_or(0);
        let error_count = exceptions.len();
        let mut compound = exceptions.swap_remove(primary);
        if let ErrorKind::Api(api) = &mut compound.kind {
            api.missing = missing;
            api.duplicated = duplicated;
        }

        let flatten = |tasks: &[T]| tasks.iter().flat_map(&unwrap).collect::<Vec<Value>>();
        let outcome = BulkOutcome {
            successful: flatten(&self.successful_tasks),
            failed: flatten(&self.failed_tasks),
            unknown: flatten(&self.unknown_tasks),
        };

        log::debug!(
            "Bulk operation finished with {} errors: {} successful, {} failed, {} unknown items",
            error_count,
            outcome.successful.len(),
            outcome.failed.len(),
            outcome.unknown.len()
        );
        Err(compound.with_outcome(outcome))
    }
}

fn merge_unique(target: &mut Vec<Value>, extra: &[Value]) {
    for value in extra {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

/// Run `func` over every task with at most `max_workers` requests in flight.
///
/// `func` borrows its task, so each task is kept exactly once and handed
/// back in the summary. Completion order is irrelevant: outcomes are put
/// back into task order before they are classified. Only an invalid
/// `max_workers` is returned as an error; task failures end up in the summary.
pub async fn execute_tasks<T, R, F, Fut>(
    func: F,
    tasks: Vec<T>,
    max_workers: usize,
) -> Result<TasksSummary<T, R>>
where
    F: Fn(&T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if max_workers < 1 {
        return Err(Error::validation(
            "max_workers must be at least 1",
            Some("max_workers".to_string()),
            Some(max_workers.to_string()),
        ));
    }

    log::debug!(
        "Executing {} tasks with up to {} workers",
        tasks.len(),
        max_workers
    );

    let mut indexed: Vec<(usize, Result<R>)> = stream::iter(tasks.iter().enumerate())
        .map(|(index, task)| {
            let future = func(task);
            async move { (index, future.await) }
        })
        .buffer_unordered(max_workers)
        .collect()
        .await;
    indexed.sort_by_key(|(index, _)| *index);

    let outcomes = tasks
        .into_iter()
        .zip(indexed.into_iter().map(|(_, result)| result))
        .collect();
    Ok(TasksSummary::from_outcomes(outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn api_error(code: u16) -> Error {
        Error::api(ApiError {
            code,
            message: "boom".into(),
            ..Default::default()
        })
    }

    fn not_found(id: i64) -> Error {
        Error::api(ApiError {
            code: 400,
            message: "not found".into(),
            missing: vec![json!({"id": id})],
            ..Default::default()
        })
    }

    fn not_found_unless_two(id: i64) -> Result<i64> {
        if id == 2 {
            return Ok(id);
        }
        Err(not_found(id))
    }

    #[test]
    fn test_classify() {
        assert_eq!(TaskOutcome::classify(&Ok::<_, Error>(1)), TaskOutcome::Successful);
        assert_eq!(TaskOutcome::classify::<()>(&Err(api_error(400))), TaskOutcome::Failed);
        assert_eq!(TaskOutcome::classify::<()>(&Err(api_error(429))), TaskOutcome::Failed);
        assert_eq!(TaskOutcome::classify::<()>(&Err(api_error(500))), TaskOutcome::Unknown);
        assert_eq!(TaskOutcome::classify::<()>(&Err(api_error(503))), TaskOutcome::Unknown);
        assert_eq!(
            TaskOutcome::classify::<()>(&Err(Error::read_timeout())),
            TaskOutcome::Unknown
        );
    }

    #[tokio::test]
    async fn test_rejects_zero_workers() {
        let result = execute_tasks(|x: &i32| std::future::ready(Ok::<_, Error>(*x)), vec![1], 0).await;
        assert!(matches!(result.unwrap_err().kind, ErrorKind::Validation { .. }));
    }

    #[tokio::test]
    async fn test_results_keep_task_order() {
        let tasks: Vec<u64> = vec![30, 10, 20, 0];
        let summary = execute_tasks(
            |delay: &u64| {
                let delay = *delay;
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok::<_, Error>(vec![delay])
                }
            },
            tasks,
            4,
        )
        .await
        .unwrap();
        assert_eq!(summary.successful_tasks, vec![30, 10, 20, 0]);
        assert_eq!(summary.joined_results(|r| r), vec![30, 10, 20, 0]);
    }

    #[tokio::test]
    async fn test_max_workers_bounds_concurrency() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let summary = execute_tasks(
            |_: &usize| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Error>(())
                }
            },
            (0..12).collect(),
            3,
        )
        .await
        .unwrap();
        assert_eq!(summary.results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_compound_error_classifies_items() {
        let chunks = vec![
            vec![json!({"x": 1}), json!({"x": 2})],
            vec![json!({"x": 3})],
            vec![json!({"x": 4})],
            vec![json!({"x": 5})],
        ];
        let summary = execute_tasks(
            |chunk: &Vec<Value>| {
                let result = match chunk[0]["x"].as_i64() {
                    Some(3) => Err(api_error(400)),
                    Some(5) => Err(api_error(503)),
                    _ => Ok(chunk.clone()),
                };
                std::future::ready(result)
            },
            chunks,
            2,
        )
        .await
        .unwrap();

        let err = summary
            .raise_compound_exception_if_failed_tasks(|chunk| chunk.clone())
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        let outcome = err.outcome().unwrap();
        assert_eq!(
            outcome.successful,
            vec![json!({"x": 1}), json!({"x": 2}), json!({"x": 4})]
        );
        assert_eq!(outcome.failed, vec![json!({"x": 3})]);
        assert_eq!(outcome.unknown, vec![json!({"x": 5})]);
    }

    #[tokio::test]
    async fn test_compound_error_merges_missing() {
        let summary = execute_tasks(
            |id: &i64| std::future::ready(not_found_unless_two(*id)),
            vec![1, 2, 3],
            3,
        )
        .await
        .unwrap();

        let err = summary
            .raise_compound_exception_if_failed_tasks(|id| vec![json!({"id": id})])
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.api_error().unwrap().missing,
            vec![json!({"id": 1}), json!({"id": 3})]
        );
    }

    #[tokio::test]
    async fn test_no_exceptions_passes_summary_through() {
        let summary = execute_tasks(|x: &i32| std::future::ready(Ok::<_, Error>(x * 2)), vec![1, 2], 1)
            .await
            .unwrap();
        let summary = summary
            .raise_compound_exception_if_failed_tasks(|x| vec![json!(x)])
            .unwrap();
        assert_eq!(summary.joined_results(|x| [x]), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_compound_error_keeps_missing_after_transport_error() {
        let summary = execute_tasks(
            |id: &i64| {
                let result: Result<()> = match id {
                    1 => Err(Error::read_timeout()),
                    _ => Err(not_found(*id)),
                };
                std::future::ready(result)
            },
            vec![1, 2],
            2,
        )
        .await
        .unwrap();

        let err = summary
            .raise_compound_exception_if_failed_tasks(|id| vec![json!({"id": id})])
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.api_error().unwrap().missing, vec![json!({"id": 2})]);
        let outcome = err.outcome().unwrap();
        assert_eq!(outcome.unknown, vec![json!({"id": 1})]);
        assert_eq!(outcome.failed, vec![json!({"id": 2})]);
    }

    #[tokio::test]
    async fn test_server_error_does_not_absorb_missing() {
        let summary = execute_tasks(
            |id: &i64| {
                let result: Result<()> = match id {
                    1 => Err(api_error(503)),
                    _ => Err(not_found(*id)),
                };
                std::future::ready(result)
            },
            vec![1, 2, 3],
            3,
        )
        .await
        .unwrap();

        let err = summary
            .raise_compound_exception_if_failed_tasks(|id| vec![json!({"id": id})])
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(
            err.api_error().unwrap().missing,
            vec![json!({"id": 2}), json!({"id": 3})]
        );
    }

    #[tokio::test]
    async fn test_first_error_wins_without_missing_identifiers() {
        let summary = execute_tasks(
            |id: &i64| {
                let result: Result<()> = match id {
                    1 => Err(Error::read_timeout()),
                    _ => Err(api_error(400)),
                };
                std::future::ready(result)
            },
            vec![1, 2],
            2,
        )
        .await
        .unwrap();

        let err = summary
            .raise_compound_exception_if_failed_tasks(|id| vec![json!({"id": id})])
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReadTimeout));
        assert!(!err.is_not_found());
    }
}
