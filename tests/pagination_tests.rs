mod common;

use cognite_sdk::{FilterSpec, ListMethod};
use common::{client, project_path};
use futures::{StreamExt, TryStreamExt};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

fn items(range: std::ops::Range<i64>) -> Vec<Value> {
    range.map(|id| json!({"id": id})).collect()
}

async fn page(
    server: &mut ServerGuard,
    limit: usize,
    cursor: Option<&str>,
    items: Vec<Value>,
    next_cursor: Option<&str>,
) -> Mock {
    server
        .mock("POST", project_path("/assets/list").as_str())
        .match_body(Matcher::Json(json!({
            "filter": {"name": "pump"},
            "limit": limit,
            "cursor": cursor
        })))
        .with_status(200)
        .with_body(json!({"items": items, "nextCursor": next_cursor}).to_string())
        .expect(1)
        .create_async()
        .await
}

fn filter() -> FilterSpec {
    FilterSpec::raw(json!({"name": "pump"})).unwrap()
}

#[tokio::test]
async fn test_list_follows_cursors() {
    let mut server = Server::new_async().await;
    let mocks = vec![
        page(&mut server, 1000, None, items(0..3), Some("c1")).await,
        page(&mut server, 1000, Some("c1"), items(3..6), Some("c2")).await,
        page(&mut server, 1000, Some("c2"), items(6..9), None).await,
    ];

    let assets = client(&server.url()).api("/assets");
    let listed: Vec<Value> = assets
        .list(ListMethod::Post, Some(&filter()), None)
        .await
        .unwrap();
    assert_eq!(listed, items(0..9));
    for mock in &mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_list_chunks_regroups_pages() {
    let mut server = Server::new_async().await;
    let mocks = vec![
        page(&mut server, 5, None, items(0..3), Some("c1")).await,
        page(&mut server, 5, Some("c1"), items(3..6), Some("c2")).await,
        page(&mut server, 5, Some("c2"), items(6..9), None).await,
    ];

    let assets = client(&server.url()).api("/assets");
    let chunks: Vec<Vec<Value>> = assets
        .list_chunks(ListMethod::Post, Some(&filter()), None, 5)
        .try_collect()
        .await
        .unwrap();
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![5, 4]);
    assert_eq!(chunks.concat(), items(0..9));
    for mock in &mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_limit_shrinks_last_page() {
    let mut server = Server::new_async().await;
    let mocks = vec![
        page(&mut server, 5, None, items(0..3), Some("c1")).await,
        page(&mut server, 2, Some("c1"), items(3..5), Some("c2")).await,
    ];

    let assets = client(&server.url()).api("/assets");
    let listed: Vec<Value> = assets
        .list(ListMethod::Post, Some(&filter()), Some(5))
        .await
        .unwrap();
    assert_eq!(listed, items(0..5));
    for mock in &mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_list_generator_is_lazy() {
    let mut server = Server::new_async().await;
    let first = page(&mut server, 1000, None, items(0..3), Some("c1")).await;
    let second = server
        .mock("POST", project_path("/assets/list").as_str())
        .match_body(Matcher::PartialJson(json!({"cursor": "c1"})))
        .expect(0)
        .create_async()
        .await;

    let assets = client(&server.url()).api("/assets");
    let taken: Vec<Value> = assets
        .list_generator(ListMethod::Post, Some(&filter()), None)
        .take(2)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(taken, items(0..2));
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_get_list_sends_query_parameters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", project_path("/timeseries").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "pump".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_status(200)
        .with_body(json!({"items": items(0..2)}).to_string())
        .expect(1)
        .create_async()
        .await;

    let timeseries = client(&server.url()).api("/timeseries");
    let listed: Vec<Value> = timeseries
        .list(ListMethod::Get, Some(&filter()), Some(10))
        .await
        .unwrap();
    assert_eq!(listed, items(0..2));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_partitioned_joins_in_partition_order() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for (partition, range) in [("1/2", 0..2), ("2/2", 2..4)] {
        let mock = server
            .mock("POST", project_path("/assets/list").as_str())
            .match_body(Matcher::Json(json!({
                "filter": {},
                "limit": 1000,
                "cursor": null,
                "partition": partition
            })))
            .with_status(200)
            .with_body(json!({"items": items(range)}).to_string())
            .expect(1)
            .create_async()
            .await;
        mocks.push(mock);
    }

    let assets = client(&server.url()).api("/assets");
    let listed: Vec<Value> = assets
        .list_partitioned(ListMethod::Post, None, 2)
        .await
        .unwrap();
    assert_eq!(listed, items(0..4));
    for mock in &mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_list_error_is_propagated() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", project_path("/assets/list").as_str())
        .with_status(400)
        .with_body(json!({"error": {"code": 400, "message": "Invalid filter"}}).to_string())
        .create_async()
        .await;

    let assets = client(&server.url()).api("/assets");
    let err = assets
        .list::<Value>(ListMethod::Post, Some(&filter()), None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(400));
}
