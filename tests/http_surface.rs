// Cdxserve is a web-archive CDX index server.
// Copyright (C) 2024 Cdxserve contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! End-to-end coverage of the HTTP surface (spec §6, §8): ingest,
//! query, alias resolution, and access control, all driven through the
//! real `axum::Router` via `tower::ServiceExt::oneshot` rather than a
//! bound socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use cdxserve::api::{self, AppState};
use cdxserve::config::Config;
use cdxserve::datastore::DataStore;

fn test_state(data_dir: &std::path::Path) -> Arc<AppState> {
    let config = Config {
        host: "127.0.0.1:0".parse().unwrap(),
        data_dir: data_dir.to_path_buf(),
        is_secondary: false,
        accepts_writes: false,
        experimental_access_control: false,
        default_access_deny: false,
        max_query_limit: 1000,
        write_permission_token: None,
    };
    Arc::new(AppState {
        data_store: DataStore::new(data_dir),
        config,
    })
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn ingest_then_exact_query_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let router = api::build_router(test_state(dir.path()));

    let cdx_line = "com,example,)/ 20200101000000 http://example.com/ text/html 200 sha1:abc - - 1234 5678 example.warc.gz\n";
    let ingest_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ingest")
                .body(Body::from(cdx_line))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ingest_response.status(), StatusCode::OK);

    let query_response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/widgets/cdx?url=http://example.com/&matchType=exact&output=json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(query_response.status(), StatusCode::OK);

    let body = body_string(query_response).await;
    let rows: Vec<Vec<String>> = serde_json::from_str(&body).unwrap();
    assert_eq!(rows.len(), 2); // header row + one capture
    assert_eq!(rows[1][0], "com,example,:80:http:/");
}

#[tokio::test]
async fn alias_directive_redirects_an_exact_query() {
    let dir = tempfile::tempdir().unwrap();
    let router = api::build_router(test_state(dir.path()));

    let body = "@alias http://old.example.com/ http://example.com/\n\
                com,example,)/ 20200101000000 http://example.com/ text/html 200 sha1:abc - - 1234 5678 example.warc.gz\n";
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ingest")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let query_response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/widgets/cdx?url=http://old.example.com/&matchType=exact&output=json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let rows: Vec<Vec<String>> = serde_json::from_str(&body_string(query_response).await).unwrap();
    assert_eq!(rows.len(), 2);
    // The alias was requested through its old-domain form; the emitted
    // capture's originalUrl is re-labelled with that request form, not
    // the stored target form it actually resolved to.
    assert_eq!(rows[1][2], "http://old.example.com/");
}

#[tokio::test]
async fn malformed_ingest_line_without_skip_flag_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = api::build_router(test_state(dir.path()));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ingest")
                .body(Body::from("not nearly enough fields\n"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn badlines_skip_reports_counts_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let router = api::build_router(test_state(dir.path()));

    let body = "garbage line\ncom,example,)/ 20200101000000 http://example.com/ text/html 200 sha1:abc - - 1234 5678 example.warc.gz\n";
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ingest?badLines=skip")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(report["ingested"], 1);
    assert_eq!(report["skipped"], 1);
}

#[tokio::test]
async fn access_rule_denies_a_matching_domain() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let router = api::build_router(state);

    let ingest_body = "com,example,)/ 20200101000000 http://example.com/ text/html 200 sha1:abc - - 1234 5678 example.warc.gz\n";
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ingest")
                .body(Body::from(ingest_body))
                .unwrap(),
        )
        .await
        .unwrap();

    let policy_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ap/default/policies")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"staff-only","access_points":["staff"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(policy_response.status(), StatusCode::OK);
    let policy: serde_json::Value = serde_json::from_str(&body_string(policy_response).await).unwrap();
    let policy_id = policy["id"].as_u64().unwrap();

    let rule_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ap/default/rules")
                .header("content-type", "application/json")
                .body(Body::from(format!(
                    r#"{{"surt_prefix":"com,example,","policy_id":{policy_id}}}"#
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rule_response.status(), StatusCode::OK);

    let check_response = router
        .oneshot(
            Request::builder()
                .uri("/widgets/ap/default/check?url=http://example.com/&timestamp=20200101000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let check: serde_json::Value = serde_json::from_str(&body_string(check_response).await).unwrap();
    assert_eq!(check["allowed"], false);
}

#[tokio::test]
async fn captures_sequence_and_delete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let router = api::build_router(test_state(dir.path()));

    let ingest_body = "com,example,)/ 20200101000000 http://example.com/ text/html 200 sha1:abc - - 1234 5678 example.warc.gz\n";
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/ingest")
                .body(Body::from(ingest_body))
                .unwrap(),
        )
        .await
        .unwrap();

    let captures_response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/widgets/captures")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let captures: serde_json::Value = serde_json::from_str(&body_string(captures_response).await).unwrap();
    assert_eq!(captures.as_array().unwrap().len(), 1);

    let sequence_response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/widgets/sequence")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let sequence: serde_json::Value = serde_json::from_str(&body_string(sequence_response).await).unwrap();
    assert!(sequence["sequence_number"].as_u64().unwrap() > 0);

    let delete_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/widgets/delete")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"url":"http://example.com/","timestamp":20200101000000}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete_response.status(), StatusCode::OK);

    let after_delete = router
        .oneshot(
            Request::builder()
                .uri("/widgets/captures")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let captures: serde_json::Value = serde_json::from_str(&body_string(after_delete).await).unwrap();
    assert!(captures.as_array().unwrap().is_empty());
}
