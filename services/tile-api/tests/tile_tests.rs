//! End-to-end `/tile` behaviour against a fake survey service.

mod common;

use axum::http::{header, StatusCode};
use common::{body_bytes, body_json, get, test_app, FakeReply, FakeSkyView};
use test_utils::{list_files, temp_test_dir, NO_DATA_BODY};

const PNG_SIGNATURE: &[u8] = &[137, 80, 78, 71, 13, 10, 26, 10];

#[tokio::test]
async fn test_m51_tile_written_to_cache() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    let response = get(&app, "/tile?target=M51&survey=DSS2%20Red&pixels=1024").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()["x-cache"], "fetched");
    assert_eq!(response.headers()["x-cache-key"], "m51-dss2-red");

    let body = body_bytes(response).await;
    assert!(body.starts_with(PNG_SIGNATURE));

    assert_eq!(
        list_files(tmp.path()),
        vec!["m51-dss2-red.fits".to_string(), "m51-dss2-red.png".to_string()]
    );
    let stored = std::fs::read(tmp.path().join("m51-dss2-red.png")).unwrap();
    assert_eq!(stored, body.as_ref());
    assert_eq!(fake.calls(), 1);
    assert_eq!(fake.positions(), vec!["M51".to_string()]);
}

#[tokio::test]
async fn test_coordinates_use_canonical_position() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    let response = get(&app, "/tile?ra=10.5&dec=41.2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache-key"], "10-5-41-2-dss2-red");
    assert_eq!(fake.positions(), vec!["10.5 41.2".to_string()]);
}

#[tokio::test]
async fn test_target_wins_over_coordinates() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    let response = get(&app, "/tile?target=M31&ra=10.5&dec=41.2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fake.positions(), vec!["M31".to_string()]);
}

#[tokio::test]
async fn test_missing_position_is_rejected() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    let response = get(&app, "/tile?survey=DSS").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "InvalidQuery");
    assert!(json["error"].as_str().unwrap().contains("target"));

    assert_eq!(fake.calls(), 0);
    assert!(list_files(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_invalid_numbers_are_rejected() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    for uri in [
        "/tile?target=M51&pixels=32",
        "/tile?target=M51&pixels=9000",
        "/tile?target=M51&width=0",
        "/tile?target=M51&width=-1",
        "/tile?target=M51&width=abc",
        "/tile?ra=10.5",
        "/tile?ra=400&dec=0",
        "/tile?ra=nan&dec=0",
    ] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
    }
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_no_overwrite_reuses_cache() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    let first = get(&app, "/tile?target=M51&overwrite=false").await;
    assert_eq!(first.headers()["x-cache"], "fetched");
    let first_body = body_bytes(first).await;

    let second = get(&app, "/tile?target=M51&overwrite=false").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-cache"], "hit");
    assert_eq!(body_bytes(second).await, first_body);

    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn test_overwrite_always_refetches() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    for _ in 0..2 {
        let response = get(&app, "/tile?target=M51&overwrite=true").await;
        assert_eq!(response.headers()["x-cache"], "fetched");
    }
    // Default is overwrite=true.
    let response = get(&app, "/tile?target=M51").await;
    assert_eq!(response.headers()["x-cache"], "fetched");

    assert_eq!(fake.calls(), 3);
    assert_eq!(list_files(tmp.path()).len(), 2);
}

#[tokio::test]
async fn test_missing_figure_is_rerendered_without_fetch() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Cutout);
    let app = test_app(tmp.path(), fake.clone());

    get(&app, "/tile?target=M51").await;
    std::fs::remove_file(tmp.path().join("m51-dss2-red.png")).unwrap();

    let response = get(&app, "/tile?target=M51&overwrite=false").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache"], "rerendered");
    assert!(body_bytes(response).await.starts_with(PNG_SIGNATURE));
    assert_eq!(fake.calls(), 1);
    assert!(tmp.path().join("m51-dss2-red.png").exists());
}

#[tokio::test]
async fn test_empty_upstream_writes_nothing() {
    let tmp = temp_test_dir();
    let fake = FakeSkyView::new(FakeReply::Body(NO_DATA_BODY));
    let app = test_app(tmp.path(), fake.clone());

    let response = get(&app, "/tile?target=M51&survey=Nonexistent").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UpstreamEmpty");
    assert!(json["error"].as_str().unwrap().contains("No survey data"));

    assert!(list_files(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_upstream_failure_leaves_existing_artifacts() {
    let tmp = temp_test_dir();
    let good = FakeSkyView::new(FakeReply::Cutout);
    get(&test_app(tmp.path(), good), "/tile?target=M51").await;
    let before = std::fs::read(tmp.path().join("m51-dss2-red.png")).unwrap();

    let failing = FakeSkyView::new(FakeReply::Fail("HTTP 503"));
    let app = test_app(tmp.path(), failing);
    let response = get(&app, "/tile?target=M51&overwrite=true").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "UpstreamError");

    let after = std::fs::read(tmp.path().join("m51-dss2-red.png")).unwrap();
    assert_eq!(before, after);
    assert_eq!(list_files(tmp.path()).len(), 2);
}
