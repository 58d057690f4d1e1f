use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use storefront_cache::CacheBackend;
use storefront_server::{AppConfig, AppState, build_app};
use storefront_storage::{InMemoryRecordStore, ProductKey, ProductRecordSet};
use tokio::task::JoinHandle;

const SECRET: &str = "Squirrel";

fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.access_token_secret = SECRET.into();
    cfg
}

fn seeded_store() -> Arc<InMemoryRecordStore> {
    let store = InMemoryRecordStore::new();
    store.insert(
        ProductKey::new("beanies").unwrap(),
        ProductRecordSet::new(vec![
            json!({"id": "0a1b2c", "type": "beanies", "name": "HEMREV", "price": 12, "manufacturer": "hennex"}),
            json!({"id": "3d4e5f", "type": "beanies", "name": "REVUP", "price": 51, "manufacturer": "abiplos"}),
        ]),
    );
    Arc::new(store)
}

async fn start_server(
    store: Arc<InMemoryRecordStore>,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let cfg = config();
    let state = AppState::new(&cfg, CacheBackend::new_local(), store);
    let app = build_app(state, &cfg);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn product_request(
    client: &reqwest::Client,
    base: &str,
    token: Option<&str>,
    version: &str,
    product: &str,
) -> reqwest::RequestBuilder {
    let mut req = client
        .get(format!("{base}/"))
        .header("X-VERSION", version)
        .header("X-PRODUCT", product);
    if let Some(token) = token {
        req = req.header("X-WEB-TOKEN", token);
    }
    req
}

#[tokio::test]
async fn beanies_second_request_is_served_from_cache() {
    let store = seeded_store();
    let (base, shutdown_tx, handle) = start_server(store.clone()).await;
    let client = reqwest::Client::new();

    let first = product_request(&client, &base, Some(SECRET), "v2", "beanies")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);
    assert!(
        first.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    assert!(first.headers().contains_key("x-request-id"));
    let first_body: Value = first.json().await.unwrap();
    assert_eq!(first_body.as_array().unwrap().len(), 2);
    assert_eq!(first_body[0]["name"], "HEMREV");

    // Let the detached cache write land
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = product_request(&client, &base, Some(SECRET), "v2", "beanies")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);
    let second_body: Value = second.json().await.unwrap();

    assert_eq!(first_body, second_body);
    assert_eq!(store.query_count(), 1);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn credential_failures() {
    let store = seeded_store();
    let (base, shutdown_tx, handle) = start_server(store.clone()).await;
    let client = reqwest::Client::new();

    // Missing credential wins over every other header problem
    let resp = product_request(&client, &base, None, "v9", "")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(
        resp.text().await.unwrap(),
        "Proper authorization credentials were not provided."
    );

    for wrong in ["squirrel", "SQUIRREL", "Squirrel1", "nope"] {
        let resp = product_request(&client, &base, Some(wrong), "v2", "beanies")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403, "credential {wrong:?}");
        assert_eq!(resp.text().await.unwrap(), "Invalid authentication credentials.");
    }

    assert_eq!(store.query_count(), 0);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn unknown_product_is_404_naming_the_key() {
    let (base, shutdown_tx, handle) = start_server(seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = product_request(&client, &base, Some(SECRET), "v2", "tophats")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(
        resp.text().await.unwrap(),
        "The requested product tophats does not exist."
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn version_and_product_headers_are_required() {
    let store = seeded_store();
    let (base, shutdown_tx, handle) = start_server(store.clone()).await;
    let client = reqwest::Client::new();

    let resp = product_request(&client, &base, Some(SECRET), "v1", "beanies")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Unsupported API version.");

    let resp = client
        .get(format!("{base}/"))
        .header("X-WEB-TOKEN", SECRET)
        .header("X-PRODUCT", "beanies")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = product_request(&client, &base, Some(SECRET), "v2", "")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "A product must be specified.");

    assert_eq!(store.query_count(), 0);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn store_failure_is_500_and_not_ready() {
    let store = seeded_store();
    store.set_unavailable(true);
    let (base, shutdown_tx, handle) = start_server(store.clone()).await;
    let client = reqwest::Client::new();

    let resp = product_request(&client, &base, Some(SECRET), "v2", "beanies")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.text().await.unwrap(), "Failed to load product data.");

    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn health_endpoints_skip_the_gate() {
    let (base, shutdown_tx, handle) = start_server(seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["cache_mode"], "local");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
