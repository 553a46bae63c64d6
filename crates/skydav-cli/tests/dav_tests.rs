use reqwest::{Client, Method, RequestBuilder, StatusCode};
use skydav_cli::{routes, AppState, GatewayConfig, MoveStatus};
use skydav_store::{FailOp, MemoryBackend};
use std::sync::Arc;
use tokio::net::TcpListener;

const USER: &str = "test;tester";
const PASSWORD: &str = "testing";

// Helper to spawn a server on a random port over a shared in-memory store
async fn spawn_server_with(config: GatewayConfig) -> (String, MemoryBackend) {
    let store = MemoryBackend::new();
    let state = Arc::new(AppState::with_memory_backend(config, store.clone()));
    let app = routes::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), store)
}

async fn spawn_server() -> (String, MemoryBackend) {
    let config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        use_memory_store: true,
        ..Default::default()
    };
    spawn_server_with(config).await
}

fn dav(client: &Client, method: &str, url: String) -> RequestBuilder {
    client
        .request(Method::from_bytes(method.as_bytes()).unwrap(), url)
        .basic_auth(USER, Some(PASSWORD))
}

async fn status(builder: RequestBuilder) -> StatusCode {
    builder.send().await.unwrap().status()
}

#[tokio::test]
async fn test_authentication_required() {
    let (base_url, _) = spawn_server().await;
    let client = Client::new();

    let res = client.get(format!("{}/", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers().get("www-authenticate").unwrap(),
        "Basic realm=\"/\""
    );

    let res = client
        .request(Method::OPTIONS, format!("{}/", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("allow").is_some());
}

#[tokio::test]
async fn test_container_lifecycle() {
    let (base_url, _) = spawn_server().await;
    let client = Client::new();

    // 1. Create container
    assert_eq!(status(dav(&client, "MKCOL", format!("{}/photos", base_url))).await, StatusCode::CREATED);
    // 2. Creating it twice is not allowed
    assert_eq!(
        status(dav(&client, "MKCOL", format!("{}/photos", base_url))).await,
        StatusCode::METHOD_NOT_ALLOWED
    );

    // 3. Root listing shows it
    let res = dav(&client, "PROPFIND", format!("{}/", base_url))
        .header("Depth", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
    let body = res.text().await.unwrap();
    assert!(body.contains("<D:href>/photos/</D:href>"));
    assert!(body.contains("<D:collection/>"));

    // 4. Delete it
    assert_eq!(status(dav(&client, "DELETE", format!("{}/photos", base_url))).await, StatusCode::NO_CONTENT);
    assert_eq!(
        status(dav(&client, "PROPFIND", format!("{}/photos", base_url)).header("Depth", "0")).await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_object_lifecycle() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    let url = format!("{}/c/notes/a%20file.txt", base_url);

    // 1. Upload
    let res = dav(&client, "PUT", url.clone()).body("hello").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(store.object_data("c", "notes/a file.txt").unwrap(), "hello");
    assert_eq!(
        store.object_content_type("c", "notes/a file.txt").as_deref(),
        Some("text/plain")
    );

    // 2. Overwrite
    let res = dav(&client, "PUT", url.clone()).body("hello world").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // 3. Download
    let res = dav(&client, "GET", url.clone()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("etag").is_some());
    assert_eq!(res.text().await.unwrap(), "hello world");

    // 4. Metadata only
    let res = dav(&client, "HEAD", url.clone()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-length").unwrap(), "11");

    // 5. The implied directory is listed
    let res = dav(&client, "PROPFIND", format!("{}/c", base_url))
        .header("Depth", "1")
        .send()
        .await
        .unwrap();
    let body = res.text().await.unwrap();
    assert!(body.contains("<D:href>/c/notes/</D:href>"));

    // 6. Delete
    assert_eq!(status(dav(&client, "DELETE", url.clone())).await, StatusCode::NO_CONTENT);
    assert_eq!(status(dav(&client, "GET", url)).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_into_missing_container() {
    let (base_url, _) = spawn_server().await;
    let client = Client::new();

    let res = dav(&client, "PUT", format!("{}/nowhere/x", base_url))
        .body("data")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_mkcol_pseudo_directory() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();

    assert_eq!(status(dav(&client, "MKCOL", format!("{}/c/d", base_url))).await, StatusCode::CREATED);
    assert!(store.object_data("c", "d/").is_some());
    assert_eq!(
        status(dav(&client, "MKCOL", format!("{}/c/d", base_url))).await,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(
        status(dav(&client, "MKCOL", format!("{}/c/missing/e", base_url))).await,
        StatusCode::CONFLICT
    );

    dav(&client, "PUT", format!("{}/c/k", base_url)).body("x").send().await.unwrap();
    assert_eq!(
        status(dav(&client, "MKCOL", format!("{}/c/k", base_url))).await,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(store.object_data("c", "k").unwrap(), "x");
}

#[tokio::test]
async fn test_nothing_is_created_below_an_object() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/f.txt", base_url)).body("hello").send().await.unwrap();

    assert_eq!(
        status(dav(&client, "MKCOL", format!("{}/c/f.txt/sub", base_url))).await,
        StatusCode::CONFLICT
    );
    let res = dav(&client, "PUT", format!("{}/c/f.txt/child", base_url))
        .body("x")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let res = dav(&client, "PUT", format!("{}/c/f.txt/a/b", base_url))
        .body("x")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    assert_eq!(store.object_keys("c"), vec!["f.txt"]);
    let res = dav(&client, "GET", format!("{}/c/f.txt", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn test_put_onto_directory_is_refused() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/c/d", base_url)).send().await.unwrap();

    let res = dav(&client, "PUT", format!("{}/c/d", base_url)).body("x").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(store.object_keys("c"), vec!["d/"]);
}

#[tokio::test]
async fn test_get_collection_index() {
    let (base_url, _) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/report.pdf", base_url)).body("%PDF").send().await.unwrap();

    let res = dav(&client, "GET", format!("{}/c", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("<a href=\"/c/report.pdf\">report.pdf</a>"));
}

#[tokio::test]
async fn test_copy_object_to_new_container() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/a", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/a/x", base_url)).body("payload").send().await.unwrap();

    let res = dav(&client, "COPY", format!("{}/a/x", base_url))
        .header("Destination", format!("{}/b/y", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(store.object_data("b", "y").unwrap(), "payload");
    assert!(store.object_data("a", "x").is_some());
}

#[tokio::test]
async fn test_move_overwrite_rules() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/src", base_url)).body("new").send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/dst", base_url)).body("old").send().await.unwrap();

    let res = dav(&client, "MOVE", format!("{}/c/src", base_url))
        .header("Destination", "/c/dst")
        .header("Overwrite", "F")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(store.object_data("c", "dst").unwrap(), "old");

    let res = dav(&client, "MOVE", format!("{}/c/src", base_url))
        .header("Destination", "/c/dst")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.object_data("c", "dst").unwrap(), "new");
    assert!(store.object_data("c", "src").is_none());
}

#[tokio::test]
async fn test_transfer_across_node_kinds_conflicts() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/c/d", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/x", base_url)).body("payload").send().await.unwrap();

    for method in ["COPY", "MOVE"] {
        let res = dav(&client, method, format!("{}/c/x", base_url))
            .header("Destination", "/c/d")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    let res = dav(&client, "COPY", format!("{}/c/d", base_url))
        .header("Destination", "/c/x")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    assert_eq!(store.object_keys("c"), vec!["d/", "x"]);
    let res = dav(&client, "GET", format!("{}/c/x", base_url)).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "payload");
}

#[tokio::test]
async fn test_move_container_to_existing_container() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/a", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/b", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/a/testfile", base_url)).body("dummy").send().await.unwrap();

    let res = dav(&client, "MOVE", format!("{}/a/", base_url))
        .header("Destination", format!("{}/b/", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.container_names(), vec!["b"]);
    assert_eq!(store.object_data("b", "testfile").unwrap(), "dummy");
}

#[tokio::test]
async fn test_move_pseudo_directory_to_new_location() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/a", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/a/some", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/a/some/testfile", base_url)).body("dummy").send().await.unwrap();

    let res = dav(&client, "MOVE", format!("{}/a/some/", base_url))
        .header("Destination", format!("{}/a/other/", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(store.object_keys("a"), vec!["other/", "other/testfile"]);
}

#[tokio::test]
async fn test_move_container_into_container_keeps_structure() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/a", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/b", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/a/x", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/a/x/y", base_url)).send().await.unwrap();

    let res = dav(&client, "MOVE", format!("{}/a", base_url))
        .header("Destination", format!("{}/b/a", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(store.object_keys("b"), vec!["a/x/", "a/x/y/"]);
    assert_eq!(store.container_names(), vec!["b"]);
}

#[tokio::test]
async fn test_collection_move_status_is_configurable() {
    let config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        use_memory_store: true,
        collection_move_status: MoveStatus::NoContent,
        ..Default::default()
    };
    let (base_url, _) = spawn_server_with(config).await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/a", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/a/d", base_url)).send().await.unwrap();

    let res = dav(&client, "MOVE", format!("{}/a/d", base_url))
        .header("Destination", format!("{}/a/e", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_copy_into_itself_is_forbidden() {
    let (base_url, _) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/a", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/a/d", base_url)).send().await.unwrap();

    let res = dav(&client, "COPY", format!("{}/a/d", base_url))
        .header("Destination", format!("{}/a/d/inner", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_partial_delete_reports_failed_keys() {
    let (base_url, store) = spawn_server().await;
    let client = Client::new();
    dav(&client, "MKCOL", format!("{}/c", base_url)).send().await.unwrap();
    dav(&client, "MKCOL", format!("{}/c/d", base_url)).send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/d/a", base_url)).body("1").send().await.unwrap();
    dav(&client, "PUT", format!("{}/c/d/b", base_url)).body("2").send().await.unwrap();
    store.inject_failure(FailOp::DeleteObject, "c", "d/b");

    let res = dav(&client, "DELETE", format!("{}/c/d", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
    let body = res.text().await.unwrap();
    assert!(body.contains("<D:href>/c/d/b</D:href>"));
    assert!(!body.contains("/c/d/a"));
    assert_eq!(store.object_keys("c"), vec!["d/", "d/b"]);
}

#[tokio::test]
async fn test_locking_is_not_implemented() {
    let (base_url, _) = spawn_server().await;
    let client = Client::new();

    assert_eq!(
        status(dav(&client, "LOCK", format!("{}/c", base_url))).await,
        StatusCode::NOT_IMPLEMENTED
    );
}
