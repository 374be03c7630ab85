//! Exercises `Store` against a mocked Kubernetes API server instead of a
//! real cluster, the same `tower_test::mock` pattern the teacher's
//! controller tests use to fake a `kube::Client`.
use std::collections::BTreeMap;

use http::{Request, Response};
use k8s_openapi::api::core::v1::Secret;
use kube::{client::Body, Client};
use opm_inventory::prelude::{Body as InventoryBody, ModuleMetadata, ReleaseMetadata, Store};
use tower_test::mock;
use uuid::Uuid;

fn mock_client() -> (Client, mock::Handle<Request<Body>, Response<Body>>) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(service, "default"), handle)
}

fn sample_body(uuid: Uuid) -> InventoryBody {
    InventoryBody {
        metadata: ReleaseMetadata::new("blog".into(), "default".into(), uuid, BTreeMap::new()),
        module_metadata: ModuleMetadata {
            name: "blog".into(),
            uuid: None,
            fqn: "example.com/blog@v0".into(),
            version: "v0".into(),
        },
        index: vec![],
        changes: BTreeMap::new(),
    }
}

fn secret_response(name: &str, body: &InventoryBody) -> Response<Body> {
    let secret = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": name,
            "namespace": "default",
            "resourceVersion": "1",
        },
        "data": {
            "inventory.json": base64_encode(&serde_json::to_vec(body).unwrap()),
        },
    });
    Response::builder()
        .status(200)
        .body(Body::from(serde_json::to_vec(&secret).unwrap()))
        .unwrap()
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Write (server-side apply), then a direct-name get, round-trips the same
/// body through the mocked API server.
#[tokio::test]
async fn write_then_get_round_trips() {
    let (client, mut handle) = mock_client();
    let store = Store::new(client, "default");
    let uuid = Uuid::parse_str("11111111-1111-5111-8111-111111111111").unwrap();
    let body = sample_body(uuid);
    let name = format!("opm.blog.{uuid}");

    let server = tokio::spawn({
        let body = body.clone();
        let name = name.clone();
        async move {
            let (req, send) = handle.next_request().await.expect("apply request");
            assert_eq!(req.method(), http::Method::PATCH);
            send.send_response(secret_response(&name, &body));

            let (req, send) = handle.next_request().await.expect("get request");
            assert_eq!(req.method(), http::Method::GET);
            send.send_response(secret_response(&name, &body));
        }
    });

    store.write(&body).await.expect("write");
    let (got, resource_version) = store.get(Some("blog"), &uuid).await.expect("get").expect("present");
    assert_eq!(got.metadata.name, "blog");
    assert_eq!(got.metadata.uuid, uuid);
    assert_eq!(resource_version, "1");
    server.await.unwrap();
}

/// A miss on the conventional name falls back to the label-selector list,
/// and a 404 on delete is treated as success.
#[tokio::test]
async fn get_falls_back_to_label_selector_after_a_named_miss() {
    let (client, mut handle) = mock_client();
    let store = Store::new(client, "default");
    let uuid = Uuid::parse_str("22222222-2222-5222-8222-222222222222").unwrap();
    let body = sample_body(uuid);
    let name = format!("opm.blog.{uuid}");

    let server = tokio::spawn({
        let body = body.clone();
        let name = name.clone();
        async move {
            let (req, send) = handle.next_request().await.expect("named get request");
            assert_eq!(req.method(), http::Method::GET);
            send.send_response(
                Response::builder()
                    .status(404)
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({
                            "kind": "Status",
                            "apiVersion": "v1",
                            "status": "Failure",
                            "reason": "NotFound",
                            "code": 404,
                        }))
                        .unwrap(),
                    ))
                    .unwrap(),
            );

            let (req, send) = handle.next_request().await.expect("label selector list request");
            assert!(req.uri().query().unwrap_or_default().contains("labelSelector"));
            let list = serde_json::json!({
                "apiVersion": "v1",
                "kind": "SecretList",
                "items": [serde_json::from_slice::<serde_json::Value>(
                    &serde_json::to_vec(&serde_json::json!({
                        "apiVersion": "v1",
                        "kind": "Secret",
                        "metadata": {"name": name, "namespace": "default", "resourceVersion": "2"},
                        "data": {"inventory.json": base64_encode(&serde_json::to_vec(&body).unwrap())},
                    }))
                    .unwrap(),
                )
                .unwrap()],
            });
            send.send_response(
                Response::builder()
                    .status(200)
                    .body(Body::from(serde_json::to_vec(&list).unwrap()))
                    .unwrap(),
            );
        }
    });

    let (got, _rv) = store.get(Some("blog"), &uuid).await.expect("get").expect("present");
    assert_eq!(got.metadata.uuid, uuid);
    server.await.unwrap();
}
