use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use http::{Response as HttpResponse, StatusCode};
use skypost::blob::{BlobStore, UploadError, XrpcBlobStore};
use skypost::publish::{PublishError, create_post};
use skypost::record::assemble;
use skypost_common::XrpcEndpoint;
use skypost_common::http_client::HttpClient;
use skypost_common::types::MimeType;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockClient {
    queue: Arc<Mutex<VecDeque<http::Response<Vec<u8>>>>>,
    log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
}

impl MockClient {
    async fn push(&self, status: StatusCode, body: &str) {
        self.queue.lock().await.push_back(
            HttpResponse::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(body.as_bytes().to_vec())
                .unwrap(),
        );
    }
}

impl HttpClient for MockClient {
    type Error = std::convert::Infallible;
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let log = self.log.clone();
        let queue = self.queue.clone();
        async move {
            log.lock().await.push(request);
            Ok(queue.lock().await.pop_front().expect("no queued response"))
        }
    }
}

fn pds() -> XrpcEndpoint {
    XrpcEndpoint::parse("https://pds.example.com")
        .unwrap()
        .with_access_jwt("access-token")
}

#[tokio::test]
async fn upload_blob_posts_raw_bytes_with_auth() {
    let client = MockClient::default();
    client
        .push(
            StatusCode::OK,
            r#"{"blob":{"$type":"blob","ref":{"$link":"bafkreiabc"},"mimeType":"image/png","size":3}}"#,
        )
        .await;

    let store = XrpcBlobStore::new(client.clone(), pds());
    let blob = store
        .upload_blob(
            Bytes::from_static(&[1, 2, 3]),
            MimeType::new_static(MimeType::PNG),
        )
        .await
        .unwrap();
    assert_eq!(blob.r#ref.as_str(), "bafkreiabc");
    assert_eq!(blob.mime_type.as_str(), "image/png");
    assert_eq!(blob.size, 3);

    let log = client.log.lock().await;
    assert_eq!(log.len(), 1);
    let req = &log[0];
    assert_eq!(req.method(), http::Method::POST);
    assert_eq!(
        req.uri().to_string(),
        "https://pds.example.com/xrpc/com.atproto.repo.uploadBlob"
    );
    assert_eq!(req.headers()[http::header::CONTENT_TYPE], "image/png");
    assert_eq!(
        req.headers()[http::header::AUTHORIZATION],
        "Bearer access-token"
    );
    assert_eq!(req.body(), &vec![1, 2, 3]);
}

#[tokio::test]
async fn upload_blob_surfaces_rejections_and_bad_bodies() {
    let client = MockClient::default();
    client
        .push(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"AuthMissing","message":"Authentication Required"}"#,
        )
        .await;
    client.push(StatusCode::OK, r#"{"cid":"bafkreiabc"}"#).await;

    let store = XrpcBlobStore::new(client.clone(), pds());
    let png = MimeType::new_static(MimeType::PNG);

    match store.upload_blob(Bytes::new(), png.clone()).await {
        Err(UploadError::Http(e)) => {
            assert_eq!(e.status, StatusCode::UNAUTHORIZED);
            assert_eq!(e.xrpc_error().as_deref(), Some("AuthMissing"));
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
    assert!(matches!(
        store.upload_blob(Bytes::new(), png).await,
        Err(UploadError::Malformed(_))
    ));
}

#[tokio::test]
async fn create_post_sends_typed_record() {
    let client = MockClient::default();
    client
        .push(
            StatusCode::OK,
            r#"{"uri":"at://did:plc:abc/app.bsky.feed.post/3k2a","cid":"bafyreiabc"}"#,
        )
        .await;

    let record = assemble("hello", vec!["en".into()], vec![], vec![], vec![], vec![]).unwrap();
    let created = create_post(&client, &pds(), "did:plc:abc", &record)
        .await
        .unwrap();
    assert_eq!(created.uri, "at://did:plc:abc/app.bsky.feed.post/3k2a");
    assert_eq!(created.cid, "bafyreiabc");

    let log = client.log.lock().await;
    let req = &log[0];
    assert_eq!(
        req.uri().to_string(),
        "https://pds.example.com/xrpc/com.atproto.repo.createRecord"
    );
    assert_eq!(req.headers()[http::header::CONTENT_TYPE], "application/json");
    let body: serde_json::Value = serde_json::from_slice(req.body()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "repo": "did:plc:abc",
            "collection": "app.bsky.feed.post",
            "record": {
                "$type": "app.bsky.feed.post",
                "text": "hello",
                "createdAt": record.created_at.as_str(),
                "langs": ["en"]
            }
        })
    );
}

#[tokio::test]
async fn create_post_reports_server_error() {
    let client = MockClient::default();
    client
        .push(
            StatusCode::BAD_REQUEST,
            r#"{"error":"InvalidRecord","message":"Record/text must not be longer than 300 graphemes"}"#,
        )
        .await;

    let record = assemble("x", vec![], vec![], vec![], vec![], vec![]).unwrap();
    let err = create_post(&client, &pds(), "did:plc:abc", &record)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Rejected(_)));
    assert_eq!(err.xrpc_error().as_deref(), Some("InvalidRecord"));
    assert_eq!(
        err.xrpc_message().as_deref(),
        Some("Record/text must not be longer than 300 graphemes")
    );
    assert!(err.to_string().contains("InvalidRecord"), "{err}");
}
