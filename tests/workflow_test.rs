//! Upload and list workflows driven through a scripted transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use tempfile::TempDir;

use upctl::api::{list_with, upload_with, ListParams, EXPIRE_FIELD, LIST_PATH, UPLOAD_FIELD, UPLOAD_PATH};
use upctl::transport::{
    Body, OutgoingRequest, RawResponse, RetryPolicy, Transport, TransportContext,
};
use upctl::{Config, TransportError, UpError};

/// Replays canned outcomes and records every request it was asked to send.
struct ScriptedTransport {
    outcomes: RefCell<VecDeque<Result<String, TransportError>>>,
    sent: RefCell<Vec<OutgoingRequest>>,
}

impl ScriptedTransport {
    fn new(outcomes: Vec<Result<&str, TransportError>>) -> Self {
        Self {
            outcomes: RefCell::new(
                outcomes
                    .into_iter()
                    .map(|o| o.map(str::to_string))
                    .collect(),
            ),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<OutgoingRequest> {
        self.sent.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &OutgoingRequest) -> Result<RawResponse, TransportError> {
        self.sent.borrow_mut().push(request.clone());
        let body = self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("connection refused".into())))?;
        Ok(RawResponse {
            method: request.method.clone(),
            url: request.url.clone(),
            status: 200,
            body,
            error: None,
            elapsed: Duration::ZERO,
            attempts: 1,
        })
    }
}

fn context(
    path: &str,
    retries: u32,
    transport: ScriptedTransport,
) -> TransportContext<ScriptedTransport> {
    let config = Config {
        endpoint: "http://up.example.com/api/v1".into(),
        retries,
        ..Config::default()
    };
    TransportContext::with_transport(&config, path, transport)
        .with_retry_policy(RetryPolicy::new(retries).with_backoff(Duration::ZERO, Duration::ZERO))
}

fn upload_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.txt"), "first file").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested/two.txt"), "second file").unwrap();
    dir
}

const OK_BODY: &str = r#"{"code":200,"success":true,"message":"uploaded 2 files"}"#;

#[test]
fn given_directory_with_two_files_when_upload_then_one_post_with_two_file_fields() {
    let dir = upload_dir();
    let ctx = context(UPLOAD_PATH, 3, ScriptedTransport::new(vec![Ok(OK_BODY)]));

    let message = upload_with(&ctx, "1h", &[dir.path().to_path_buf()], None).unwrap();
    assert_eq!(message, "uploaded 2 files");

    let sent = ctx.transport().sent();
    assert_eq!(sent.len(), 1);
    let request = &sent[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, "http://up.example.com/api/v1/file/");

    let Body::Multipart(multipart) = &request.body else {
        panic!("expected multipart body, got {:?}", request.body);
    };
    assert_eq!(multipart.field, UPLOAD_FIELD);
    assert_eq!(multipart.files.len(), 2);
    assert!(multipart.files.iter().all(|p| p.is_absolute()));
    assert_eq!(
        multipart.form,
        vec![(EXPIRE_FIELD.to_string(), "1h".to_string())]
    );
}

#[test]
fn given_missing_path_when_upload_then_no_request_is_sent() {
    let dir = upload_dir();
    let ctx = context(UPLOAD_PATH, 3, ScriptedTransport::new(vec![Ok(OK_BODY)]));
    let args = vec![dir.path().join("missing.txt"), dir.path().to_path_buf()];

    let err = upload_with(&ctx, "", &args, None).unwrap_err();
    assert!(matches!(err, UpError::NotFound { .. }));
    assert!(ctx.transport().sent().is_empty());
}

#[test]
fn given_invalid_expire_when_upload_then_no_request_is_sent() {
    let dir = upload_dir();
    let ctx = context(UPLOAD_PATH, 3, ScriptedTransport::new(vec![Ok(OK_BODY)]));

    let err = upload_with(&ctx, "next week", &[dir.path().to_path_buf()], None).unwrap_err();
    assert!(matches!(err, UpError::InvalidExpire { .. }));
    assert!(ctx.transport().sent().is_empty());
}

#[test]
fn given_transient_failures_when_upload_then_retries_and_succeeds() {
    let dir = upload_dir();
    let refused = || Err(TransportError::Connect("connection refused".into()));
    let ctx = context(
        UPLOAD_PATH,
        2,
        ScriptedTransport::new(vec![refused(), refused(), Ok(OK_BODY)]),
    );

    let message = upload_with(&ctx, "asap", &[dir.path().to_path_buf()], None).unwrap();
    assert_eq!(message, "uploaded 2 files");
    assert_eq!(ctx.transport().sent().len(), 3);
}

#[test]
fn given_transport_always_failing_when_upload_then_final_error_surfaces() {
    let dir = upload_dir();
    let ctx = context(UPLOAD_PATH, 2, ScriptedTransport::new(vec![]));

    let err = upload_with(&ctx, "", &[dir.path().to_path_buf()], None).unwrap_err();
    match err {
        UpError::Transport(TransportError::Connect(msg)) => assert_eq!(msg, "connection refused"),
        other => panic!("unexpected error: {other}"),
    }
    // one attempt plus two retries
    assert_eq!(ctx.transport().sent().len(), 3);
}

#[test]
fn given_service_rejection_when_upload_then_message_is_the_error() {
    let dir = upload_dir();
    let ctx = context(
        UPLOAD_PATH,
        0,
        ScriptedTransport::new(vec![Ok(r#"{"code":507,"success":false,"message":"quota exceeded"}"#)]),
    );

    let err = upload_with(&ctx, "1d", &[dir.path().join("one.txt")], None).unwrap_err();
    assert_eq!(err.to_string(), "quota exceeded");
}

#[test]
fn given_tenant_when_list_then_json_get_with_apicontext() {
    let ctx = context(
        LIST_PATH,
        0,
        ScriptedTransport::new(vec![Ok(r#"{"code":200,"success":true,"message":"3 uploads"}"#)]),
    );

    let message = list_with(&ctx, "team-a").unwrap();
    assert_eq!(message, "3 uploads");

    let sent = ctx.transport().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::GET);
    assert_eq!(sent[0].url, "http://up.example.com/api/v1/list/");
    let Body::Json(value) = &sent[0].body else {
        panic!("expected json body, got {:?}", sent[0].body);
    };
    let params: ListParams = serde_json::from_value(value.clone()).unwrap();
    assert_eq!(params.apicontext, "team-a");
}

#[test]
fn given_plain_text_reply_when_list_then_text_is_the_error() {
    let ctx = context(
        LIST_PATH,
        0,
        ScriptedTransport::new(vec![Ok("502 Bad Gateway")]),
    );

    let err = list_with(&ctx, "team-a").unwrap_err();
    assert_eq!(err.to_string(), "502 Bad Gateway");
}

#[test]
fn given_same_file_twice_when_upload_then_attached_twice() {
    let dir = upload_dir();
    let file: PathBuf = dir.path().join("one.txt");
    let ctx = context(UPLOAD_PATH, 0, ScriptedTransport::new(vec![Ok(OK_BODY)]));

    upload_with(&ctx, "", &[file.clone(), file], None).unwrap();

    let sent = ctx.transport().sent();
    let Body::Multipart(multipart) = &sent[0].body else {
        panic!("expected multipart body");
    };
    assert_eq!(multipart.files.len(), 2);
    assert_eq!(multipart.files[0], multipart.files[1]);
}

#[cfg(unix)]
#[test]
fn given_unreadable_subdirectory_when_upload_then_no_request_is_sent() {
    use std::os::unix::fs::PermissionsExt;

    let dir = upload_dir();
    let locked = dir.path().join("zz-locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // root ignores directory permissions
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let ctx = context(UPLOAD_PATH, 3, ScriptedTransport::new(vec![Ok(OK_BODY)]));
    let result = upload_with(&ctx, "1h", &[dir.path().to_path_buf()], None);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(UpError::Walk { .. })), "{result:?}");
    assert!(ctx.transport().sent().is_empty());
}
