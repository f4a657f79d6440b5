//! Interprets what the upload service sent back.
//!
//! The service answers with a JSON envelope `{code, success, message}`, but
//! proxies and crashing backends may hand back plain text instead. Both shapes
//! go through one rule: success returns the message, anything else becomes an
//! error carrying the best reason available.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TransportError, UpError, UpResult};
use crate::transport::RawResponse;

/// The service's structured reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    #[serde(alias = "Code", alias = "CODE")]
    pub code: i64,
    #[serde(alias = "Success", alias = "SUCCESS")]
    pub success: bool,
    #[serde(alias = "Message", alias = "MESSAGE")]
    pub message: String,
}

/// A response body, decoded or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Parsed(Envelope),
    Unparsed(String),
}

impl Decoded {
    /// A JSON `null` decodes to an empty envelope, which ends as "Unknown error".
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Option<Envelope>>(body) {
            Ok(envelope) => Decoded::Parsed(envelope.unwrap_or_default()),
            Err(_) => Decoded::Unparsed(body.to_string()),
        }
    }

    /// Map either shape to the final outcome. Raw text never counts as success.
    pub fn into_result(self, transport_error: Option<&TransportError>) -> UpResult<String> {
        let (success, message) = match self {
            Decoded::Parsed(envelope) => (envelope.success, envelope.message),
            Decoded::Unparsed(raw) => (false, raw),
        };

        if success {
            return Ok(message);
        }
        if !message.is_empty() {
            return Err(UpError::Service(message));
        }
        match transport_error {
            Some(err) => Err(UpError::Transport(err.clone())),
            None => Err(UpError::UnknownService),
        }
    }
}

/// Turn a raw response into the success message or an error.
///
/// With `debug` set, the request line, timing and raw body are traced.
#[track_caller]
pub fn interpret(response: &RawResponse, debug: bool) -> UpResult<String> {
    let decoded = Decoded::from_body(&response.body);

    if debug {
        let caller = std::panic::Location::caller();
        debug!(
            "{}:{} {} {} -> {} in {:?} after {} attempt(s)",
            caller.file(),
            caller.line(),
            response.method,
            response.url,
            response.status,
            response.elapsed,
            response.attempts
        );
        if let Decoded::Unparsed(raw) = &decoded {
            debug!("Response is not a JSON envelope, raw body: {:?}", raw);
        } else {
            debug!("Response body: {}", response.body);
        }
        if let Some(err) = &response.error {
            debug!("Transport reported: {}", err);
        }
    }

    decoded.into_result(response.error.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use std::time::Duration;

    fn response(body: &str, error: Option<TransportError>) -> RawResponse {
        RawResponse {
            method: Method::POST,
            url: "http://localhost:8080/api/v1/file/".into(),
            status: 200,
            body: body.into(),
            error,
            elapsed: Duration::from_millis(3),
            attempts: 1,
        }
    }

    #[test]
    fn success_envelope_returns_message() {
        let resp = response(r#"{"code":200,"success":true,"message":"ok"}"#, None);
        assert_eq!(interpret(&resp, false).unwrap(), "ok");
    }

    #[test]
    fn failed_envelope_carries_server_message() {
        let resp = response(r#"{"success":false,"message":"quota exceeded"}"#, None);
        let err = interpret(&resp, true).unwrap_err();
        assert!(matches!(&err, UpError::Service(m) if m == "quota exceeded"));
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn plain_text_body_becomes_error_message() {
        let resp = response("Internal Server Error", None);
        let err = interpret(&resp, false).unwrap_err();
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[test]
    fn empty_failure_surfaces_transport_error() {
        let transport = TransportError::Body("connection reset".into());
        let resp = response(r#"{"success":false,"message":""}"#, Some(transport.clone()));
        match interpret(&resp, false).unwrap_err() {
            UpError::Transport(err) => assert_eq!(err, transport),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_failure_without_transport_error_is_unknown() {
        let resp = response(r#"{"success":false,"message":""}"#, None);
        let err = interpret(&resp, false).unwrap_err();
        assert!(matches!(err, UpError::UnknownService));
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn empty_body_is_never_success() {
        let resp = response("", None);
        assert!(matches!(interpret(&resp, false), Err(UpError::UnknownService)));
    }

    #[test]
    fn success_with_empty_message_is_allowed() {
        let resp = response(r#"{"code":200,"success":true}"#, None);
        assert_eq!(interpret(&resp, false).unwrap(), "");
    }

    #[test]
    fn interpreting_twice_gives_same_outcome() {
        for body in [
            r#"{"code":200,"success":true,"message":"ok"}"#,
            r#"{"success":false,"message":"nope"}"#,
            "Bad Gateway",
        ] {
            let resp = response(body, None);
            let first = interpret(&resp, false).map_err(|e| e.to_string());
            let second = interpret(&resp, false).map_err(|e| e.to_string());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn capitalised_keys_decode() {
        let resp = response(r#"{"Code":200,"Success":true,"Message":"ok"}"#, None);
        assert_eq!(interpret(&resp, false).unwrap(), "ok");
    }

    #[test]
    fn null_body_is_unknown_error() {
        let resp = response("null", None);
        assert!(matches!(interpret(&resp, false), Err(UpError::UnknownService)));
    }

    #[test]
    fn wrongly_typed_json_falls_back_to_text() {
        let body = r#"{"success":"yes","message":"ok"}"#;
        assert_eq!(
            Decoded::from_body(body),
            Decoded::Unparsed(body.to_string())
        );
    }
}
