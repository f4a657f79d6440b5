// API workflows: upload files and list uploads.
// Each call prepares a fresh transport context, sends exactly one logical
// request (retries aside) and hands the reply to the response interpreter.

use std::path::PathBuf;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::UpResult;
use crate::expire;
use crate::files::gather_files;
use crate::response::interpret;
use crate::transport::{Body, Multipart, ProgressHook, Transport, TransportContext};
use crate::ui::ProgressReporter;

pub const UPLOAD_PATH: &str = "/file/";
pub const LIST_PATH: &str = "/list/";

/// Form field every file is attached under.
pub const UPLOAD_FIELD: &str = "upload[]";
pub const EXPIRE_FIELD: &str = "expire";

/// JSON body of a list query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub apicontext: String,
}

/// Upload every file named by `args` and return the service's message.
///
/// Progress bars are drawn on stderr while the request body is streamed.
pub fn upload(config: &Config, args: &[PathBuf]) -> UpResult<String> {
    let ctx = TransportContext::setup(config, UPLOAD_PATH)?;
    let reporter = ProgressReporter::new();
    let result = upload_with(&ctx, &config.expire, args, Some(reporter.hook()));
    reporter.finish();
    result
}

/// Upload through an already prepared context.
///
/// The expire directive and file list are validated before anything is sent.
pub fn upload_with<T: Transport>(
    ctx: &TransportContext<T>,
    expire: &str,
    args: &[PathBuf],
    progress: Option<ProgressHook>,
) -> UpResult<String> {
    let expire = expire::form_value(expire)?;
    let files = gather_files(args)?;
    info!("Uploading {} file(s) to {}", files.len(), ctx.url());

    let body = Body::Multipart(Multipart {
        field: UPLOAD_FIELD.to_string(),
        files,
        form: vec![(EXPIRE_FIELD.to_string(), expire)],
        progress,
    });
    let request = ctx.request(Method::POST, body);
    let response = ctx.execute(&request)?;

    interpret(&response, ctx.debug())
}

/// List uploads visible to the tenant `apicontext`.
pub fn list(config: &Config, apicontext: &str) -> UpResult<String> {
    let ctx = TransportContext::setup(config, LIST_PATH)?;
    list_with(&ctx, apicontext)
}

pub fn list_with<T: Transport>(ctx: &TransportContext<T>, apicontext: &str) -> UpResult<String> {
    let params = ListParams {
        apicontext: apicontext.to_string(),
    };
    debug!("Listing uploads for context {:?}", params.apicontext);

    let request = ctx.request(Method::GET, Body::Json(serde_json::to_value(&params)?));
    let response = ctx.execute(&request)?;

    interpret(&response, ctx.debug())
}
