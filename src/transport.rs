//! HTTP transport: request model, retry policy and the reqwest backed client.
//!
//! Workflows talk to the network only through the [`Transport`] trait so the
//! retry loop and response handling can be driven by a scripted transport in
//! tests. [`TransportContext`] binds a transport to one resolved URL and the
//! retry policy from the configuration.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{TransportError, UpError, UpResult};

/// Lower bound of the delay between two attempts.
pub const RETRY_MIN_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound of the delay between two attempts.
pub const RETRY_MAX_INTERVAL: Duration = Duration::from_secs(5);

/// Transfer state of one file in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    /// Position of the file in the multipart body, unique per part
    pub index: usize,
    /// Base name, for display only
    pub file_name: String,
    pub uploaded: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Share of the file sent so far, 0 to 100. An empty file is complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.uploaded as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

pub type ProgressCallback = Arc<dyn Fn(&UploadProgress) + Send + Sync>;

/// Callback invoked while file parts are streamed, at most once per `interval`.
#[derive(Clone)]
pub struct ProgressHook {
    pub interval: Duration,
    pub callback: ProgressCallback,
}

impl ProgressHook {
    pub fn new<F>(interval: Duration, callback: F) -> Self
    where
        F: Fn(&UploadProgress) + Send + Sync + 'static,
    {
        Self {
            interval,
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for ProgressHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHook")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// multipart/form-data body: every file under the same field name plus
/// plain text fields.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    pub field: String,
    pub files: Vec<PathBuf>,
    pub form: Vec<(String, String)>,
    pub progress: Option<ProgressHook>,
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(Multipart),
}

/// A request description. Bodies are rebuilt from it on every attempt.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub body: Body,
}

/// What came back from the service, whatever its shape.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Set when a status arrived but the body could not be read
    pub error: Option<TransportError>,
    pub elapsed: Duration,
    pub attempts: u32,
}

/// Issue one request and hand back status and body.
pub trait Transport {
    fn send(&self, request: &OutgoingRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport on top of a blocking reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the client: User-Agent, bearer token, timeout and, in debug
    /// mode, verbose connection tracing. No request is sent here.
    pub fn new(config: &Config) -> UpResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.bearer_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| UpError::Client(format!("invalid api key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .connection_verbose(config.debug)
            .build()
            .map_err(|e| UpError::Client(e.to_string()))?;

        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutgoingRequest) -> Result<RawResponse, TransportError> {
        let started = Instant::now();
        let builder = self.client.request(request.method.clone(), &request.url);
        let builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart(multipart) => builder.multipart(build_form(multipart)?),
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let (body, error) = match response.text() {
            Ok(text) => (text, None),
            Err(e) => (String::new(), Some(TransportError::from(e))),
        };

        Ok(RawResponse {
            method: request.method.clone(),
            url: request.url.clone(),
            status,
            body,
            error,
            elapsed: started.elapsed(),
            attempts: 1,
        })
    }
}

fn build_form(multipart: &Multipart) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, value) in &multipart.form {
        form = form.text(name.clone(), value.clone());
    }

    for (index, path) in multipart.files.iter().enumerate() {
        let file_error = |e: io::Error| TransportError::File {
            path: path.clone(),
            message: e.to_string(),
        };
        let file = File::open(path).map_err(file_error)?;
        let total = file.metadata().map_err(file_error)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let part = match &multipart.progress {
            Some(hook) => {
                let progress = UploadProgress {
                    index,
                    file_name: file_name.clone(),
                    uploaded: 0,
                    total,
                };
                let reader = ProgressReader::new(file, progress, hook.clone());
                Part::reader_with_length(reader, total)
            }
            None => Part::reader_with_length(file, total),
        };
        form = form.part(multipart.field.clone(), part.file_name(file_name));
    }

    Ok(form)
}

/// Counts bytes read from a file part and reports them through the hook.
struct ProgressReader<R> {
    inner: R,
    progress: UploadProgress,
    hook: ProgressHook,
    last_report: Option<Instant>,
    done: bool,
}

impl<R: Read> ProgressReader<R> {
    fn new(inner: R, progress: UploadProgress, hook: ProgressHook) -> Self {
        Self {
            inner,
            progress,
            hook,
            last_report: None,
            done: false,
        }
    }

    fn report(&mut self, now: Instant) {
        self.last_report = Some(now);
        (self.hook.callback)(&self.progress);
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.uploaded += n as u64;

        let now = Instant::now();
        let finished = n == 0 || self.progress.uploaded >= self.progress.total;
        if finished {
            if !self.done {
                self.done = true;
                self.report(now);
            }
        } else if self
            .last_report
            .map_or(true, |last| now.duration_since(last) >= self.hook.interval)
        {
            self.report(now);
        }
        Ok(n)
    }
}

/// Capped exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            min_interval: RETRY_MIN_INTERVAL,
            max_interval: RETRY_MAX_INTERVAL,
        }
    }

    pub fn with_backoff(mut self, min_interval: Duration, max_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self.max_interval = max_interval;
        self
    }

    /// Delay before retry number `attempt` (starting at 1).
    ///
    /// The window doubles per attempt up to `max_interval`; the delay is
    /// drawn from its upper half.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.min_interval.as_secs_f64();
        let cap = self.max_interval.as_secs_f64();
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let window = cap.min(base * 2f64.powi(exp));
        let half = window / 2.0;
        if half <= 0.0 || !half.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(half + rand::rng().random_range(0.0..half))
    }
}

/// Joins the endpoint base and a path suffix without doubling the slash.
pub fn resolve_url(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}

/// A transport bound to one resolved URL, retry policy and debug flag.
/// Created fresh for every operation.
pub struct TransportContext<T = HttpTransport> {
    transport: T,
    url: String,
    retry: RetryPolicy,
    debug: bool,
}

impl TransportContext<HttpTransport> {
    /// Prepare the production transport for `endpoint + path`.
    pub fn setup(config: &Config, path: &str) -> UpResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(config, path, transport))
    }
}

impl<T: Transport> TransportContext<T> {
    pub fn with_transport(config: &Config, path: &str, transport: T) -> Self {
        let url = resolve_url(&config.endpoint, path);
        debug!("Prepared transport for {} (retries: {})", url, config.retries);
        Self {
            transport,
            url,
            retry: RetryPolicy::new(config.retries),
            debug: config.debug,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    #[cfg(test)]
    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A request against this context's URL.
    pub fn request(&self, method: Method, body: Body) -> OutgoingRequest {
        OutgoingRequest {
            method,
            url: self.url.clone(),
            body,
        }
    }

    /// Send `request`, retrying transient failures sequentially.
    ///
    /// Performs at most `retries` retries; the last transport error is
    /// returned once they are used up.
    pub fn execute(&self, request: &OutgoingRequest) -> Result<RawResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            match self.transport.send(request) {
                Ok(mut response) => {
                    response.attempts = attempt + 1;
                    trace!("{} {} -> {}", request.method, request.url, response.status);
                    return Ok(response);
                }
                Err(err) if attempt < self.retry.retries && err.is_retryable() => {
                    attempt += 1;
                    if self.debug {
                        debug!(
                            "Retrying endpoint request: {} {} {} (retry {}/{})",
                            request.method, request.url, err, attempt, self.retry.retries
                        );
                    }
                    thread::sleep(self.retry.backoff(attempt));
                }
                Err(err) => return Err(err),
            }
        }
    }
}
