// Library root
// -----------
// This crate exposes the upload client as a library. The binary
// (`main.rs`) only parses arguments, sets up logging and prints results.
//
// Module responsibilities:
// - `transport`: request model, retry/backoff policy and the reqwest client.
// - `files`: expands path arguments into the files to upload.
// - `response`: turns the service's reply into a message or an error.
// - `api`: the upload and list workflows built from the above.
// - `ui`: progress bars for running uploads.
// - `cli`, `config`: argument parsing and layered configuration.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod exitcode;
pub mod expire;
pub mod files;
pub mod response;
pub mod transport;
pub mod ui;

pub use config::Config;
pub use error::{TransportError, UpError, UpResult};
