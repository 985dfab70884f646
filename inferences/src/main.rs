//! Reads one JSON request on stdin and writes one JSON document on stdout.
//!
//! ```text
//! echo '{"input": {"age": 63, "sex": 1}}' | cardio-predict --model models/model.onnx
//! ```
//!
//! The artifact path comes from `--model`, then `MODEL_PATH`, then the default
//! location. Logs go to stderr. Unrecognised arguments produce an error
//! document and exit status 2.

mod types;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};
use serde_json::Value;

use cardio_backend::{config, get_gateway, pipeline, ErrorBody, ModelGateway};
use types::Document;

const USAGE_EXIT: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "cardio-predict", version)]
#[command(about = "Score one JSON request from stdin with the cardiac-risk model", long_about = None)]
struct Args {
    /// Path to the ONNX artifact
    #[arg(long, env = "MODEL_PATH", default_value = config::DEFAULT_MODEL_PATH)]
    model: PathBuf,
}

fn usage_error(err: &clap::Error) -> Document {
    Document::Error(ErrorBody::new("Invalid arguments").with_details(err.to_string().trim_end()))
}

fn respond(gateway: &ModelGateway, raw: &str) -> Document {
    if raw.trim().is_empty() {
        return Document::error("No input received");
    }

    let body: Value = match serde_json::from_str(raw) {
        Ok(body) => body,
        Err(e) => {
            return Document::Error(
                ErrorBody::new("Invalid JSON input").with_details(e.to_string()),
            )
        }
    };

    pipeline::predict_json(gateway, body).into()
}

fn write_document(document: &Document) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, document)?;
    stdout.flush()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            error!("Invalid arguments: {}", e.kind());
            if let Err(e) = write_document(&usage_error(&e)) {
                error!("Could not write response: {}", e);
            }
            return ExitCode::from(USAGE_EXIT);
        }
    };
    let model_path = args.model;
    debug!("Using model {}", model_path.display());

    let mut raw = String::new();
    let document = match io::stdin().read_to_string(&mut raw) {
        Ok(_) => respond(&get_gateway(&model_path), &raw),
        Err(e) => Document::Error(ErrorBody::new("No input received").with_details(e.to_string())),
    };
    if document.is_error() {
        debug!("Request failed: {:?}", document);
    }

    match write_document(&document) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Could not write response: {}", e);
            ExitCode::FAILURE
        }
    }
}
