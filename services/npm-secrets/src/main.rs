//! Operator harness for the npm secrets engine.
//!
//! Reads one command per line from stdin, `<operation> <path> [json-body]`,
//! and prints one JSON document per command on stdout. For `renew` and
//! `revoke` the body is the secret returned by an earlier `read creds/...`.

use anyhow::Context;
use npm_secrets::{Backend, BackendError, Config, InMemoryStorage, Operation, Request, Secret};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    rust_common::init_tracing(&config.tracing);

    info!("Starting npm-secrets harness");

    let backend = Backend::from_config(&config, Arc::new(InMemoryStorage::new()))
        .context("building backend")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let output = match parse_command(&line) {
            Ok(None) => continue,
            Ok(Some(request)) => match backend.handle(request).await {
                Ok(Some(response)) => serde_json::to_value(response)?,
                Ok(None) => json!({}),
                Err(e) => error_output(&e),
            },
            Err(e) => error_output(&e),
        };
        stdout.write_all(format!("{output}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("stdin closed, exiting");
    Ok(())
}

fn error_output(err: &BackendError) -> Value {
    warn!(error = %err, "command failed");
    json!({
        "error": err.to_string(),
        "retryable": err.is_retryable(),
    })
}

/// Parse one command line. Blank lines and `#` comments yield `None`.
fn parse_command(line: &str) -> Result<Option<Request>, BackendError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (operation, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let operation: Operation = operation.parse()?;
    let rest = rest.trim_start();
    let (path, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if path.is_empty() {
        return Err(BackendError::MissingField("path"));
    }
    let body = match body.trim() {
        "" => Value::Null,
        body => serde_json::from_str(body)
            .map_err(|e| BackendError::validation(format!("invalid JSON body: {e}")))?,
    };

    let request = Request::new(operation, path);
    let request = match operation {
        Operation::Renew | Operation::Revoke if !body.is_null() => {
            let secret: Secret = serde_json::from_value(body)
                .map_err(|e| BackendError::malformed_secret(e.to_string()))?;
            request.with_secret(secret)
        }
        _ => request.with_data(body),
    };
    Ok(Some(request))
}
