//! Request command handler

use crate::cli::RequestArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use crate::session::CliSession;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use waypoint_client::http::parse_method;
use waypoint_client::{ApiClient, ClientConfig, RequestConfig, RetryPolicy};

/// Handle the request command
pub async fn handle_request(
    args: RequestArgs,
    config: &Config,
    output: &mut OutputWriter,
) -> Result<()> {
    let method = parse_method(&args.method)
        .ok_or_else(|| Error::invalid_args(format!("Unsupported HTTP method '{}'", args.method)))?;
    let body = args.data.as_deref().map(parse_body).transpose()?;
    let request_config = request_config(&args)?;
    let client_config = client_config(&args, config)?;

    let mut builder = ApiClient::builder(client_config.clone());
    if !args.no_auth {
        let refresh_client =
            ApiClient::builder(client_config.with_retry(RetryPolicy::disabled())).build()?;
        let session = CliSession::new(
            args.token.clone(),
            args.refresh_token.clone(),
            refresh_client,
            &config.auth,
        );
        if session.has_credentials() {
            builder = builder.auth_handlers(Arc::new(session));
        } else {
            output.info("No credentials given, sending unauthenticated")?;
        }
    }
    let client = builder.build()?;

    let timer = Timer::new("request");
    let spinner = output.spinner(&format!("{} {}", method, args.path));
    let result = client
        .request::<Value>(method, &args.path, body, request_config)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    tracing::info!(
        elapsed_ms = timer.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Request finished"
    );

    match result {
        Ok(response) => output.response(&response, args.include),
        Err(error) => {
            output.api_error(&error)?;
            Err(error.into())
        }
    }
}

/// Effective client settings: config file and env, then flags
fn client_config(args: &RequestArgs, config: &Config) -> Result<ClientConfig> {
    let mut client_config = config.api.clone();
    if let Some(base_url) = &args.base_url {
        client_config.base_url = base_url.clone();
    }
    if let Some(max_retries) = args.max_retries {
        client_config.retry.max_retries = max_retries;
    }
    client_config.validate()?;
    Ok(client_config)
}

fn request_config(args: &RequestArgs) -> Result<RequestConfig> {
    let mut request_config = RequestConfig::new();

    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| Error::invalid_args(format!("Header '{}' is not NAME:VALUE", header)))?;
        request_config = request_config.header(name.trim(), value.trim());
    }

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::invalid_args(format!("Query '{}' is not KEY=VALUE", pair)))?;
        request_config = request_config.query(key, value);
    }

    if let Some(seconds) = args.timeout {
        if seconds == 0 {
            return Err(Error::invalid_args("--timeout must be at least 1 second"));
        }
        request_config = request_config.timeout(Duration::from_secs(seconds));
    }

    if args.no_auth {
        request_config = request_config.skip_auth();
    }

    Ok(request_config)
}

/// Parse `--data`: inline JSON, or `@path` to read it from a file
fn parse_body(data: &str) -> Result<Value> {
    match data.strip_prefix('@') {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(Error::FileNotFound { path });
            }
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|_| Error::InvalidFormat {
                path,
                expected: "JSON".to_string(),
            })
        }
        None => serde_json::from_str(data)
            .map_err(|e| Error::invalid_args(format!("--data is not valid JSON: {}", e))),
    }
}
