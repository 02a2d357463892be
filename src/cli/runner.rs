//! CLI runner - executes commands

use crate::cache::SessionCache;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{timeout_from_secs, Settings, SettingsBuilder};
use crate::error::{Error, ErrorKind, Result};
use crate::http::{ApiClient, ApiRequest, ClientConfig, ResponseBody};
use crate::pagination::{fetch_all_cached, FetchOptions, Listing, PageErrorPolicy};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Status endpoint probed by `health`
pub const HEALTH_PATH: &str = "/api/v1/status";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let settings = self.settings()?;
        debug!("Using {:?}", settings);

        match &self.cli.command {
            Commands::Get { path, params } => self.get(settings, path, params).await,
            Commands::List {
                path,
                page_size,
                parallel,
                max_concurrency,
                no_cache,
                allow_partial,
                unique_key,
                params,
            } => {
                let mut options = FetchOptions::new(*page_size);
                options.parallel = *parallel;
                options.max_concurrency = *max_concurrency;
                options.query.clone_from(params);
                options.unique_key.clone_from(unique_key);
                if *allow_partial {
                    options.on_page_error = PageErrorPolicy::Skip;
                }
                self.list(settings, path, &options, !*no_cache).await
            }
            Commands::Health => self.health(settings).await,
        }
    }

    /// Resolve settings: file or environment, then command-line overrides
    fn settings(&self) -> Result<Settings> {
        let base = match &self.cli.config {
            Some(path) => {
                debug!("Loading settings from {}", path.display());
                Settings::from_yaml_file(path)?
            }
            None => Settings::from_env(),
        };

        let mut builder = SettingsBuilder::from_settings(base);
        if let Some(ref url) = self.cli.base_url {
            builder = builder.base_url(url);
        }
        if let Some(ref tenant) = self.cli.tenant {
            builder = builder.tenant(tenant);
        }
        if let Some(ref token) = self.cli.token {
            builder = builder.token(token);
        }
        if let Some(secs) = self.cli.timeout {
            let timeout = timeout_from_secs(secs).ok_or_else(|| {
                Error::invalid_value("timeout", format!("{secs} is not a positive number of seconds"))
            })?;
            builder = builder.timeout(timeout);
        }
        if self.cli.insecure {
            builder = builder.insecure(true);
        }

        let settings = builder.build();
        settings.validate()?;
        Ok(settings)
    }

    async fn get(&self, settings: Settings, path: &str, params: &[(String, String)]) -> Result<()> {
        let request = ApiRequest::get(path).queries(params.iter().cloned());
        let response =
            ApiClient::scope(settings, ClientConfig::default(), |client| async move {
                client.request(request).await
            })
            .await?;

        match response.body {
            ResponseBody::Json(ref value) => self.output(value),
            ResponseBody::Empty => self.output(&Value::Null),
            ResponseBody::Raw(ref bytes) => {
                // Not JSON: pass the payload through as text
                println!("{}", String::from_utf8_lossy(bytes));
                Ok(())
            }
        }
    }

    async fn list(
        &self,
        settings: Settings,
        path: &str,
        options: &FetchOptions,
        use_cache: bool,
    ) -> Result<()> {
        let cache = SessionCache::with_cache(use_cache);
        let listing: Listing =
            ApiClient::scope(settings, ClientConfig::default(), |client| {
                let cache = &cache;
                async move { fetch_all_cached(&client, cache, path, options).await }
            })
            .await?;

        if listing.is_partial() {
            info!(
                "Returning partial listing; skipped pages: {:?}",
                listing.skipped_pages
            );
        }
        self.output(&listing)
    }

    async fn health(&self, settings: Settings) -> Result<()> {
        let base_url = settings.base_url.clone();
        let started = Instant::now();
        let body = ApiClient::scope(settings, ClientConfig::default(), |client| async move {
            client.get_json(HEALTH_PATH).await
        })
        .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let api_base = body
            .get("api_base")
            .and_then(Value::as_str)
            .unwrap_or(&base_url);
        let tz = body
            .get("tz")
            .or_else(|| body.get("scheduler_timezone"))
            .and_then(Value::as_str)
            .unwrap_or("UTC");

        self.output(&json!({
            "status": "ok",
            "latency_ms": latency_ms,
            "api_base": api_base,
            "tz": tz,
        }))
    }

    fn output<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        };
        println!("{text}");
        Ok(())
    }
}

/// Human-readable message with a hint on how to fix the failure
pub fn describe(err: &Error) -> String {
    let hint = match err.kind() {
        ErrorKind::Unauthorized => "check the token (--token or NETPICKER_TOKEN)",
        ErrorKind::Forbidden => "the token is valid but lacks access to this tenant or resource",
        ErrorKind::NotFound => "check the path and the tenant (--tenant or NETPICKER_TENANT)",
        ErrorKind::Validation => "the server rejected the request parameters",
        ErrorKind::RateLimited => "the API is throttling requests; wait and retry",
        ErrorKind::ServerError => "the API failed; retry later or contact the administrator",
        ErrorKind::ClientError => "the server refused the request",
        ErrorKind::Timeout => "raise --timeout or NETPICKER_TIMEOUT, or check the network",
        ErrorKind::ConnectionFailure => {
            "check --base-url or NETPICKER_BASE_URL and that the host is reachable"
        }
        ErrorKind::ClientClosed => "the client was used after it was closed",
        ErrorKind::UnexpectedResponse => "the server answered in an unexpected format",
        ErrorKind::Config => "fix the settings file, environment or flags",
        ErrorKind::Io | ErrorKind::Other => return err.to_string(),
    };
    format!("{err}\nhint: {hint}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_describe_adds_hint() {
        let message = describe(&Error::Unauthorized {
            body: "bad token".to_string(),
        });
        assert_eq!(
            message,
            "Unauthorized (check token): bad token\nhint: check the token (--token or NETPICKER_TOKEN)"
        );

        let message = describe(&Error::Timeout { timeout_ms: 500 });
        assert!(message.starts_with("Request timeout after 500ms"));
        assert!(message.contains("--timeout"));

        let message = describe(&Error::Other("plain".to_string()));
        assert_eq!(message, "plain");
    }

    #[test]
    fn test_settings_flags_override_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url: http://file.example.com\ntenant: lab\ntoken: t1").unwrap();

        let cli = Cli::try_parse_from([
            "netpicker",
            "--config",
            file.path().to_str().unwrap(),
            "--tenant",
            "acme",
            "--timeout",
            "2.5",
            "health",
        ])
        .unwrap();
        let settings = Runner::new(cli).settings().unwrap();

        assert_eq!(settings.base_url, "http://file.example.com");
        assert_eq!(settings.tenant, "acme");
        assert_eq!(settings.token.as_deref(), Some("t1"));
        assert_eq!(settings.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_settings_rejects_bad_timeout() {
        for value in ["0", "1e30"] {
            let cli = Cli::try_parse_from(["netpicker", "--timeout", value, "health"]).unwrap();
            let err = Runner::new(cli).settings().unwrap_err();
            assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "timeout"));
        }
    }
}
