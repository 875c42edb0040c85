//! InfluxHttpBackend - InfluxDB 1.x HTTP API
//!
//! - `POST /write?db=<db>[&precision=<p>]` with a line protocol body
//! - `POST /query?q=CREATE DATABASE "<db>"`
//!
//! Responses are classified into `BackendErrorKind` here and nowhere else.
//! Transport failures are retried with exponential backoff; HTTP error
//! responses are returned to the pipeline unchanged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{
    BackendError, BackendErrorKind, ContractError, InfluxDbConfig, Point, ShutdownHook,
    TimePrecision, TimeSeriesBackend,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::line_protocol::encode_points;

/// Base delay of the transport retry backoff
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Backend writing to an InfluxDB 1.x server
pub struct InfluxHttpBackend {
    name: String,
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    retries: u32,
    retry_base_delay: Duration,
    closed: AtomicBool,
}

impl InfluxHttpBackend {
    /// Create a backend from the `[influxdb]` configuration section
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &InfluxDbConfig) -> Result<Self, ContractError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ContractError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: "influxdb".to_string(),
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            retries: config.retries,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            closed: AtomicBool::new(false),
        })
    }

    /// Override the transport retry base delay
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Refuse every further call
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(backend = %self.name, url = %self.base_url, "InfluxDB backend closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::closed(&self.name));
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    /// Delay before retry `attempt` (0-based), doubling up to 64x
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay * (1u32 << attempt.min(6))
    }

    /// Send a request built by `build`, retrying transport failures
    async fn send<F>(&self, operation: &str, build: F) -> Result<(), BackendError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match self.authorize(build()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(status, &body));
                }
                Err(err) if attempt < self.retries => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(BackendError::new(
                        BackendErrorKind::Unavailable,
                        format!("{operation} request failed: {err}"),
                    ));
                }
            }
        }
    }
}

/// Map an HTTP error response to a backend error kind
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let kind = match status {
        StatusCode::NOT_FOUND => BackendErrorKind::DatabaseNotFound,
        StatusCode::BAD_REQUEST => BackendErrorKind::BadRequest,
        StatusCode::PAYLOAD_TOO_LARGE => BackendErrorKind::PayloadTooLarge,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendErrorKind::Unauthorized,
        s if s.is_server_error() => BackendErrorKind::Unavailable,
        _ => BackendErrorKind::Other,
    };
    let body = body.trim();
    let message = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    };
    BackendError::new(kind, message)
}

/// `CREATE DATABASE` statement with a quoted identifier
fn create_database_statement(db_name: &str) -> String {
    format!(
        "CREATE DATABASE \"{}\"",
        db_name.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

impl TimeSeriesBackend for InfluxHttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "influx_write_points",
        skip(self, points),
        fields(points = points.len())
    )]
    async fn write_points(
        &self,
        db_name: &str,
        time_precision: Option<TimePrecision>,
        points: &[Point],
    ) -> Result<(), BackendError> {
        self.ensure_open()?;

        let body = encode_points(points, time_precision)
            .map_err(|e| BackendError::new(BackendErrorKind::BadRequest, e.to_string()))?;

        let url = format!("{}/write", self.base_url);
        let mut query = vec![("db", db_name.to_string())];
        if let Some(precision) = time_precision {
            query.push(("precision", precision.as_str().to_string()));
        }

        self.send("write", || {
            self.client.post(&url).query(&query).body(body.clone())
        })
        .await?;

        debug!(db = db_name, points = points.len(), "points written");
        Ok(())
    }

    #[instrument(name = "influx_create_database", skip(self))]
    async fn create_database(&self, db_name: &str) -> Result<(), BackendError> {
        self.ensure_open()?;

        let url = format!("{}/query", self.base_url);
        let statement = create_database_statement(db_name);
        self.send("create_database", || {
            self.client.post(&url).query(&[("q", statement.as_str())])
        })
        .await
    }
}

impl ShutdownHook for InfluxHttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<(), ContractError> {
        self.close();
        Ok(())
    }
}
