//! The REST connector
//!
//! [`ApiConnector`] owns the HTTP client, authenticator, rate limiters and
//! schema validator for one API and exposes the fetch/send/health
//! operations. Streaming lives in [`super::sse`].

use super::types::{
    BatchReport, HealthCheckResult, HealthStatus, NormalizedData, RawResponse, RequestDescriptor,
    SendOutcome,
};
use crate::auth::Authenticator;
use crate::config::{ConnectorConfig, EndpointConfig};
use crate::error::{ApiError, Error, ErrorCategory, Result};
use crate::pagination::{PageFetcher, PaginationWalker};
use crate::ratelimit::RateLimitManager;
use crate::schema::{pretty_print_diffs, BasicSchemaValidator, SchemaValidator};
use crate::sleep::{Sleeper, TokioSleeper};
use crate::types::{query_value, walk_path, JsonObject, JsonValue, StringMap, ValueMap};
use async_trait::async_trait;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ApiConnector`]
pub struct ApiConnectorBuilder {
    config: ConnectorConfig,
    client: Option<Client>,
    sleeper: Arc<dyn Sleeper>,
    validator: Option<Arc<dyn SchemaValidator>>,
    span: Option<Span>,
}

impl ApiConnectorBuilder {
    /// Use a preconfigured HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Route every wait through `sleeper`
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Validate payloads with `validator`
    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Skip all schema validation
    pub fn without_validation(mut self) -> Self {
        self.validator = None;
        self
    }

    /// Record this connector's logs under `span`
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the connector, creating one limiter per rate-limited endpoint
    pub fn build(self) -> Result<ApiConnector> {
        let config = self.config;
        url::Url::parse(&config.base_url)?;

        let mut rate_limits = RateLimitManager::new();
        for (name, endpoint) in &config.endpoints {
            if let Some(spec) = &endpoint.rate_limit {
                rate_limits.create_limiter(name.clone(), spec)?;
            }
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(format!("apilinker/{}", crate::VERSION))
                .build()?,
        };

        let span = self.span.unwrap_or_else(|| {
            info_span!(
                "connector",
                connector_type = %config.connector_type,
                base_url = %config.base_url
            )
        });

        span.in_scope(|| {
            debug!(
                endpoints = config.endpoints.len(),
                rate_limited = rate_limits.len(),
                "Initialized connector"
            );
        });

        Ok(ApiConnector {
            auth: Authenticator::new(config.auth.clone()),
            config,
            client,
            rate_limits,
            sleeper: self.sleeper,
            validator: self.validator,
            span,
        })
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector for one REST/SSE API
pub struct ApiConnector {
    config: ConnectorConfig,
    client: Client,
    auth: Authenticator,
    rate_limits: RateLimitManager,
    sleeper: Arc<dyn Sleeper>,
    validator: Option<Arc<dyn SchemaValidator>>,
    span: Span,
}

impl ApiConnector {
    /// Create a connector with the default sleeper and validator
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a connector
    pub fn builder(config: ConnectorConfig) -> ApiConnectorBuilder {
        ApiConnectorBuilder {
            config,
            client: None,
            sleeper: Arc::new(TokioSleeper),
            validator: Some(Arc::new(BasicSchemaValidator)),
            span: None,
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn connector_type(&self) -> &str {
        &self.config.connector_type
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Span every operation of this connector is recorded under
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    pub fn rate_limit_manager(&self) -> &RateLimitManager {
        &self.rate_limits
    }

    /// Look up an endpoint, failing for unknown names
    pub fn endpoint(&self, name: &str) -> Result<&EndpointConfig> {
        self.config
            .endpoint(name)
            .ok_or_else(|| Error::endpoint_not_found(name))
    }

    /// Names of all configured endpoints, sorted
    pub fn endpoint_names(&self) -> Vec<&str> {
        self.config.endpoints.keys().map(String::as_str).collect()
    }

    // ------------------------------------------------------------------------
    // Request preparation
    // ------------------------------------------------------------------------

    /// Build the request descriptor for one call.
    ///
    /// Headers: connector defaults < endpoint < auth. Query: endpoint params
    /// < call params < query-located API key.
    pub fn prepare_request(
        &self,
        endpoint_name: &str,
        params: Option<&ValueMap>,
    ) -> Result<RequestDescriptor> {
        let endpoint = self.endpoint(endpoint_name)?;

        let mut headers = self.config.default_headers.clone();
        merge_headers(&mut headers, endpoint.headers.clone());
        merge_headers(&mut headers, self.auth.headers());

        let mut request_params = endpoint.params.clone();
        if let Some(params) = params {
            request_params.extend(params.clone());
        }
        request_params.extend(self.auth.query_params());

        Ok(RequestDescriptor {
            url: self.endpoint_url(&endpoint.path),
            method: endpoint.method,
            headers,
            params: request_params,
            json: endpoint.body_template.clone(),
        })
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Issue a request; `timeout` of `None` leaves the body read unbounded
    pub(crate) async fn execute(
        &self,
        request: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.client.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let query: Vec<(&str, String)> = request
            .params
            .iter()
            .filter_map(|(key, value)| query_value(value).map(|v| (key.as_str(), v)))
            .collect();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(json) = &request.json {
            builder = builder.json(json);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = self.auth.apply(builder).send().await?;
        Ok(response)
    }

    /// Issue a request and read the whole body
    pub async fn send_request(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        let response = self.execute(request, Some(self.config.timeout())).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
            url,
        })
    }

    // ------------------------------------------------------------------------
    // Response processing
    // ------------------------------------------------------------------------

    /// Turn a raw response into normalized data.
    ///
    /// The rate limiter sees the headers before the status is checked. A
    /// missing `response_path` segment keeps the whole payload, and a
    /// response schema mismatch is only logged.
    pub fn process_response(
        &self,
        response: &RawResponse,
        endpoint_name: &str,
    ) -> Result<NormalizedData> {
        let endpoint = self.endpoint(endpoint_name)?;
        self.rate_limits
            .update_from_response(endpoint_name, &response.headers);

        if !response.is_success() {
            return Err(Error::http_status(response.status, response.text()));
        }

        let mut data = parse_body(&response.body)?;

        if let Some(path) = endpoint.response_path.as_deref().filter(|p| !p.is_empty()) {
            if data.is_object() {
                match walk_path(&data, path) {
                    Some(found) => data = found.clone(),
                    None => warn!(
                        endpoint = %endpoint_name,
                        response_path = %path,
                        "Response path not found in response"
                    ),
                }
            }
        }

        if let (Some(schema), Some(validator)) = (&endpoint.response_schema, &self.validator) {
            let outcome = validator.validate(&data, schema);
            if !outcome.valid {
                warn!(
                    endpoint = %endpoint_name,
                    "Response schema validation failed\n{}",
                    pretty_print_diffs(&outcome.diffs)
                );
            }
        }

        Ok(NormalizedData::from_value(data))
    }

    // ------------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------------

    /// Fetch an endpoint, retrying failures and following pagination
    pub async fn fetch_data(
        &self,
        endpoint_name: &str,
        params: Option<&ValueMap>,
    ) -> Result<NormalizedData> {
        async {
            let endpoint = self.endpoint(endpoint_name)?;
            info!(
                endpoint = %endpoint_name,
                method = %endpoint.method,
                path = %endpoint.path,
                "Fetching data"
            );

            let request = self.prepare_request(endpoint_name, params)?;
            let request_ref = &request;
            let result = self
                .with_retries("fetching data", endpoint_name, move || {
                    self.fetch_once(endpoint_name, endpoint, request_ref, params)
                })
                .await;

            match result {
                Ok(data) => {
                    info!(endpoint = %endpoint_name, "Data fetched successfully");
                    Ok(data)
                }
                Err(e) if e.is_config() => Err(e),
                Err(e) => {
                    let params_value = params.map_or(JsonValue::Null, |p| {
                        JsonValue::Object(p.clone().into_iter().collect())
                    });
                    let api = ApiError::from_error(
                        format!("Failed to fetch data from {endpoint_name}: {e}"),
                        &e,
                    )
                    .with_request(request.url.clone(), request.method.as_str())
                    .with_context("endpoint", endpoint_name)
                    .with_context("params", params_value);
                    Err(Error::api(api))
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn fetch_once(
        &self,
        endpoint_name: &str,
        endpoint: &EndpointConfig,
        request: &RequestDescriptor,
        params: Option<&ValueMap>,
    ) -> Result<NormalizedData> {
        self.rate_limits.acquire(endpoint_name, self.sleeper()).await;
        let response = self.send_request(request).await?;
        let data = self.process_response(&response, endpoint_name)?;

        let Some(spec) = &endpoint.pagination else {
            return Ok(data);
        };

        let walker = PaginationWalker::new(spec, endpoint_name);
        let pages = EndpointPages {
            connector: self,
            endpoint: endpoint_name,
        };
        let items = walker.walk(data.into_value(), params, &pages).await;
        Ok(NormalizedData::List(
            items.into_iter().map(JsonValue::Object).collect(),
        ))
    }

    /// Run `call` up to `retry_count` times, sleeping `retry_delay * attempt`
    /// between attempts. Configuration errors are returned at once.
    async fn with_retries<T, F, Fut>(
        &self,
        action: &str,
        endpoint_name: &str,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.retry_count.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_config() => return Err(e),
                Err(e) if attempt < attempts => {
                    let wait = self.config.retry_delay() * attempt;
                    warn!(
                        endpoint = %endpoint_name,
                        error = %e,
                        wait_secs = wait.as_secs_f64(),
                        "Error {} (attempt {}/{}), retrying",
                        action,
                        attempt,
                        attempts
                    );
                    self.sleeper.sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(endpoint = %endpoint_name, error = %e, "All retry attempts failed");
                    return Err(e);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------------

    /// Send a payload.
    ///
    /// A JSON array is sent item by item without retries and reported as a
    /// [`BatchReport`]; anything else is sent once with retries. Request
    /// schema failures are raised before anything is sent.
    pub async fn send_data(&self, endpoint_name: &str, data: JsonValue) -> Result<SendOutcome> {
        async {
            let endpoint = self.endpoint(endpoint_name)?;
            info!(
                endpoint = %endpoint_name,
                method = %endpoint.method,
                path = %endpoint.path,
                "Sending data"
            );

            let request = self.prepare_request(endpoint_name, None)?;

            if let (Some(schema), Some(validator)) = (&endpoint.request_schema, &self.validator) {
                let items: Vec<&JsonValue> = match &data {
                    JsonValue::Array(items) => items.iter().collect(),
                    item => vec![item],
                };
                for item in items {
                    validate_request(endpoint_name, item, schema, validator.as_ref())?;
                }
            }

            match data {
                JsonValue::Array(items) => Ok(SendOutcome::Batch(
                    self.send_batch(endpoint_name, &request, items).await,
                )),
                item => self.send_single(endpoint_name, request, item).await,
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn send_batch(
        &self,
        endpoint_name: &str,
        request: &RequestDescriptor,
        items: Vec<JsonValue>,
    ) -> BatchReport {
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            let request = request.clone().with_json(Some(item));
            match self.send_once(endpoint_name, &request).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    let failure = ApiError::from_error(
                        format!("Failed to send data item {index} to {endpoint_name}: {e}"),
                        &e,
                    )
                    .with_request(request.url.clone(), request.method.as_str())
                    .with_context("endpoint", endpoint_name)
                    .with_context("item_index", index);
                    error!(
                        endpoint = %endpoint_name,
                        item = index,
                        error = %failure,
                        "Error sending data item"
                    );
                    failures.push(failure);
                }
            }
        }

        let sent_count = results.len();
        let failed_count = failures.len();
        info!(
            endpoint = %endpoint_name,
            sent = sent_count,
            failed = failed_count,
            "Batch send finished"
        );
        BatchReport {
            success: sent_count > 0 && failed_count == 0,
            sent_count,
            failed_count,
            results,
            failures,
        }
    }

    async fn send_single(
        &self,
        endpoint_name: &str,
        request: RequestDescriptor,
        item: JsonValue,
    ) -> Result<SendOutcome> {
        let request = request.with_json(Some(item));
        let request_ref = &request;
        let result = self
            .with_retries("sending data", endpoint_name, move || {
                self.send_once(endpoint_name, request_ref)
            })
            .await;

        match result {
            Ok(result) => {
                info!(endpoint = %endpoint_name, "Data sent successfully");
                Ok(SendOutcome::Single {
                    success: true,
                    result,
                })
            }
            Err(e) if e.is_config() => Err(e),
            Err(e) => {
                let api = ApiError::from_error(
                    format!("Failed to send data to {endpoint_name}: {e}"),
                    &e,
                )
                .with_request(request.url.clone(), request.method.as_str())
                .with_context("endpoint", endpoint_name);
                Err(Error::api(api))
            }
        }
    }

    /// One send attempt; an empty success body reads as `{}`
    async fn send_once(
        &self,
        endpoint_name: &str,
        request: &RequestDescriptor,
    ) -> Result<JsonValue> {
        self.rate_limits.acquire(endpoint_name, self.sleeper()).await;
        let response = self.send_request(request).await?;
        self.rate_limits
            .update_from_response(endpoint_name, &response.headers);

        if !response.is_success() {
            return Err(Error::http_status(response.status, response.text()));
        }
        if response.body.is_empty() {
            return Ok(JsonValue::Object(JsonObject::new()));
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    /// Probe `GET <base_url>/`; 5xx and transport failures are unhealthy
    pub async fn check_health(&self) -> HealthCheckResult {
        let component = format!("connector:{}", self.config.base_url);
        let url = format!("{}/", self.config.base_url.trim_end_matches('/'));
        let start = Instant::now();

        let request = self.client.get(&url).timeout(HEALTH_CHECK_TIMEOUT);
        let outcome = self
            .auth
            .apply(request)
            .send()
            .instrument(self.span.clone())
            .await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let (status, message) = if status_code >= 500 {
                    (HealthStatus::Unhealthy, format!("Server returned {status_code}"))
                } else {
                    (
                        HealthStatus::Healthy,
                        format!("Connected to {}", self.config.base_url),
                    )
                };
                let mut details = JsonObject::new();
                details.insert("status_code".to_string(), status_code.into());
                HealthCheckResult {
                    status,
                    component,
                    message,
                    latency_ms,
                    details,
                }
            }
            Err(e) => HealthCheckResult {
                status: HealthStatus::Unhealthy,
                component,
                message: e.to_string(),
                latency_ms,
                details: JsonObject::new(),
            },
        }
    }
}

impl std::fmt::Debug for ApiConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConnector")
            .field("connector_type", &self.config.connector_type)
            .field("base_url", &self.config.base_url)
            .field("endpoints", &self.config.endpoints.len())
            .field("auth", &self.auth.config().type_name())
            .field("validation", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

fn validate_request(
    endpoint_name: &str,
    item: &JsonValue,
    schema: &JsonValue,
    validator: &dyn SchemaValidator,
) -> Result<()> {
    let outcome = validator.validate(item, schema);
    if outcome.valid {
        return Ok(());
    }

    error!(
        endpoint = %endpoint_name,
        "Request schema validation failed\n{}",
        pretty_print_diffs(&outcome.diffs)
    );
    let diffs = serde_json::to_value(&outcome.diffs)?;
    let api = ApiError::new("Request failed schema validation", ErrorCategory::Validation)
        .with_status(0)
        .with_context("endpoint", endpoint_name)
        .with_context("diffs", diffs);
    Err(Error::api(api))
}

/// Layer `overrides` onto `headers`; names compare case-insensitively and
/// the overriding spelling is kept
fn merge_headers(headers: &mut StringMap, overrides: StringMap) {
    for (name, value) in overrides {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        headers.insert(name, value);
    }
}

/// Decode a JSON body; an empty body reads as `null`
fn parse_body(body: &[u8]) -> Result<JsonValue> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonValue::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

// ============================================================================
// Pagination
// ============================================================================

/// Fetches follow-up pages of one endpoint
struct EndpointPages<'a> {
    connector: &'a ApiConnector,
    endpoint: &'a str,
}

#[async_trait]
impl PageFetcher for EndpointPages<'_> {
    async fn fetch_page(&self, params: ValueMap) -> Result<JsonValue> {
        let request = self.connector.prepare_request(self.endpoint, Some(&params))?;
        self.connector
            .rate_limits
            .acquire(self.endpoint, self.connector.sleeper())
            .await;

        let response = self.connector.send_request(&request).await?;
        self.connector
            .rate_limits
            .update_from_response(self.endpoint, &response.headers);
        if !response.is_success() {
            return Err(Error::http_status(response.status, response.text()));
        }
        parse_body(&response.body)
    }
}
