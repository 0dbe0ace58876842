//! Access log format module
//!
//! Supports multiple log formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per request)
//! - Custom patterns with variables

use chrono::Local;

/// One dispatched request, as written to the access log
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    /// Client IP address
    pub remote_addr: String,
    /// Request timestamp
    pub time: chrono::DateTime<Local>,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request URI path
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// Response status code
    pub status: u16,
    /// Response body size in bytes
    pub body_bytes: usize,
    /// Name of the handler the route resolved to
    pub handler: Option<String>,
    /// `retcode` of a structured error result, when one was returned
    pub retcode: Option<i64>,
    /// User-Agent header
    pub user_agent: Option<String>,
    /// Request processing time in microseconds
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Create a new access log entry with current timestamp
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            status: 200,
            body_bytes: 0,
            handler: None,
            retcode: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    /// Format the log entry according to the specified format
    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => self.format_combined(),
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    fn request_uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    fn time_local(&self) -> String {
        self.time.format("%d/%b/%Y:%H:%M:%S %z").to_string()
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{} {}\" {} {}",
            self.remote_addr,
            self.time_local(),
            self.method,
            self.request_uri(),
            self.status,
            self.body_bytes,
        )
    }

    /// Common format plus handler, retcode and user agent
    fn format_combined(&self) -> String {
        format!(
            "{} {} {} \"{}\"",
            self.format_common(),
            self.handler.as_deref().unwrap_or("-"),
            self.retcode
                .map_or_else(|| "-".to_string(), |code| code.to_string()),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }

    fn format_json(&self) -> String {
        serde_json::json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "handler": self.handler,
            "retcode": self.retcode,
            "user_agent": self.user_agent,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    /// Custom format with variable substitution
    ///
    /// Supported variables: `$remote_addr`, `$time_local`, `$time_iso8601`,
    /// `$request_time` (seconds, 3 decimals), `$request_method`,
    /// `$request_uri`, `$request`, `$status`, `$body_bytes_sent`,
    /// `$handler`, `$retcode`, `$http_user_agent`.
    fn format_custom(&self, pattern: &str) -> String {
        let request_uri = self.request_uri();
        let request_line = format!("{} {}", self.method, request_uri);
        #[allow(clippy::cast_precision_loss)]
        let request_time = self.request_time_us as f64 / 1_000_000.0;

        // Longer variables first: $request_time and $request_uri before $request
        pattern
            .replace("$remote_addr", &self.remote_addr)
            .replace("$time_local", &self.time_local())
            .replace("$time_iso8601", &self.time.to_rfc3339())
            .replace("$request_time", &format!("{request_time:.3}"))
            .replace("$request_method", &self.method)
            .replace("$request_uri", &request_uri)
            .replace("$request", &request_line)
            .replace("$status", &self.status.to_string())
            .replace("$body_bytes_sent", &self.body_bytes.to_string())
            .replace("$handler", self.handler.as_deref().unwrap_or("-"))
            .replace(
                "$retcode",
                &self
                    .retcode
                    .map_or_else(|| "-".to_string(), |code| code.to_string()),
            )
            .replace("$http_user_agent", self.user_agent.as_deref().unwrap_or("-"))
    }
}
