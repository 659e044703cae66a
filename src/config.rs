//! Client Configuration
//!
//! Connection parameters for the stream client. The defaults match what
//! the public TradingView web client sends; only embedders with an
//! authenticated account need to override the auth token.

/// The production market-data endpoint.
pub const DEFAULT_URL: &str = "wss://data.tradingview.com/socket.io/websocket";

/// Auth token granting anonymous (delayed/limited) access.
pub const DEFAULT_AUTH_TOKEN: &str = "unauthorized_user_token";

/// Quote fields requested on every connection. Extra fields from
/// [`ClientConfig::quote_fields`] are appended to these.
pub const DEFAULT_QUOTE_FIELDS: [&str; 4] = ["lp", "lp_time", "ch", "ch_time"];

/// Chart resolutions accepted by `create_series`.
pub const INTERVALS: [&str; 15] = [
    "1", "3", "5", "15", "45", "1h", "2h", "3h", "4h", "1D", "1W", "1M", "3M", "6M", "12M",
];

/// Configuration for one stream connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Token sent with `set_auth_token` during setup.
    pub auth_token: String,
    /// Extra quote fields requested beyond [`DEFAULT_QUOTE_FIELDS`].
    pub quote_fields: Vec<String>,
    /// Capacity of the caller-to-connection command channel.
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            auth_token: DEFAULT_AUTH_TOKEN.to_string(),
            quote_fields: Vec::new(),
            command_buffer: 32,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with the production defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override the auth token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    /// Request extra quote fields on top of the defaults.
    #[must_use]
    pub fn with_quote_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quote_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// The full field list sent with `quote_set_fields`: the defaults
    /// followed by any configured extras.
    #[must_use]
    pub fn all_quote_fields(&self) -> Vec<String> {
        DEFAULT_QUOTE_FIELDS
            .iter()
            .map(|f| (*f).to_string())
            .chain(self.quote_fields.iter().cloned())
            .collect()
    }
}
