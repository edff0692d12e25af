// Client configuration and endpoint resolution
//
// The backend is reached at `<origin>/graphql` (HTTP) and `<origin>/ws`
// (WebSocket). The origin comes from, in order: an explicit endpoint, the page
// location the dashboard is served from, or the local default.

use url::Url;

use crate::error::ClassifiedError;

pub const GRAPHQL_PATH: &str = "/graphql";
pub const WS_PATH: &str = "/ws";
pub const DEFAULT_DEV_SERVER_PORT: u16 = 5173;
pub const DEFAULT_BACKEND_PORT: u16 = 8080;

/// Configuration for the request/response and subscription clients
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Explicit backend origin, e.g. `https://fleet.example.com`
    pub endpoint: Option<String>,
    /// URL of the page hosting the dashboard, when running behind one
    pub page_location: Option<String>,
    /// Port of the local front-end dev server
    pub dev_server_port: u16,
    /// Well-known local backend port used while on the dev server
    pub backend_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("FLEETWATCH_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            page_location: std::env::var("FLEETWATCH_PAGE_LOCATION")
                .ok()
                .filter(|s| !s.is_empty()),
            dev_server_port: std::env::var("FLEETWATCH_DEV_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_DEV_SERVER_PORT),
            backend_port: std::env::var("FLEETWATCH_BACKEND_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_BACKEND_PORT),
        }
    }

    /// Config pinned to an explicit origin, ignoring the environment
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            page_location: None,
            dev_server_port: DEFAULT_DEV_SERVER_PORT,
            backend_port: DEFAULT_BACKEND_PORT,
        }
    }

    /// Backend origin (scheme, host, port) the clients should talk to
    pub fn origin(&self) -> Result<Url, ClassifiedError> {
        if let Some(endpoint) = &self.endpoint {
            return parse_url(endpoint);
        }

        if let Some(page) = &self.page_location {
            let page = parse_url(page)?;
            // Served by the front-end dev server: the API lives on the local backend port
            if page.port() == Some(self.dev_server_port) {
                return local_origin(self.backend_port);
            }
            let mut origin = page;
            origin.set_path("");
            origin.set_query(None);
            origin.set_fragment(None);
            return Ok(origin);
        }

        local_origin(self.backend_port)
    }

    pub fn resolve(&self) -> Result<Endpoints, ClassifiedError> {
        Endpoints::from_origin(&self.origin()?)
    }
}

/// Fully resolved transport endpoints
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub http: Url,
    pub ws: Url,
}

impl Endpoints {
    pub fn from_origin(origin: &Url) -> Result<Self, ClassifiedError> {
        let mut http = origin.clone();
        http.set_path(GRAPHQL_PATH);

        let ws_scheme = match origin.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        let mut ws = origin.clone();
        ws.set_path(WS_PATH);
        ws.set_scheme(ws_scheme).map_err(|_| {
            ClassifiedError::new(format!("Cannot derive WebSocket URL from {}", origin), None)
        })?;

        Ok(Self { http, ws })
    }
}

fn local_origin(port: u16) -> Result<Url, ClassifiedError> {
    parse_url(&format!("http://localhost:{}", port))
}

fn parse_url(raw: &str) -> Result<Url, ClassifiedError> {
    Url::parse(raw).map_err(|e| ClassifiedError::transport(format!("Invalid URL {}", raw), e))
}
