//! Blocking client for the GoCD REST API.
//!
//! Every call names its `Accept` media type explicitly; callers resolve it
//! from the server version through [`crate::media_type`].

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("gocd-provision/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// Raw result of a POST; GoCD answers some of these with plain text.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct GoCdClient {
    client: Client,
    no_redirect: Client,
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
    /// Per-request cap below `timeout`, set while polling.
    request_limit: Option<Duration>,
}

fn build_client(timeout: Duration, redirects: Policy) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .redirect(redirects)
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))
}

impl GoCdClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::config_missing_key("server.base_url", None));
        }

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            client: build_client(timeout, Policy::default())?,
            no_redirect: build_client(timeout, Policy::none())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            timeout,
            request_limit: None,
        })
    }

    /// Same server, but no request may run longer than `limit`.
    pub fn bounded(&self, limit: Duration) -> Self {
        Self {
            request_limit: Some(limit.min(self.timeout)),
            ..self.clone()
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Same server, no basic auth.
    pub fn without_credentials(&self) -> Self {
        Self {
            credentials: None,
            ..self.clone()
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    fn limit(&self, request: RequestBuilder) -> RequestBuilder {
        match self.request_limit {
            Some(limit) => request.timeout(limit),
            None => request,
        }
    }

    /// GET `endpoint` and parse the JSON body. Non-2xx is an error.
    pub fn get_json(&self, endpoint: &str, accept: &str) -> Result<Value> {
        let url = self.url(endpoint);
        let request = self.authorize(self.client.get(&url).header(ACCEPT, accept));
        let response = self
            .limit(request)
            .send()
            .map_err(|e| Error::http_request_failed("GET", &url, &e))?;
        parse_json_response("GET", &url, response)
    }

    /// GET `endpoint` and return only the status code.
    pub fn get_status(&self, endpoint: &str, accept: &str) -> Result<u16> {
        let url = self.url(endpoint);
        let request = self.authorize(self.client.get(&url).header(ACCEPT, accept));
        let response = self
            .limit(request)
            .send()
            .map_err(|e| Error::http_request_failed("GET", &url, &e))?;
        Ok(response.status().as_u16())
    }

    /// POST to `endpoint`. `confirm` adds the headers GoCD requires on
    /// state-changing calls that carry no body.
    pub fn post(
        &self,
        endpoint: &str,
        accept: &str,
        body: Option<&Value>,
        confirm: bool,
    ) -> Result<ApiResponse> {
        let url = self.url(endpoint);
        let mut request = self.client.post(&url).header(ACCEPT, accept);

        if confirm {
            request = request
                .header("Confirm", "true")
                .header("X-GoCD-Confirm", "true");
        }

        if let Some(body) = body {
            let payload = serde_json::to_vec(body).map_err(|e| {
                Error::internal_json(e.to_string(), Some(format!("serialize body for {}", url)))
            })?;
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let response = self
            .limit(self.authorize(request))
            .send()
            .map_err(|e| Error::http_request_failed("POST", &url, &e))?;

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();

        if !(200..300).contains(&status) {
            return Err(Error::http_status("POST", &url, status, body));
        }

        Ok(ApiResponse { status, body })
    }

    /// Status of `endpoint` without following redirects.
    pub fn ping(&self, endpoint: &str) -> Result<u16> {
        let url = self.url(endpoint);
        let response = self
            .limit(self.no_redirect.get(&url))
            .send()
            .map_err(|e| Error::http_request_failed("GET", &url, &e))?;
        Ok(response.status().as_u16())
    }
}

fn parse_json_response(method: &str, url: &str, response: Response) -> Result<Value> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|e| Error::http_request_failed(method, url, &e))?;

    if !(200..300).contains(&status) {
        return Err(Error::http_status(method, url, status, body));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::internal_json(e.to_string(), Some(format!("parse response from {}", url))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn client_for(base_url: &str) -> GoCdClient {
        GoCdClient::new(&ServerConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 2,
            ..ServerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let client = client_for("http://localhost:8153/go/");
        assert_eq!(client.url("/api/version"), "http://localhost:8153/go/api/version");
        assert_eq!(client.url("api/agents"), "http://localhost:8153/go/api/agents");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = GoCdClient::new(&ServerConfig {
            base_url: " ".to_string(),
            ..ServerConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }

    #[test]
    fn credentials_need_both_halves() {
        let client = GoCdClient::new(&ServerConfig {
            username: Some("admin".to_string()),
            ..ServerConfig::default()
        })
        .unwrap();
        assert!(!client.has_credentials());

        let client = GoCdClient::new(&ServerConfig {
            username: Some("admin".to_string()),
            password: Some("badger".to_string()),
            ..ServerConfig::default()
        })
        .unwrap();
        assert!(client.has_credentials());
        assert!(!client.without_credentials().has_credentials());
    }

    #[test]
    fn connection_refused_is_transient() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = client_for(&format!("http://127.0.0.1:{}/go", port));

        let err = client.get_json("api/version", "application/vnd.go.cd.v1+json").unwrap_err();
        assert_eq!(err.code.as_str(), "http.request_failed");
        assert!(err.is_transient());
        assert_eq!(err.details["connect"], true);
    }

    #[test]
    fn bounded_client_gives_up_at_the_limit() {
        // Accepted by the backlog but never answered.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = client_for(&format!("http://127.0.0.1:{}/go", port))
            .bounded(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let err = client.get_json("api/agents", "application/vnd.go.cd.v4+json").unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(err.code.as_str(), "http.request_failed");
        assert!(err.is_transient());
        drop(listener);
    }

    #[test]
    fn bounded_never_exceeds_the_client_timeout() {
        let client = client_for("http://localhost:8153/go").bounded(Duration::from_secs(60));
        assert_eq!(client.request_limit, Some(Duration::from_secs(2)));
    }
}
