//! HTTP Transport
//!
//! HTTP client interface and implementations for auth and REST requests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::{
    create_error_from_response, parse_retry_after, BullhornError, BullhornResult, NetworkError,
    ProtocolError,
};

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL, query string included.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a body-less GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a POST request with a form-encoded body.
    pub fn post_form(url: impl Into<String>, params: &[(&str, &str)]) -> BullhornResult<Self> {
        let body = serde_urlencoded::to_string(params).map_err(|e| {
            BullhornError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: [(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )]
            .into_iter()
            .collect(),
            body: Some(body),
            timeout: None,
        })
    }

    /// Create a POST request with a JSON body.
    pub fn post_json<T: serde::Serialize + ?Sized>(
        url: impl Into<String>,
        payload: &T,
    ) -> BullhornResult<Self> {
        let body = serde_json::to_string(payload).map_err(|e| {
            BullhornError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: Some(body),
            timeout: None,
        })
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, lower-cased names.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is a 3xx redirect.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Header lookup by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Error for a non-success response. A 429 carries its `Retry-After`.
    pub fn error(&self) -> BullhornError {
        match create_error_from_response(self.status, &self.body) {
            BullhornError::Network(NetworkError::RateLimited { .. }) => {
                NetworkError::RateLimited {
                    retry_after: self.header("retry-after").and_then(parse_retry_after),
                }
                .into()
            }
            error => error,
        }
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> BullhornResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            BullhornError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request. Redirects are returned as-is, never followed.
    async fn send(&self, request: HttpRequest) -> BullhornResult<HttpResponse>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create transport with the given default timeout.
    pub fn new(timeout: Duration) -> BullhornResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                BullhornError::Network(NetworkError::Tls {
                    message: e.to_string(),
                })
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    fn classify(error: reqwest::Error, timeout: Duration) -> NetworkError {
        if error.is_timeout() {
            return NetworkError::Timeout { timeout };
        }

        let message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe => {
                        return NetworkError::ConnectionReset { message };
                    }
                    std::io::ErrorKind::TimedOut => return NetworkError::Timeout { timeout },
                    _ => {}
                }
            }
            let text = cause.to_string().to_lowercase();
            if text.contains("dns error") || text.contains("failed to lookup address") {
                return NetworkError::DnsResolution { message };
            }
            source = cause.source();
        }

        NetworkError::ConnectionFailed { message }
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> BullhornResult<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| BullhornError::Network(Self::classify(e, timeout)))?;

        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| BullhornError::Network(Self::classify(e, timeout)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Mock HTTP transport for testing. Replies are served in FIFO order.
#[derive(Default)]
pub struct MockHttpTransport {
    replies: Mutex<VecDeque<BullhornResult<HttpResponse>>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: body.to_string(),
        })
    }

    /// Queue a redirect with the given Location header.
    pub fn queue_redirect(&self, status: u16, location: &str) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: [("location".to_string(), location.to_string())]
                .into_iter()
                .collect(),
            body: String::new(),
        })
    }

    /// Queue a transport-level error.
    pub fn queue_error(&self, error: BullhornError) -> &Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
        self
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *self
            .default_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(response);
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.request_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.request_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> BullhornResult<HttpResponse> {
        self.request_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let queued = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match queued {
            Some(reply) => reply,
            None => self
                .default_response
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .ok_or_else(|| {
                    BullhornError::Network(NetworkError::ConnectionFailed {
                        message: "No mock response available".to_string(),
                    })
                }),
        }
    }
}
