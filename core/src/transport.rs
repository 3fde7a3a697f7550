//! Blocking `Transport` backed by ureq.

use std::time::Duration;

use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// One `ureq::Agent`, created up front and reused for every request so
/// connections are pooled across calls.
///
/// Response bodies are read in full; `body_limit` is unbounded unless set.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    body_limit: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// A transport whose requests fail after `timeout` overall.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self::from_agent(agent)
    }

    pub fn from_agent(agent: Agent) -> Self {
        Self {
            agent,
            body_limit: u64::MAX,
        }
    }

    /// Fail responses whose body is larger than `limit` bytes.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    type Error = ureq::Error;

    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse, ureq::Error> {
        let url = request.path.as_str();
        let headers = &request.headers;
        let body = request.body.as_deref();
        let mut response = match request.method {
            HttpMethod::Get => without_body(self.agent.get(url), headers).call(),
            HttpMethod::Head => without_body(self.agent.head(url), headers).call(),
            HttpMethod::Delete => without_body(self.agent.delete(url), headers).call(),
            HttpMethod::Post => send(with_body(self.agent.post(url), headers), body),
            HttpMethod::Put => send(with_body(self.agent.put(url), headers), body),
        }?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = if request.method == HttpMethod::Head {
            String::new()
        } else {
            response.body_mut().with_config().limit(self.body_limit).read_to_string()?
        };
        Ok(HttpResponse { status, headers, body })
    }
}

fn without_body(
    mut builder: RequestBuilder<WithoutBody>,
    headers: &[(String, String)],
) -> RequestBuilder<WithoutBody> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn with_body(mut builder: RequestBuilder<WithBody>, headers: &[(String, String)]) -> RequestBuilder<WithBody> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    builder: RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body),
        None => builder.send_empty(),
    }
}
