//! ICAP client: immutable configuration plus one connection per exchange.
//!
//! ```rust,no_run
//! use icap_wire::{Client, SectionKind};
//! use icap_wire::error::IcapResult;
//!
//! # async fn run() -> IcapResult<()> {
//! let client = Client::builder().from_uri("icap://127.0.0.1:1344")?.build()?;
//!
//! let options = client.options("example").await?;
//! println!("{} {}", options.status_code, options.status_text);
//!
//! let resp = client
//!     .respmod("example", [(SectionKind::ResBody, "Hello World!")])
//!     .await?;
//! if let Some(body) = resp.section(SectionKind::ResBody) {
//!     println!("{}", String::from_utf8_lossy(body));
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, IcapResult};
use crate::net::Connection;
use crate::parser::encapsulated::{ChunkPolicy, SectionKind};
use crate::request::{self, Request};
use crate::response::{self, Response};
use crate::{DEFAULT_PORT, DEFAULT_USER_AGENT};
use std::sync::Arc;
use tracing::{debug, error};

/// Cheap to clone; clones share the same configuration.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

#[derive(Debug)]
struct ClientRef {
    host: String,
    port: u16,
    user_agent: String,
    chunk_policy: ChunkPolicy,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn new(host: &str, port: u16) -> Self {
        Self::from_parts(
            host.to_string(),
            port,
            DEFAULT_USER_AGENT.to_string(),
            ChunkPolicy::default(),
        )
    }

    pub fn from_uri(uri: &str) -> IcapResult<Self> {
        ClientBuilder::new().from_uri(uri)?.build()
    }

    fn from_parts(host: String, port: u16, user_agent: String, chunk_policy: ChunkPolicy) -> Self {
        Self {
            inner: Arc::new(ClientRef {
                host,
                port,
                user_agent,
                chunk_policy,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    /// Raw ICAP request bytes, without sending anything.
    pub fn get_request(&self, req: &Request) -> Vec<u8> {
        request::build(&self.inner.host, &self.inner.user_agent, req)
    }

    /// Send `req` over a fresh connection and parse the full response.
    pub async fn send(&self, req: &Request) -> IcapResult<Response> {
        let bytes = self.get_request(req);

        let mut conn = Connection::connect(&self.inner.host, self.inner.port).await?;
        let exchanged = exchange(&mut conn, &bytes).await;
        conn.close().await;

        let raw = exchanged.inspect_err(|e| {
            error!("{} {} failed: {}", req.method, req.service, e);
        })?;
        if raw.is_empty() {
            return Err(Error::EmptyResponse);
        }
        debug!("{} {}: {} bytes received", req.method, req.service, raw.len());

        response::parse_response_with(&raw, self.inner.chunk_policy)
    }

    /// `OPTIONS` for `service`.
    pub async fn options(&self, service: &str) -> IcapResult<Response> {
        self.send(&Request::options(service)).await
    }

    /// `REQMOD` for `service` with the given encapsulated sections.
    pub async fn reqmod<I, B>(&self, service: &str, parts: I) -> IcapResult<Response>
    where
        I: IntoIterator<Item = (SectionKind, B)>,
        B: AsRef<[u8]>,
    {
        self.send(&Request::reqmod(service).parts(parts)).await
    }

    /// `RESPMOD` for `service` with the given encapsulated sections.
    pub async fn respmod<I, B>(&self, service: &str, parts: I) -> IcapResult<Response>
    where
        I: IntoIterator<Item = (SectionKind, B)>,
        B: AsRef<[u8]>,
    {
        self.send(&Request::respmod(service).parts(parts)).await
    }
}

#[derive(Debug, Default)]
pub struct ClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    user_agent: Option<String>,
    chunk_policy: ChunkPolicy,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Value of the `User-Agent` default header.
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    /// How body sections of responses are decoded.
    pub fn chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunk_policy = policy;
        self
    }

    /// Take host and port from a URI like `icap://host[:port][/service]`.
    pub fn from_uri(mut self, uri: &str) -> IcapResult<Self> {
        let (host, port) = parse_authority(uri)?;
        self.host = Some(host);
        self.port = Some(port);
        Ok(self)
    }

    pub fn build(self) -> IcapResult<Client> {
        let host = self
            .host
            .ok_or_else(|| Error::configuration("ClientBuilder: host is required"))?;
        Ok(Client::from_parts(
            host,
            self.port.unwrap_or(DEFAULT_PORT),
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            self.chunk_policy,
        ))
    }
}

async fn exchange(conn: &mut Connection, bytes: &[u8]) -> IcapResult<Vec<u8>> {
    conn.send(bytes).await?;
    conn.receive_all().await
}

fn parse_authority(uri: &str) -> IcapResult<(String, u16)> {
    let s = uri.trim();
    let rest = s
        .strip_prefix("icap://")
        .ok_or_else(|| Error::invalid_uri(format!("{s}: must start with icap://")))?;
    let authority = rest.split('/').next().unwrap_or(rest);
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => {
            let port = p
                .parse::<u16>()
                .map_err(|_| Error::invalid_uri(format!("{s}: invalid port {p:?}")))?;
            (h, port)
        }
        None => (authority, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(Error::invalid_uri(format!("{s}: empty host")));
    }
    Ok((host.to_string(), port))
}

/// Service path of a URI like `icap://host[:port]/service`, without the leading slash.
pub fn service_from_uri(uri: &str) -> Option<&str> {
    let rest = uri.trim().strip_prefix("icap://")?;
    let slash = rest.find('/')?;
    Some(&rest[slash + 1..])
}
