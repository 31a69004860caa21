use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::error::{HarnessError, Result};
use crate::poller::{PollConfig, PollResult, Poller};
use crate::request::{Method, RequestDescriptor, SerializationFormat};
use crate::response::ResponseDescriptor;
use crate::settings::TransportSettings;

/// Sends a request and returns what came back.
///
/// Any HTTP status, including 4xx and 5xx, is a normal response. `Err` is reserved for
/// faults that make the exchange meaningless: an unparsable target, a refused
/// connection, a body that cannot be encoded.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a RequestDescriptor)
        -> BoxFuture<'a, Result<ResponseDescriptor>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
    ) -> BoxFuture<'a, Result<ResponseDescriptor>> {
        (**self).send(request)
    }
}

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }

    async fn execute(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor> {
        let url = reqwest::Url::parse(request.target()).map_err(|e| {
            HarnessError::InvalidRequest(format!("invalid target {}: {e}", request.target()))
        })?;

        // reqwest appends repeated headers, so defaults yield to explicit ones.
        let mut builder = self.client.request(Self::method(request.method()), url);
        if request.header(ACCEPT.as_str()).is_none() {
            builder = builder.header(ACCEPT, request.format().content_type());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(authorization) = request.authorization() {
            builder = builder.header(AUTHORIZATION, authorization.header_value());
        }
        if let Some(body) = request.body() {
            if request.header(CONTENT_TYPE.as_str()).is_none() {
                builder = builder.header(CONTENT_TYPE, body.format().content_type());
            }
            builder = builder.body(body.to_bytes()?);
        }

        let response = builder.send().await?;
        let status = response.status();

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let body = response.bytes().await?;
        Ok(ResponseDescriptor::from_parts(status, headers, body.to_vec()))
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
    ) -> BoxFuture<'a, Result<ResponseDescriptor>> {
        Box::pin(self.execute(request))
    }
}

/// Shared handle to a transport, used by scenarios to send requests.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn http(settings: &TransportSettings) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(settings)?))
    }

    pub async fn send(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor> {
        let started = Instant::now();
        match self.transport.send(request).await {
            Ok(response) => {
                log::debug!(
                    "{} {} -> {} in {:?}",
                    request.method(),
                    request.target(),
                    response.status(),
                    started.elapsed()
                );
                Ok(response)
            }
            Err(e) => {
                log::error!("{} {} failed: {e}", request.method(), request.target());
                Err(e)
            }
        }
    }

    /// Send and decode the body, for state-read actions.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        format: SerializationFormat,
    ) -> Result<T> {
        self.send(request).await?.content_as(format)
    }

    /// Resend `request` until the response satisfies `predicate` or the budget runs out.
    pub async fn poll_response<P>(
        &self,
        request: &RequestDescriptor,
        config: PollConfig,
        predicate: P,
    ) -> Result<PollResult<ResponseDescriptor>>
    where
        P: Fn(&ResponseDescriptor) -> bool,
    {
        Poller::new(|| self.send(request), predicate)
            .with_config(config)
            .result()
            .await
    }
}
