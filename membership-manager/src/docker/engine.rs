use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use http::{header, Method, Request, Response};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::debug;

use super::models::{ContainerInspect, Event, Service, Task};
use super::{EventSource, Filters, Orchestrator};
use crate::error::OrchestratorError;

/// A minimal Docker Engine API client talking HTTP/1.1 over the daemon's unix socket.
///
/// Every call opens its own connection: the manager makes a handful of calls per
/// reconciliation pass, plus one long lived connection for the event stream.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    socket: PathBuf,
}

impl DockerEngine {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    async fn get(
        &self,
        path: &str,
    ) -> Result<(Response<Incoming>, SendRequest<Empty<Bytes>>), OrchestratorError> {
        let stream = UnixStream::connect(&self.socket).await?;
        let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;

        tokio::spawn(async move {
            if let Err(error) = connection.await {
                debug!("docker connection closed with error: {}", error);
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::HOST, "docker")
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.into_body().collect().await?.to_bytes();
            return Err(OrchestratorError::UnexpectedStatus {
                path: path.to_owned(),
                status,
                body: String::from_utf8_lossy(&body).trim().to_owned(),
            });
        }

        Ok((response, sender))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, OrchestratorError> {
        let (response, _sender) = self.get(path).await?;
        let body = response.into_body().collect().await?.to_bytes();

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl Orchestrator for DockerEngine {
    type Events = EngineEvents;

    async fn container_labels(
        &self,
        id: &str,
    ) -> Result<HashMap<String, String>, OrchestratorError> {
        let container: ContainerInspect = self.get_json(&format!("/containers/{id}/json")).await?;

        Ok(container
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default())
    }

    async fn list_services(&self, filters: &Filters) -> Result<Vec<Service>, OrchestratorError> {
        self.get_json(&format!("/services?{}", filters.to_query()?))
            .await
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, OrchestratorError> {
        let filters = Filters::new().with("service", service_id);

        self.get_json(&format!("/tasks?{}", filters.to_query()?))
            .await
    }

    async fn events(&self) -> Result<EngineEvents, OrchestratorError> {
        // Only services and nodes can trigger a reconciliation, no need to hear about the rest.
        let filters = Filters::new().with("type", "service").with("type", "node");
        let (response, sender) = self
            .get(&format!("/events?{}", filters.to_query()?))
            .await?;

        Ok(EngineEvents {
            body: response.into_body(),
            decoder: EventDecoder::default(),
            _sender: sender,
        })
    }
}

/// The streaming body of `GET /events`, decoded one event at a time.
pub struct EngineEvents {
    body: Incoming,
    decoder: EventDecoder,
    // Held so the connection stays up for as long as we read events.
    _sender: SendRequest<Empty<Bytes>>,
}

#[async_trait]
impl EventSource for EngineEvents {
    async fn next_event(&mut self) -> Result<Event, OrchestratorError> {
        loop {
            if let Some(event) = self.decoder.next_event()? {
                return Ok(event);
            }

            match self.body.frame().await {
                Some(frame) => {
                    if let Ok(data) = frame?.into_data() {
                        self.decoder.push(&data);
                    }
                }
                None => return Err(OrchestratorError::EventStreamClosed),
            }
        }
    }
}

/// Splits the newline delimited JSON of the event stream into events, whatever way the
/// body happens to be chunked.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: BytesMut,
}

impl EventDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// The next complete event, if a full line has been buffered.
    pub fn next_event(&mut self) -> Result<Option<Event>, OrchestratorError> {
        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.split_to(end);
            self.buffer.advance(1);

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(serde_json::from_slice(&line)?));
        }

        Ok(None)
    }
}
