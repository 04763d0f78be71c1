//! Client side of the game API.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::dto::{
    action::{AckResponse, JoinResponse, ReconnectResponse},
    game::GameSnapshot,
};

/// Failure talking to the game server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with an error body.
    #[error("server rejected request ({status} {code}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Symbolic error code from the body.
        code: String,
        /// Human readable explanation.
        message: String,
    },
    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the server explicitly answered "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Rejected { status: 404, .. })
    }
}

/// Operations the sync agent and the reconnection resolver need from the server.
pub trait SyncTransport: Send + Sync {
    /// `GET /api/game`, public projection.
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<GameSnapshot, TransportError>>;
    /// `reconnect` action.
    fn reconnect<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, Result<ReconnectResponse, TransportError>>;
    /// `join` action.
    fn join<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<JoinResponse, TransportError>>;
    /// `heartbeat` action.
    fn heartbeat<'a>(&'a self, username: &'a str)
    -> BoxFuture<'a, Result<AckResponse, TransportError>>;
}

#[cfg(feature = "sync-client")]
pub use self::http::HttpTransport;

#[cfg(feature = "sync-client")]
mod http {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use reqwest::{Client, RequestBuilder, Response};
    use serde::de::DeserializeOwned;
    use serde_json::json;

    use super::{SyncTransport, TransportError};
    use crate::{
        dto::{
            action::{AckResponse, JoinResponse, ReconnectResponse},
            game::GameSnapshot,
        },
        error::ErrorBody,
    };

    const GAME_PATH: &str = "/api/game";

    /// [`SyncTransport`] over HTTP with a per-request timeout.
    #[derive(Clone)]
    pub struct HttpTransport {
        client: Client,
        base_url: String,
    }

    impl HttpTransport {
        /// Build a transport for `base_url`; every request gives up after `timeout`.
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| TransportError::Network(err.to_string()))?;
            Ok(Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_owned(),
            })
        }

        fn url(&self) -> String {
            format!("{}{GAME_PATH}", self.base_url)
        }

        async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, TransportError> {
            let response = request
                .send()
                .await
                .map_err(|err| TransportError::Network(err.to_string()))?;
            decode(response).await
        }

        async fn action<T: DeserializeOwned>(
            &self,
            body: serde_json::Value,
        ) -> Result<T, TransportError> {
            Self::send(self.client.post(self.url()).json(&body)).await
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|err| TransportError::Decode(err.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.error, body.message),
            Err(_) => (status.to_string(), text),
        };
        Err(TransportError::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }

    impl SyncTransport for HttpTransport {
        fn fetch_snapshot(&self) -> BoxFuture<'_, Result<GameSnapshot, TransportError>> {
            Box::pin(Self::send(self.client.get(self.url())))
        }

        fn reconnect<'a>(
            &'a self,
            username: &'a str,
        ) -> BoxFuture<'a, Result<ReconnectResponse, TransportError>> {
            Box::pin(self.action(json!({"action": "reconnect", "username": username})))
        }

        fn join<'a>(
            &'a self,
            username: &'a str,
        ) -> BoxFuture<'a, Result<JoinResponse, TransportError>> {
            Box::pin(self.action(json!({"action": "join", "username": username})))
        }

        fn heartbeat<'a>(
            &'a self,
            username: &'a str,
        ) -> BoxFuture<'a, Result<AckResponse, TransportError>> {
            Box::pin(self.action(json!({"action": "heartbeat", "username": username})))
        }
    }
}
