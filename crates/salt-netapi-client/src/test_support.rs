//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::error::{NetapiError, Result};
use crate::transport::{OutboundRequest, Transport};
use crate::{ClientConfig, SaltClient};

pub const TEST_TOKEN: &str = "6d2ddbbc7b5f6b7f4c5d1b2a5f0e1f9b62d3c4a7";
pub const SAMPLE_JOB_ID: &str = "20200120025629463543";

/// In-memory transport that replays queued responses and records requests.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<Vec<u8>>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl RecordingTransport {
    pub fn push_ok(&self, body: &[u8]) {
        self.responses.lock().push_back(Ok(body.to_vec()));
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.responses.lock().push_back(Err(NetapiError::RequestFailed {
            status,
            body: body.to_string(),
        }));
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<Vec<u8>> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(NetapiError::MalformedResponse("no response queued".into())))
    }
}

pub fn recording_client() -> (SaltClient, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let config = ClientConfig::new("https://master:8000", "salt", "secret");
    (SaltClient::with_transport(&config, transport.clone()), transport)
}

/// Client pointed at `server`, not yet logged in.
pub fn mock_client(server: &MockServer) -> SaltClient {
    let config = ClientConfig::new(server.uri(), "salt", "secret");
    SaltClient::new(&config).unwrap()
}

pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "return": [{
                "perms": [".*", "@wheel", "@runner"],
                "start": 1_580_677_351.414_902_2,
                "token": TEST_TOKEN,
                "expire": 1_580_720_551.414_902_7,
                "user": "salt",
                "eauth": "pam"
            }]
        })))
        .mount(server)
        .await;
}

/// Client pointed at `server` that has completed a login.
pub async fn logged_in_client(server: &MockServer) -> SaltClient {
    mount_login(server).await;
    let client = mock_client(server);
    client.login().await.unwrap();
    client
}
