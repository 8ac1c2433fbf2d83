use hyper::body::Bytes;
use serde::{Deserialize, Serialize};

/// Body of a `POST /message/send` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

impl Payload {
    pub fn new(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            message: message.into(),
        }
    }

    /// Serializes the payload to the JSON bytes put on the wire.
    pub fn encode(&self) -> Bytes {
        // Two string fields cannot fail to serialize.
        serde_json::to_vec(self).map(Bytes::from).unwrap_or_default()
    }

    pub fn decode(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    pub fn is_complete(&self) -> bool {
        !self.to.is_empty() && !self.message.is_empty()
    }
}
