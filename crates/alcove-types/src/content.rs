use serde::{Deserialize, Serialize};

/// Message content as the server and store see it: an opaque string, normally
/// a sealed envelope produced client-side. The server never inspects it and
/// has no way to turn it back into plaintext — decryption lives in the client
/// crates, which are the only place a plaintext type exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueBody(String);

impl OpaqueBody {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for OpaqueBody {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
