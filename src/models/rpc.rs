//! Wire types for the RPC surface
//!
//! Field names match the service's protobuf messages so existing clients can
//! map them one to one. Byte payloads travel as base64 strings.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// FetchContent request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub redirect: bool,
}

/// FetchContent response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(with = "base64_bytes")]
    pub content: Bytes,
}

/// GetRandomProxy request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomProxyRequest {
    #[serde(default)]
    pub session: String,
}

/// GetRandomProxy response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomProxyResponse {
    pub proxy: String,
    pub success: bool,
    pub message: String,
}

impl RandomProxyResponse {
    pub fn selected(proxy: String, session: &str) -> Self {
        Self {
            proxy,
            success: true,
            message: format!("Proxy selected for session '{}'", session),
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            proxy: String::new(),
            success: false,
            message,
        }
    }
}

/// GetProxyStats request (no fields)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyStatsRequest {}

/// GetProxyStats response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyStatsResponse {
    pub proxy_count_by_session: BTreeMap<String, i32>,
    pub total_valid_proxies: i32,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
