//! Common types shared by the SakuraCloud API modules

use lifecycle::ResourceId;
use serde::{Deserialize, Serialize};

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub is_fatal: bool,
    pub serial: Option<String>,
    pub status: Option<String>,
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
}

#[derive(Debug, Default, thiserror::Error)]
#[error("API error details: error_code={error_code:?}, serial={serial:?}, status={status:?}")]
pub struct ApiErrorDetails {
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
    pub serial: Option<String>,
    pub status: Option<String>,
}

impl From<ApiErrorResponse> for ApiErrorDetails {
    fn from(resp: ApiErrorResponse) -> Self {
        Self {
            error_code: resp.error_code,
            error_msg: resp.error_msg,
            serial: resp.serial,
            status: resp.status,
        }
    }
}

/// Reference to another resource, e.g. `{"ID": "113000000001"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    #[serde(rename = "ID")]
    pub id: ResourceId,
}

impl IdRef {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self { id: id.into() }
    }
}

/// Body of a shutdown request
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShutdownRequest {
    #[serde(rename = "Force")]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_tolerates_missing_fields() {
        let resp: ApiErrorResponse = serde_json::from_str(
            r#"{"is_fatal":true,"serial":"abc","status":"404 Not Found","error_code":"not_found","error_msg":"対象が見つかりません"}"#,
        )
        .unwrap();
        assert!(resp.is_fatal);
        assert_eq!(resp.error_code.as_deref(), Some("not_found"));

        let resp: ApiErrorResponse = serde_json::from_str("{}").unwrap();
        assert!(!resp.is_fatal);
        assert!(resp.error_msg.is_none());
    }

    #[test]
    fn id_ref_uses_string_ids_on_the_wire() {
        let json = serde_json::to_string(&IdRef::new(4u64)).unwrap();
        assert_eq!(json, r#"{"ID":"4"}"#);

        let parsed: IdRef = serde_json::from_str(r#"{"ID":112900000001}"#).unwrap();
        assert_eq!(parsed.id, ResourceId(112900000001));
    }

    #[test]
    fn shutdown_request_body() {
        let json = serde_json::to_string(&ShutdownRequest { force: true }).unwrap();
        assert_eq!(json, r#"{"Force":true}"#);
    }
}
