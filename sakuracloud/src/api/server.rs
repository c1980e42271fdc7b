use lifecycle::{Availability, Identified, InstanceStatus, ResourceId, ResourceState};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::ShutdownRequest;
use super::error::ApiError;

pub struct ServerApi<'a> {
    client: &'a Client,
    zone: String,
}

impl<'a> ServerApi<'a> {
    pub fn new(client: &'a Client, zone: &str) -> Self {
        Self {
            client,
            zone: zone.to_string(),
        }
    }

    pub async fn read(&self, id: ResourceId) -> Result<Server, ApiError> {
        let envelope: ServerEnvelope = self
            .client
            .get(&self.zone, &format!("/server/{}", id))
            .await?;
        Ok(envelope.server)
    }

    pub async fn boot(&self, id: ResourceId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .put(&self.zone, &format!("/server/{}/power", id))
            .await?;
        Ok(())
    }

    pub async fn shutdown(&self, id: ResourceId, force: bool) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .delete_with_body(
                &self.zone,
                &format!("/server/{}/power", id),
                &ShutdownRequest { force },
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    #[serde(rename = "Server")]
    server: Server,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Server {
    #[serde(rename = "ID")]
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub instance: Option<ServerInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInstance {
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub status_changed_at: Option<String>,
}

impl Server {
    pub fn status(&self) -> InstanceStatus {
        self.instance
            .as_ref()
            .map(|instance| instance.status)
            .unwrap_or_default()
    }
}

impl ResourceState for Server {
    fn availability(&self) -> Option<Availability> {
        Some(self.availability)
    }

    fn instance_status(&self) -> Option<InstanceStatus> {
        Some(self.status())
    }
}

impl Identified for Server {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server as MockServer};

    #[test]
    fn server_without_instance_reports_unknown_status() {
        let server: Server =
            serde_json::from_str(r#"{"ID":"113000000001","Availability":"available"}"#).unwrap();
        assert_eq!(server.id, ResourceId(113000000001));
        assert_eq!(server.availability(), Some(Availability::Available));
        assert_eq!(server.instance_status(), Some(InstanceStatus::Unknown));
    }

    #[tokio::test]
    async fn read_unwraps_server_envelope() {
        let mut mock_server = MockServer::new_async().await;
        let _m = mock_server
            .mock("GET", "/is1a/api/cloud/1.1/server/113000000001")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "Server": {
                    "ID": "113000000001",
                    "Name": "web01",
                    "Availability": "available",
                    "Instance": {"Status": "up", "StatusChangedAt": "2024-01-01T00:00:00+09:00"}
                },
                "is_ok": true
            }"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&mock_server.url());
        let server = client
            .server("is1a")
            .read(ResourceId(113000000001))
            .await
            .unwrap();

        assert_eq!(server.name, "web01");
        assert_eq!(server.status(), InstanceStatus::Up);
        assert_eq!(server.id(), ResourceId(113000000001));
    }

    #[tokio::test]
    async fn boot_puts_power() {
        let mut mock_server = MockServer::new_async().await;
        let mock = mock_server
            .mock("PUT", "/is1a/api/cloud/1.1/server/1/power")
            .with_body(r#"{"Success":true,"is_ok":true}"#)
            .create_async()
            .await;

        let client = create_test_client(&mock_server.url());
        client.server("is1a").boot(ResourceId(1)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn shutdown_deletes_power_with_force_flag() {
        let mut mock_server = MockServer::new_async().await;
        let mock = mock_server
            .mock("DELETE", "/is1a/api/cloud/1.1/server/1/power")
            .match_body(Matcher::Json(serde_json::json!({"Force": true})))
            .with_body(r#"{"Success":true,"is_ok":true}"#)
            .create_async()
            .await;

        let client = create_test_client(&mock_server.url());
        client
            .server("is1a")
            .shutdown(ResourceId(1), true)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_server_is_not_found() {
        let mut mock_server = MockServer::new_async().await;
        let _m = mock_server
            .mock("GET", "/is1a/api/cloud/1.1/server/2")
            .with_status(404)
            .with_body(r#"{"is_fatal":true,"status":"404 Not Found","error_code":"not_found","error_msg":"not found"}"#)
            .create_async()
            .await;

        let client = create_test_client(&mock_server.url());
        let err = client.server("is1a").read(ResourceId(2)).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
