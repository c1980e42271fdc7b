use lifecycle::{Availability, Identified, InstanceStatus, ResourceId, ResourceState};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::client::Client;
use super::common::{IdRef, ShutdownRequest};
use super::error::ApiError;

/// Load balancers, databases, VPC routers, NFS and mobile gateways all live
/// under `/appliance` and share its power endpoints.
pub struct ApplianceApi<'a> {
    client: &'a Client,
    zone: String,
}

impl<'a> ApplianceApi<'a> {
    pub fn new(client: &'a Client, zone: &str) -> Self {
        Self {
            client,
            zone: zone.to_string(),
        }
    }

    pub async fn create(&self, request: &CreateApplianceRequest) -> Result<Appliance, ApiError> {
        let envelope: ApplianceEnvelope<Appliance> = self
            .client
            .post(
                &self.zone,
                "/appliance",
                &ApplianceEnvelope { appliance: request },
            )
            .await?;
        Ok(envelope.appliance)
    }

    pub async fn read(&self, id: ResourceId) -> Result<Appliance, ApiError> {
        let envelope: ApplianceEnvelope<Appliance> = self
            .client
            .get(&self.zone, &format!("/appliance/{}", id))
            .await?;
        Ok(envelope.appliance)
    }

    pub async fn delete(&self, id: ResourceId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .delete(&self.zone, &format!("/appliance/{}", id))
            .await?;
        Ok(())
    }

    pub async fn boot(&self, id: ResourceId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .put(&self.zone, &format!("/appliance/{}/power", id))
            .await?;
        Ok(())
    }

    pub async fn shutdown(&self, id: ResourceId, force: bool) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .delete_with_body(
                &self.zone,
                &format!("/appliance/{}/power", id),
                &ShutdownRequest { force },
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApplianceEnvelope<T> {
    #[serde(rename = "Appliance")]
    appliance: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplianceClass {
    #[serde(rename = "loadbalancer")]
    LoadBalancer,
    #[serde(rename = "database")]
    Database,
    #[serde(rename = "vpcrouter")]
    VpcRouter,
    #[serde(rename = "nfs")]
    Nfs,
    #[serde(rename = "mobilegateway")]
    MobileGateway,
}

impl ApplianceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplianceClass::LoadBalancer => "loadbalancer",
            ApplianceClass::Database => "database",
            ApplianceClass::VpcRouter => "vpcrouter",
            ApplianceClass::Nfs => "nfs",
            ApplianceClass::MobileGateway => "mobilegateway",
        }
    }
}

impl fmt::Display for ApplianceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateApplianceRequest {
    pub class: ApplianceClass,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub plan: IdRef,
    /// Class-specific hardware description
    pub remark: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Appliance {
    #[serde(rename = "ID")]
    pub id: ResourceId,
    pub class: ApplianceClass,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub instance: Option<ApplianceInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplianceInstance {
    #[serde(default)]
    pub status: InstanceStatus,
}

impl Appliance {
    pub fn status(&self) -> InstanceStatus {
        self.instance
            .as_ref()
            .map(|instance| instance.status)
            .unwrap_or_default()
    }
}

impl ResourceState for Appliance {
    fn availability(&self) -> Option<Availability> {
        Some(self.availability)
    }

    fn instance_status(&self) -> Option<InstanceStatus> {
        Some(self.status())
    }
}

impl Identified for Appliance {
    fn id(&self) -> ResourceId {
        self.id
    }
}
