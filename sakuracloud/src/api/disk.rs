use lifecycle::{Availability, Identified, ResourceId, ResourceState};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::client::Client;
use super::common::IdRef;
use super::error::ApiError;

pub struct DiskApi<'a> {
    client: &'a Client,
    zone: String,
}

impl<'a> DiskApi<'a> {
    pub fn new(client: &'a Client, zone: &str) -> Self {
        Self {
            client,
            zone: zone.to_string(),
        }
    }

    /// Creates the disk. The returned disk is usually still `migrating`.
    pub async fn create(&self, request: &CreateDiskRequest) -> Result<Disk, ApiError> {
        let envelope: DiskEnvelope<Disk> = self
            .client
            .post(&self.zone, "/disk", &DiskEnvelope { disk: request })
            .await?;
        Ok(envelope.disk)
    }

    pub async fn read(&self, id: ResourceId) -> Result<Disk, ApiError> {
        let envelope: DiskEnvelope<Disk> = self
            .client
            .get(&self.zone, &format!("/disk/{}", id))
            .await?;
        Ok(envelope.disk)
    }

    pub async fn delete(&self, id: ResourceId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .delete(&self.zone, &format!("/disk/{}", id))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskEnvelope<T> {
    #[serde(rename = "Disk")]
    disk: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskPlan {
    #[default]
    Ssd,
    Hdd,
}

impl DiskPlan {
    pub fn id(&self) -> u64 {
        match self {
            DiskPlan::Ssd => 4,
            DiskPlan::Hdd => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskConnection {
    #[default]
    Virtio,
    Ide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDiskRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub plan: IdRef,
    pub connection: DiskConnection,
    #[serde(rename = "SizeMB")]
    pub size_mb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_archive: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_disk: Option<IdRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Disk {
    #[serde(rename = "ID")]
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(rename = "SizeMB", default)]
    pub size_mb: u64,
    #[serde(default)]
    pub connection: Option<DiskConnection>,
    #[serde(default)]
    pub source_archive: Option<IdRef>,
    #[serde(default)]
    pub source_disk: Option<IdRef>,
}

impl ResourceState for Disk {
    fn availability(&self) -> Option<Availability> {
        Some(self.availability)
    }
}

impl Identified for Disk {
    fn id(&self) -> ResourceId {
        self.id
    }
}
