use lifecycle::{Context, LifecycleError, OperationError, ResourceId, RetryPlan, RetryableSetup};

use crate::api::{Client, CreateDiskRequest, Disk, DiskConnection, DiskPlan, IdRef};

const DEFAULT_DISK_SIZE_GB: u64 = 20;

/// Creates a disk and waits until its copy is available.
///
/// A copy ending in `failed` is deleted and the disk is created again,
/// following the builder's [`RetryPlan`].
#[derive(Clone)]
pub struct DiskBuilder {
    client: Client,
    name: String,
    description: String,
    tags: Vec<String>,
    plan: DiskPlan,
    connection: DiskConnection,
    size_gb: u64,
    source_archive: Option<ResourceId>,
    source_disk: Option<ResourceId>,
    retry_plan: RetryPlan,
}

impl DiskBuilder {
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            plan: DiskPlan::default(),
            connection: DiskConnection::default(),
            size_gb: DEFAULT_DISK_SIZE_GB,
            source_archive: None,
            source_disk: None,
            retry_plan: RetryPlan::default(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn plan(mut self, plan: DiskPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn connection(mut self, connection: DiskConnection) -> Self {
        self.connection = connection;
        self
    }

    pub fn size_gb(mut self, size_gb: u64) -> Self {
        self.size_gb = size_gb;
        self
    }

    pub fn source_archive(mut self, id: ResourceId) -> Self {
        self.source_archive = Some(id);
        self
    }

    pub fn source_disk(mut self, id: ResourceId) -> Self {
        self.source_disk = Some(id);
        self
    }

    pub fn retry_plan(mut self, plan: RetryPlan) -> Self {
        self.retry_plan = plan;
        self
    }

    fn request(&self) -> CreateDiskRequest {
        CreateDiskRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            plan: IdRef::new(self.plan.id()),
            connection: self.connection,
            size_mb: self.size_gb * 1024,
            source_archive: self.source_archive.map(IdRef::new),
            source_disk: self.source_disk.map(IdRef::new),
        }
    }

    pub async fn build(&self, ctx: &Context, zone: &str) -> lifecycle::Result<Disk> {
        if self.source_archive.is_some() && self.source_disk.is_some() {
            return Err(LifecycleError::Precondition(
                "source archive and source disk can not be used at the same time",
            ));
        }

        let request = self.request();
        let create_client = self.client.clone();
        let read_client = self.client.clone();
        let delete_client = self.client.clone();

        let disk = RetryableSetup::new(move |_ctx, zone| {
            let client = create_client.clone();
            let request = request.clone();
            async move {
                client
                    .disk(&zone)
                    .create(&request)
                    .await
                    .map_err(OperationError::from)
            }
        })
        .read(move |_ctx, zone, id| {
            let client = read_client.clone();
            async move { client.disk(&zone).read(id).await.map_err(OperationError::from) }
        })
        .delete(move |_ctx, zone, id| {
            let client = delete_client.clone();
            async move { client.disk(&zone).delete(id).await.map_err(OperationError::from) }
        })
        .wait_for_copy(true)
        .retry_plan(self.retry_plan.clone())
        .setup(ctx, zone)
        .await?;

        tracing::info!("Disk {} ({}) is available in zone {}", disk.id, disk.name, zone);
        Ok(disk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::RetryConfig;

    fn client() -> Client {
        Client::with_config(
            "http://127.0.0.1:1",
            "token",
            "secret",
            RetryConfig {
                max_retries: 0,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn request_converts_size_and_sources() {
        let request = DiskBuilder::new(client(), "os")
            .plan(DiskPlan::Hdd)
            .size_gb(40)
            .source_archive(ResourceId(112900000001))
            .request();

        assert_eq!(request.size_mb, 40 * 1024);
        assert_eq!(request.plan, IdRef::new(2u64));
        assert_eq!(request.source_archive, Some(IdRef::new(112900000001u64)));
        assert!(request.source_disk.is_none());
    }

    #[tokio::test]
    async fn both_sources_are_rejected_before_any_request() {
        let err = DiskBuilder::new(client(), "os")
            .source_archive(ResourceId(1))
            .source_disk(ResourceId(2))
            .build(&Context::new(), "is1a")
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Precondition(_)));
        assert_eq!(
            err.to_string(),
            "precondition failed: source archive and source disk can not be used at the same time"
        );
    }
}
