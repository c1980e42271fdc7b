//! Boot / shutdown of SakuraCloud compute-class resources
//!
//! Servers use the `/server/{id}/power` endpoint, every appliance class uses
//! `/appliance/{id}/power`. Both are driven by the retrying power loop in
//! [`lifecycle::power`].

use async_trait::async_trait;
use lifecycle::{power, Context, OperationError, PowerHandler, PowerOptions, ResourceId};

use crate::api::{Appliance, ApplianceClass, Client, Server};

pub struct ServerPowerHandler {
    client: Client,
    zone: String,
    id: ResourceId,
}

impl ServerPowerHandler {
    pub fn new(client: Client, zone: &str, id: ResourceId) -> Self {
        Self {
            client,
            zone: zone.to_string(),
            id,
        }
    }
}

#[async_trait]
impl PowerHandler for ServerPowerHandler {
    type State = Server;

    async fn boot(&self) -> Result<(), OperationError> {
        tracing::debug!("Booting server {} in zone {}", self.id, self.zone);
        Ok(self.client.server(&self.zone).boot(self.id).await?)
    }

    async fn shutdown(&self, force: bool) -> Result<(), OperationError> {
        tracing::debug!(
            "Shutting down server {} in zone {} (force: {})",
            self.id,
            self.zone,
            force
        );
        Ok(self.client.server(&self.zone).shutdown(self.id, force).await?)
    }

    async fn read(&self) -> Result<Server, OperationError> {
        Ok(self.client.server(&self.zone).read(self.id).await?)
    }
}

/// Power handler shared by every appliance class
pub struct AppliancePowerHandler {
    client: Client,
    zone: String,
    id: ResourceId,
    class: ApplianceClass,
}

impl AppliancePowerHandler {
    pub fn new(client: Client, zone: &str, id: ResourceId, class: ApplianceClass) -> Self {
        Self {
            client,
            zone: zone.to_string(),
            id,
            class,
        }
    }
}

#[async_trait]
impl PowerHandler for AppliancePowerHandler {
    type State = Appliance;

    async fn boot(&self) -> Result<(), OperationError> {
        tracing::debug!("Booting {} {} in zone {}", self.class, self.id, self.zone);
        Ok(self.client.appliance(&self.zone).boot(self.id).await?)
    }

    async fn shutdown(&self, force: bool) -> Result<(), OperationError> {
        tracing::debug!(
            "Shutting down {} {} in zone {} (force: {})",
            self.class,
            self.id,
            self.zone,
            force
        );
        Ok(self
            .client
            .appliance(&self.zone)
            .shutdown(self.id, force)
            .await?)
    }

    /// Fails when the ID belongs to an appliance of another class.
    async fn read(&self) -> Result<Appliance, OperationError> {
        let appliance = self.client.appliance(&self.zone).read(self.id).await?;
        if appliance.class != self.class {
            return Err(OperationError::other(format!(
                "appliance {} is a {}, not a {}",
                self.id, appliance.class, self.class
            )));
        }
        Ok(appliance)
    }
}

/// Power operations for every resource kind that has a power state
#[derive(Clone)]
pub struct Power {
    client: Client,
    options: PowerOptions,
}

impl Power {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            options: PowerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PowerOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn boot_server(&self, ctx: &Context, zone: &str, id: ResourceId) -> lifecycle::Result<()> {
        let handler = ServerPowerHandler::new(self.client.clone(), zone, id);
        power::boot(ctx, handler, &self.options).await?;
        tracing::info!("Server {} in zone {} is up", id, zone);
        Ok(())
    }

    pub async fn shutdown_server(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        force: bool,
    ) -> lifecycle::Result<()> {
        let handler = ServerPowerHandler::new(self.client.clone(), zone, id);
        power::shutdown(ctx, handler, force, &self.options).await?;
        tracing::info!("Server {} in zone {} is down", id, zone);
        Ok(())
    }

    pub async fn boot_load_balancer(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
    ) -> lifecycle::Result<()> {
        self.boot_appliance(ctx, zone, id, ApplianceClass::LoadBalancer)
            .await
    }

    pub async fn shutdown_load_balancer(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        force: bool,
    ) -> lifecycle::Result<()> {
        self.shutdown_appliance(ctx, zone, id, ApplianceClass::LoadBalancer, force)
            .await
    }

    pub async fn boot_database(&self, ctx: &Context, zone: &str, id: ResourceId) -> lifecycle::Result<()> {
        self.boot_appliance(ctx, zone, id, ApplianceClass::Database)
            .await
    }

    pub async fn shutdown_database(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        force: bool,
    ) -> lifecycle::Result<()> {
        self.shutdown_appliance(ctx, zone, id, ApplianceClass::Database, force)
            .await
    }

    pub async fn boot_vpc_router(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
    ) -> lifecycle::Result<()> {
        self.boot_appliance(ctx, zone, id, ApplianceClass::VpcRouter)
            .await
    }

    pub async fn shutdown_vpc_router(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        force: bool,
    ) -> lifecycle::Result<()> {
        self.shutdown_appliance(ctx, zone, id, ApplianceClass::VpcRouter, force)
            .await
    }

    pub async fn boot_nfs(&self, ctx: &Context, zone: &str, id: ResourceId) -> lifecycle::Result<()> {
        self.boot_appliance(ctx, zone, id, ApplianceClass::Nfs).await
    }

    pub async fn shutdown_nfs(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        force: bool,
    ) -> lifecycle::Result<()> {
        self.shutdown_appliance(ctx, zone, id, ApplianceClass::Nfs, force)
            .await
    }

    pub async fn boot_mobile_gateway(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
    ) -> lifecycle::Result<()> {
        self.boot_appliance(ctx, zone, id, ApplianceClass::MobileGateway)
            .await
    }

    pub async fn shutdown_mobile_gateway(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        force: bool,
    ) -> lifecycle::Result<()> {
        self.shutdown_appliance(ctx, zone, id, ApplianceClass::MobileGateway, force)
            .await
    }

    async fn boot_appliance(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        class: ApplianceClass,
    ) -> lifecycle::Result<()> {
        let handler = AppliancePowerHandler::new(self.client.clone(), zone, id, class);
        handler.read().await?;
        power::boot(ctx, handler, &self.options).await?;
        tracing::info!("{} {} in zone {} is up", class, id, zone);
        Ok(())
    }

    async fn shutdown_appliance(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        class: ApplianceClass,
        force: bool,
    ) -> lifecycle::Result<()> {
        let handler = AppliancePowerHandler::new(self.client.clone(), zone, id, class);
        handler.read().await?;
        power::shutdown(ctx, handler, force, &self.options).await?;
        tracing::info!("{} {} in zone {} is down", class, id, zone);
        Ok(())
    }
}
