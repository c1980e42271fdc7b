use lifecycle::{power, Context, OperationError, PowerOptions, RetryPlan, RetryableSetup};
use serde_json::json;

use super::into_operation_error;
use crate::api::{Appliance, ApplianceClass, Client, CreateApplianceRequest, IdRef};
use crate::power::AppliancePowerHandler;

const STANDARD_PLAN_ID: u64 = 1;
const DEFAULT_ROUTER_VERSION: u32 = 2;
/// Not-found reads tolerated while a new router is not yet visible
pub const DEFAULT_NOT_FOUND_RETRY: u32 = 5;

/// Creates a standard-plan VPC router connected to the shared segment.
///
/// With `boot_after_create` the router is booted once its copy is done and
/// the build returns only after it reports `up`.
#[derive(Clone)]
pub struct VpcRouterBuilder {
    client: Client,
    name: String,
    description: String,
    tags: Vec<String>,
    version: u32,
    internet_connection: bool,
    boot_after_create: bool,
    power_options: PowerOptions,
    retry_plan: RetryPlan,
}

impl VpcRouterBuilder {
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            version: DEFAULT_ROUTER_VERSION,
            internet_connection: true,
            boot_after_create: false,
            power_options: PowerOptions::default(),
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

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn internet_connection(mut self, enabled: bool) -> Self {
        self.internet_connection = enabled;
        self
    }

    pub fn boot_after_create(mut self, boot: bool) -> Self {
        self.boot_after_create = boot;
        self
    }

    pub fn power_options(mut self, options: PowerOptions) -> Self {
        self.power_options = options;
        self
    }

    pub fn retry_plan(mut self, plan: RetryPlan) -> Self {
        self.retry_plan = plan;
        self
    }

    fn request(&self) -> CreateApplianceRequest {
        let enabled = if self.internet_connection { "True" } else { "False" };

        CreateApplianceRequest {
            class: ApplianceClass::VpcRouter,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            plan: IdRef::new(STANDARD_PLAN_ID),
            remark: json!({
                "Router": {"VPCRouterVersion": self.version},
                "Servers": [{}],
                "Switch": {"Scope": "shared"},
            }),
            settings: Some(json!({
                "Router": {"InternetConnection": {"Enabled": enabled}},
            })),
        }
    }

    fn plan(&self) -> RetryPlan {
        let mut plan = self.retry_plan.clone();
        if plan.not_found_retry == 0 {
            plan.not_found_retry = DEFAULT_NOT_FOUND_RETRY;
        }
        plan
    }

    pub async fn build(&self, ctx: &Context, zone: &str) -> lifecycle::Result<Appliance> {
        let request = self.request();
        let create_client = self.client.clone();
        let read_client = self.client.clone();
        let delete_client = self.client.clone();

        let mut setup = RetryableSetup::new(move |_ctx, zone| {
            let client = create_client.clone();
            let request = request.clone();
            async move {
                client
                    .appliance(&zone)
                    .create(&request)
                    .await
                    .map_err(OperationError::from)
            }
        })
        .read(move |_ctx, zone, id| {
            let client = read_client.clone();
            async move {
                client
                    .appliance(&zone)
                    .read(id)
                    .await
                    .map_err(OperationError::from)
            }
        })
        .delete(move |_ctx, zone, id| {
            let client = delete_client.clone();
            async move {
                client
                    .appliance(&zone)
                    .delete(id)
                    .await
                    .map_err(OperationError::from)
            }
        })
        .wait_for_copy(true)
        .retry_plan(self.plan());

        if self.boot_after_create {
            let power_client = self.client.clone();
            let options = self.power_options.clone();

            setup = setup
                .provision_before_up(move |ctx, zone, id, _state| {
                    let handler = AppliancePowerHandler::new(
                        power_client.clone(),
                        &zone,
                        id,
                        ApplianceClass::VpcRouter,
                    );
                    let options = options.clone();
                    async move {
                        power::boot(&ctx, handler, &options)
                            .await
                            .map_err(into_operation_error)
                    }
                })
                .wait_for_up(true);
        }

        let router = setup.setup(ctx, zone).await?;
        tracing::info!(
            "VPC router {} ({}) created in zone {}",
            router.id,
            router.name,
            zone
        );
        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new("http://127.0.0.1:1", "token", "secret").unwrap()
    }

    #[test]
    fn request_describes_standard_router() {
        let request = VpcRouterBuilder::new(client(), "router")
            .internet_connection(false)
            .request();

        assert_eq!(request.class, ApplianceClass::VpcRouter);
        assert_eq!(request.plan, IdRef::new(1u64));
        assert_eq!(request.remark["Router"]["VPCRouterVersion"], 2);
        assert_eq!(request.remark["Switch"]["Scope"], "shared");
        assert_eq!(
            request.settings.unwrap()["Router"]["InternetConnection"]["Enabled"],
            "False"
        );
    }

    #[test]
    fn plan_tolerates_not_found_reads() {
        let builder = VpcRouterBuilder::new(client(), "router");
        assert_eq!(builder.plan().not_found_retry, DEFAULT_NOT_FOUND_RETRY);

        let builder = builder.retry_plan(RetryPlan {
            not_found_retry: 1,
            ..Default::default()
        });
        assert_eq!(builder.plan().not_found_retry, 1);
    }
}
