use clap::{Parser, Subcommand, ValueEnum};
use lifecycle::{Context, PowerOptions, ResourceId};
use sakuracloud::{Power, ProviderConfig, ProviderSettings};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sakuracloud-power")]
#[command(about = "Boot or shut down SakuraCloud servers and appliances", version)]
struct Cli {
    /// Target zone
    #[arg(long, global = true, env = "SAKURACLOUD_ZONE")]
    zone: Option<String>,

    /// Give up waiting after this many seconds (default: 20 minutes)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot a resource and wait until it is up
    Boot {
        kind: ResourceKind,
        id: ResourceId,
    },
    /// Shut a resource down and wait until it is down
    Shutdown {
        kind: ResourceKind,
        id: ResourceId,

        /// Force power off instead of an ACPI shutdown
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResourceKind {
    Server,
    LoadBalancer,
    Database,
    VpcRouter,
    Nfs,
    MobileGateway,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = ProviderConfig::resolve(ProviderSettings {
        zone: cli.zone.clone(),
        ..Default::default()
    })?;
    let client = config.client()?;
    let power = Power::new(client).with_options(PowerOptions {
        timeout: cli.timeout.map(Duration::from_secs).unwrap_or_default(),
        ..Default::default()
    });

    let ctx = Context::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let zone = config.zone.as_str();
    let target = id_of(&cli.command);
    let result = match cli.command {
        Commands::Boot { kind, id } => match kind {
            ResourceKind::Server => power.boot_server(&ctx, zone, id).await,
            ResourceKind::LoadBalancer => power.boot_load_balancer(&ctx, zone, id).await,
            ResourceKind::Database => power.boot_database(&ctx, zone, id).await,
            ResourceKind::VpcRouter => power.boot_vpc_router(&ctx, zone, id).await,
            ResourceKind::Nfs => power.boot_nfs(&ctx, zone, id).await,
            ResourceKind::MobileGateway => power.boot_mobile_gateway(&ctx, zone, id).await,
        },
        Commands::Shutdown { kind, id, force } => match kind {
            ResourceKind::Server => power.shutdown_server(&ctx, zone, id, force).await,
            ResourceKind::LoadBalancer => {
                power.shutdown_load_balancer(&ctx, zone, id, force).await
            }
            ResourceKind::Database => power.shutdown_database(&ctx, zone, id, force).await,
            ResourceKind::VpcRouter => power.shutdown_vpc_router(&ctx, zone, id, force).await,
            ResourceKind::Nfs => power.shutdown_nfs(&ctx, zone, id, force).await,
            ResourceKind::MobileGateway => {
                power.shutdown_mobile_gateway(&ctx, zone, id, force).await
            }
        },
    };

    if let Err(err) = &result {
        tracing::error!(
            "Power operation on {} in zone {} failed: {}",
            target,
            zone,
            err
        );
    }
    result?;

    Ok(())
}

fn id_of(command: &Commands) -> ResourceId {
    match command {
        Commands::Boot { id, .. } | Commands::Shutdown { id, .. } => *id,
    }
}
