//! FBX2GLB Server - HTTP front end for FBX2glTF

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fbx2glb_server::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fbx2glb_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FBX2GLB server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    api::serve(config).await
}
