use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use backend::{
    AppState,
    config::EngineConfig,
    create_router,
    directions_client::{DEFAULT_BASE_URL, DirectionsService, MapboxDirections},
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about = "Expedition route planning and debrief replay API")]
struct Args {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Access token for the directions service; without it every plan is straight-line
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN")]
    mapbox_token: Option<String>,

    #[arg(long, env = "DIRECTIONS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    directions_url: String,

    /// JSON file overriding engine defaults
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backend=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let config = EngineConfig::from_file(path).expect("load engine config");
            tracing::info!("loaded engine config from {}", path.display());
            config
        }
        None => EngineConfig::default(),
    };

    let directions = match args.mapbox_token.as_deref() {
        Some(token) => {
            let client = MapboxDirections::new(
                &args.directions_url,
                token,
                config.fetcher.max_waypoints_per_request,
            )
            .expect("build directions client");
            tracing::info!("directions service at {}", args.directions_url);
            Some(Arc::new(client) as Arc<dyn DirectionsService>)
        }
        None => {
            tracing::warn!("MAPBOX_ACCESS_TOKEN not set, routes will be straight lines");
            None
        }
    };

    let state = AppState {
        directions,
        config: Arc::new(config),
    };
    let app = create_router(state);

    tracing::info!("starting backend on http://{}", args.bind);
    tracing::info!("  POST /api/route/plan - Stitched multi-waypoint directions");
    tracing::info!("  POST /api/route/gpx - GPX export");
    tracing::info!("  POST /api/debrief/tour - Chronological tour with route positions");
    tracing::info!("  POST /api/debrief/transition - Camera keyframes between two stops");
    axum::serve(tokio::net::TcpListener::bind(args.bind).await.unwrap(), app)
        .await
        .unwrap();
}
