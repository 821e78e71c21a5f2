use anyhow::Result;
use clap::Parser;
use lookout_client::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lookout", about = "Live-video face identification client")]
struct Cli {
    /// Camera identifier stamped into outbound requests
    #[arg(long)]
    camera_id: Option<String>,
    /// Disable the registration channel
    #[arg(long)]
    no_register: bool,
    /// Disable the recognition channel
    #[arg(long)]
    no_recognition: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(camera_id) = cli.camera_id {
        config.camera_id = camera_id;
    }
    if cli.no_register {
        config.register_enabled = false;
    }
    if cli.no_recognition {
        config.recognition_enabled = false;
    }

    tracing::info!(
        camera_id = %config.camera_id,
        register = config.register_enabled,
        recognition = config.recognition_enabled,
        "lookout starting"
    );

    // Capture, detection, and rendering are platform collaborators wired
    // by the embedding build (see lookout_client::io and
    // lookout_core::tracker for the traits). Without them there is
    // nothing to drive, and startup failures are fatal by design.
    anyhow::bail!(
        "no capture backend configured: provide FrameSource, FaceDetector, \
         SingleTracker, and Renderer implementations and start App::run"
    )
}
