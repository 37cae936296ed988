use anyhow::Result;
use clap::Parser;
use tracing::info;
use voicelink::audio::{cpal_backend, CaptureBackendFactory};
use voicelink::Config;

#[derive(Parser)]
#[command(name = "voicelink", about = "Realtime voice-assistant session core")]
struct Cli {
    /// Path to the config file (TOML, extension optional)
    #[arg(short, long, default_value = "config/voicelink")]
    config: String,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("voicelink v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!(
        "Capture {}Hz / playback {}Hz, {} samples per frame",
        cfg.audio.capture_sample_rate, cfg.audio.playback_sample_rate, cfg.audio.frame_samples
    );
    info!("Transport endpoint: {}", cfg.transport.url);

    if cli.list_devices {
        println!("Input devices:");
        for name in cpal_backend::list_input_devices()? {
            println!("  {}", name);
        }

        println!("Output devices:");
        for name in cpal_backend::list_output_devices()? {
            println!("  {}", name);
        }

        return Ok(());
    }

    let capture = CaptureBackendFactory::create(cfg.capture_config())?;
    info!("Capture backend ready: {}", capture.name());

    info!("Session wiring requires a transport implementation; see the library API");
    info!("Run with --list-devices to probe audio hardware");

    Ok(())
}
