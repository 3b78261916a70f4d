use anyhow::Context;
use clap::Parser;
use pingora::server::configuration::Opt;
use pingora::server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use thumbsmith::config::Config;
use thumbsmith::server::ThumbService;
use thumbsmith::thumb::{Derivation, Thumb};

/// Thumbsmith - lazy thumbnail derivation server built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "thumbsmith")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,

    /// Derive one thumbnail with the configured defaults, print its path and exit
    #[arg(long, value_name = "IMAGE")]
    generate: Option<String>,
}

fn generate_once(thumb: Thumb, image: &str) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let options = thumb.config().defaults.clone();
    let derivation = runtime
        .block_on(thumb.get_or_create_thumbnail(image, &options))
        .with_context(|| format!("Failed to derive thumbnail for {}", image))?;

    match derivation {
        Derivation::Existing(path) | Derivation::Created(path) => println!("{}", path.display()),
        Derivation::Placeholder(url) => println!("{}", url),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging subsystem
    thumbsmith::logging::init_subscriber()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        url_prefix = %config.server.url_prefix,
        remote_enabled = config.remote.enabled,
        "Configuration loaded successfully"
    );

    let listen_addr = config.server.listen_address();
    let thumb = Thumb::from_config(config).context("Invalid configuration")?;

    if args.test {
        tracing::info!(config_file = %args.config.display(), "Configuration test passed");
        return Ok(());
    }

    if let Some(image) = args.generate.as_deref() {
        return generate_once(thumb, image);
    }

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt))
        .map_err(|e| anyhow::anyhow!("Failed to create Pingora server: {}", e))?;
    server.bootstrap();

    let service = ThumbService::new(Arc::new(thumb));
    let mut http_service = pingora_proxy::http_proxy_service(&server.configuration, service);
    http_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting Thumbsmith");

    server.add_service(http_service);

    // Blocks until shutdown
    server.run_forever();
}
