//! Socket-proxy server binary.

use clap::Parser;
use server::{Config, OsBackend, Server};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sockgate-server")]
#[command(about = "User-space socket proxy server")]
struct Args {
    /// Path to configuration file
    config: Option<PathBuf>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    server::logging::init(&config.logging);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pipe_capacity = config.limits.pipe_capacity,
        "sockgate starting"
    );

    match Server::start(&config, Arc::new(OsBackend)) {
        Ok(server) => server.join(),
        Err(e) => {
            eprintln!("Server error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_default_config() {
    let config = r#"# sockgate server configuration

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"

# Output format: "pretty", "json", or "compact"
format = "pretty"

# Include timestamps / event targets / thread names
timestamps = true
target = false
thread_names = true

[limits]
# Per-direction capacity of each stream data pipe, in bytes
pipe_capacity = 65536

# I/O buffers to preallocate in the pool
buffer_reserve = 16
"#;
    print!("{config}");
}
