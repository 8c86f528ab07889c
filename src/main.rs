use kvrouter::{ProxyServer, RouteClient};
use serde::Deserialize;
use std::fs;
use tracing_subscriber::{self, filter::LevelFilter, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOGO: &str = r#"
  _  ____     ______             _
 | |/ /\ \   / /  _ \ ___  _   _| |_ ___ _ __
 | ' /  \ \ / /| |_) / _ \| | | | __/ _ \ '__|
 | . \   \ V / |  _ < (_) | |_| | ||  __/ |
 |_|\_\   \_/  |_| \_\___/ \__,_|\__\___|_|
"#;

/// Server section of the configuration file
#[derive(Deserialize, Default)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

/// Cluster section of the configuration file
#[derive(Deserialize, Default)]
struct ClusterConfig {
    /// Comma-separated bootstrap node addresses
    #[serde(default = "default_bootstrap")]
    bootstrap: String,
}

fn default_bootstrap() -> String {
    "127.0.0.1:8088".to_string()
}

/// Logging section of the configuration file
#[derive(Deserialize, Default)]
struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root configuration structure
#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    cluster: ClusterConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Command line arguments structure
struct CliArgs {
    config_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    bootstrap: Option<String>,
    show_help: bool,
    show_version: bool,
}

fn print_help() {
    println!("{}", LOGO);
    println!(
        "kvrouter v{} - routing proxy for a sharded Raft key-value cluster",
        VERSION
    );
    println!();
    println!("USAGE:");
    println!("    kvrouter [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>        Path to configuration file (TOML format)");
    println!("    -H, --host <HOST>          Listen address (default: 127.0.0.1)");
    println!("    -p, --port <PORT>          Listen port (default: 6379)");
    println!("    -b, --bootstrap <ADDRS>    Comma-separated cluster bootstrap addresses");
    println!("                               (default: 127.0.0.1:8088)");
    println!("    -h, --help                 Print help information");
    println!("    -v, --version              Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Route through a three-node meta quorum");
    println!("    kvrouter -b 10.0.0.1:8088,10.0.0.2:8088,10.0.0.3:8088");
    println!();
    println!("    # Start with configuration file");
    println!("    kvrouter --config kvrouter.toml");
    println!();
    println!("CONFIGURATION FILE:");
    println!("    [server]");
    println!("    host = \"127.0.0.1\"");
    println!("    port = 6379");
    println!();
    println!("    [cluster]");
    println!("    bootstrap = \"127.0.0.1:8088\"");
    println!();
    println!("    [logging]");
    println!("    level = \"info\"       # trace, debug, info, warn, error");
}

fn print_version() {
    println!("kvrouter {}", VERSION);
}

/// Parse command line arguments
fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        host: None,
        port: None,
        bootstrap: None,
        show_help: false,
        show_version: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                cli.show_help = true;
                return cli;
            }
            "-v" | "--version" => {
                cli.show_version = true;
                return cli;
            }
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    cli.config_path = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: {} requires a file path argument", args[i]);
                    std::process::exit(1);
                }
            }
            "-H" | "--host" => {
                if i + 1 < args.len() {
                    cli.host = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: {} requires a host argument", args[i]);
                    std::process::exit(1);
                }
            }
            "-p" | "--port" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<u16>() {
                        Ok(port) => cli.port = Some(port),
                        Err(_) => {
                            eprintln!("Error: Invalid port number '{}'", args[i + 1]);
                            std::process::exit(1);
                        }
                    }
                    i += 1;
                } else {
                    eprintln!("Error: {} requires a port argument", args[i]);
                    std::process::exit(1);
                }
            }
            "-b" | "--bootstrap" => {
                if i + 1 < args.len() {
                    cli.bootstrap = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: {} requires an address list argument", args[i]);
                    std::process::exit(1);
                }
            }
            arg => {
                eprintln!("Error: Unknown option '{}'. Use --help for usage.", arg);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Load configuration from file and merge with CLI arguments
fn load_config(cli: &CliArgs) -> (String, u16, String, LoggingConfig) {
    let mut config = Config::default();

    if let Some(ref path) = cli.config_path {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(cfg) => config = cfg,
                Err(e) => {
                    eprintln!("Failed to parse config file '{}': {}", path, e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Failed to read config file '{}': {}", path, e);
                std::process::exit(1);
            }
        }
    }

    // CLI arguments override config file
    let host = cli.host.clone().unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let bootstrap = cli.bootstrap.clone().unwrap_or(config.cluster.bootstrap);

    (host, port, bootstrap, config.logging)
}

#[tokio::main]
async fn main() {
    let cli = parse_args();

    if cli.show_help {
        print_help();
        return;
    }
    if cli.show_version {
        print_version();
        return;
    }

    let (host, port, bootstrap, logging_config) = load_config(&cli);

    // Initialize logging with configured level
    let log_level = logging_config.level.to_lowercase();
    let level_filter = log_level.parse::<LevelFilter>().unwrap_or_else(|_| {
        eprintln!(
            "Warning: Invalid log level '{}', using 'info'",
            logging_config.level
        );
        LevelFilter::INFO
    });
    let filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    let addr = format!("{}:{}", host, port);

    println!("{}", LOGO);
    println!(
        "kvrouter v{} - routing proxy for a sharded Raft key-value cluster",
        VERSION
    );
    println!();

    // Eager first sync against the bootstrap nodes
    let client = match RouteClient::connect(&bootstrap).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to sync cluster topology from '{}': {}", bootstrap, e);
            std::process::exit(1);
        }
    };

    let server = ProxyServer::new(addr, client);
    if let Err(e) = server.run().await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
