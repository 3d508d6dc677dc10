use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;

use photo_gallery::config::Config;
use photo_gallery::{auth, logging, server};

enum Command {
    Serve {
        config_path: Option<PathBuf>,
        bind: Option<SocketAddr>,
    },
    HashPassword(String),
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut bind = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photo-gallery {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--bind" | "-b" => match args.get(i + 1).map(|a| a.parse::<SocketAddr>()) {
                Some(Ok(addr)) => {
                    bind = Some(addr);
                    i += 1;
                }
                Some(Err(e)) => {
                    eprintln!("Error: invalid --bind address: {}", e);
                    std::process::exit(1);
                }
                None => {
                    eprintln!("Error: --bind requires an address argument");
                    std::process::exit(1);
                }
            },
            "--hash-password" => {
                if i + 1 < args.len() {
                    return Command::HashPassword(args[i + 1].clone());
                }
                eprintln!("Error: --hash-password requires a password argument");
                std::process::exit(1);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Command::Serve { config_path, bind }
}

fn print_help() {
    println!(
        r#"photo-gallery - photo gallery website with an admin panel

USAGE:
    photo-gallery [OPTIONS]

OPTIONS:
    --config, -c PATH       Path to config file
    --bind, -b ADDR         Listen address, overrides [server] bind
    --hash-password PW      Print the password_hash for [admin] and exit
    --version, -V           Show version
    --help, -h              Show this help message

ENVIRONMENT:
    PHOTO_GALLERY_CONFIG    Path to config file (overrides default location)
    PHOTO_GALLERY_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photo-gallery/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config_path, bind) = match parse_args() {
        Command::HashPassword(password) => {
            println!("{}", auth::hash_password(&password));
            return Ok(());
        }
        Command::Serve { config_path, bind } => (config_path, bind),
    };

    // Load configuration
    let mut config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    logging::init(&config.logging)?;

    server::serve(config).await
}
