use anyhow::Result;
use clipforge::{catalog, logging, Config, Converter};
use std::path::PathBuf;

struct Args {
    config_path: Option<PathBuf>,
    models: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut models = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("clipforge {}", env!("CARGO_PKG_VERSION"));
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
            flag if flag.starts_with('-') => {
                eprintln!("Unknown argument: {flag}");
                print_help();
                std::process::exit(1);
            }
            model => models.push(model.to_string()),
        }
        i += 1;
    }

    Args {
        config_path,
        models,
    }
}

fn print_help() {
    println!(
        r#"clipforge - convert pretrained CLIP checkpoints

USAGE:
    clipforge [OPTIONS] [MODEL ...]

ARGS:
    MODEL               Catalog identifiers to convert (e.g. "RN50" "ViT-B/32").
                        With no models given, the whole catalog is converted.

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    CLIPFORGE_LOG       Log level (trace, debug, info, warn, error)

Config file location: ./clipforge.toml (optional)

See also: clipforge-inspect --help"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    logging::init();

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let converter = Converter::new(config);
    if args.models.is_empty() {
        converter.convert_all(catalog::PRETRAINED)?;
    } else {
        let entries = args
            .models
            .iter()
            .map(|name| catalog::lookup(name))
            .collect::<clipforge::Result<Vec<_>>>()?;
        converter.convert_all(entries)?;
    }

    Ok(())
}
