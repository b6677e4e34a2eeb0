use anyhow::{bail, Result};
use std::path::PathBuf;

use skustudio::config::Config;
use skustudio::{logging, Session};

struct CliArgs {
    config_path: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    zip_path: Option<PathBuf>,
    rename: bool,
    push: bool,
    inputs: Vec<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = CliArgs {
        config_path: None,
        out_dir: None,
        zip_path: None,
        rename: false,
        push: false,
        inputs: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("skustudio {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--out" | "-o" => {
                if i + 1 < args.len() {
                    parsed.out_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --out requires a directory argument");
                    std::process::exit(1);
                }
            }
            "--zip" => {
                if i + 1 < args.len() {
                    parsed.zip_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --zip requires a path argument");
                    std::process::exit(1);
                }
            }
            "--rename" => parsed.rename = true,
            "--push" => parsed.push = true,
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            input => parsed.inputs.push(input.to_string()),
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"skustudio - catalog image ingestion and sync tool

USAGE:
    skustudio [OPTIONS] <PRODUCT_URL | FILE...>

ARGS:
    PRODUCT_URL         Storefront product page URL (or bare product id)
    FILE...             Local image files to ingest instead

OPTIONS:
    --rename            AI-rename the images before exporting
    --zip PATH          Bundle the images into a zip archive at PATH
    --push              Upload the images to the catalog API
    --out, -o DIR       Output directory for per-file export
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    SKUSTUDIO_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/skustudio/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();

    // Initialize logging (journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    // Load configuration
    let config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if cli.inputs.is_empty() {
        print_help();
        bail!("no product URL or input files given");
    }

    let mut session = Session::new(config);

    let remote = cli.inputs.len() == 1
        && (cli.inputs[0].starts_with("http") || cli.inputs[0].chars().all(|c| c.is_ascii_digit()));
    let count = if remote {
        session.search(&cli.inputs[0]).await?
    } else {
        let paths = cli.inputs.iter().map(PathBuf::from).collect();
        session.ingest_files(paths).await?
    };
    println!(
        "{}: {} image(s) ready",
        session.store().product_name(),
        count
    );

    if cli.rename {
        let renamed = session.rename_all().await;
        println!("AI rename: {} of {} renamed", renamed, count);
    }

    if let Some(zip_path) = &cli.zip_path {
        // a directory target gets a timestamped bundle name
        let zip_path = if zip_path.is_dir() {
            zip_path.join(skustudio::export::default_bundle_name())
        } else {
            zip_path.clone()
        };
        let written = session.export_zip(&zip_path)?;
        println!("Wrote {} image(s) to {}", written, zip_path.display());
    } else {
        let out_dir = cli
            .out_dir
            .clone()
            .unwrap_or_else(|| session.config().export.output_dir.clone());
        let written = session.download_all(&out_dir)?;
        println!("Wrote {} image(s) to {}", written, out_dir.display());
    }

    if cli.push {
        let report = session.push_to_catalog().await?;
        let succeeded = report.succeeded;
        match report.into_result() {
            Ok(_) => println!("Catalog sync complete ({} uploaded)", succeeded),
            Err(err) => bail!("catalog sync incomplete ({} uploaded): {}", succeeded, err),
        }
    }

    Ok(())
}
