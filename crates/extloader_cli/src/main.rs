//! Extension metadata inspector.
//!
//! # Responsibility
//! - Load the loader configuration and plugin metadata the way the runtime
//!   does.
//! - Print the runtime variables handed to the host, then every registered
//!   extension with its activation mode.

use clap::Parser;
use extloader_core::extension::manifest::{load_metadata_dir, ManifestSet};
use extloader_core::{core_version, init_logging, LoaderConfig};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "extloader",
    about = "Lists plugin metadata and how each extension is activated",
    version
)]
struct Cli {
    #[arg(long, help = "JSON loader configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long = "metadata-dir",
        help = "Directory of *.json plugin metadata; overrides the configuration"
    )]
    metadata_dir: Option<PathBuf>,

    #[arg(
        long = "extension-dir",
        help = "Directory relative extension libraries resolve against; overrides the configuration"
    )]
    extension_dir: Option<PathBuf>,

    #[arg(long = "log-dir", help = "Absolute directory for rolling log files")]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("extloader: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::load(path).map_err(|err| err.to_string())?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = cli.extension_dir {
        config.extension_dir = dir;
    }
    if let Some(dir) = cli.metadata_dir {
        config.metadata_dir = Some(dir);
    }
    if let Some(dir) = cli.log_dir {
        config.log.dir = Some(dir);
    }

    if let Some(dir) = &config.log.dir {
        init_logging(&config.log.level, dir).map_err(|err| err.to_string())?;
    }

    let manifests = load_metadata_dir(config.metadata_dir(), &config.extension_dir)
        .map_err(|err| err.to_string())?;
    let mut set = ManifestSet::new();
    set.register_all(manifests);
    set.apply_trampoline_flags();

    println!("extloader_core version={}", core_version());
    for (key, value) in config.runtime_variables().iter() {
        println!("runtime_variable {key}={value}");
    }
    for manifest in set.iter() {
        let mode = if manifest.use_trampoline { "lazy" } else { "eager" };
        println!(
            "{} mode={} lib={} entry_points=[{}]",
            manifest.name,
            mode,
            manifest.lib.display(),
            manifest.entry_points.join(",")
        );
    }
    info!(
        "event=cli_list module=cli status=ok extensions={} metadata_dir={}",
        set.len(),
        config.metadata_dir().display()
    );
    Ok(())
}
