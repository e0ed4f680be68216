use anyhow::Context;
use bootfloppy::{Fasm, Orchestrator};
use bootfloppy_core::BuildConfig;
use bootfloppy_filesystems::Fat12Volume;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bootfloppy")]
#[command(about = "Assemble an OS and pack it into a bootable FAT12 floppy image", long_about = None)]
struct Cli {
    /// JSON build configuration (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile changed sources and rebuild the image
    Build {
        /// Write the image here instead of the configured path
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Show sources changed since the last build and the current image contents
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = BuildConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load build configuration")?;

    match cli.command {
        Commands::Build { image } => {
            if let Some(image) = image {
                config.image_path = image;
            }
            config.validate()?;

            let timeout = Duration::from_secs(config.compile_timeout_secs);
            let assembler = Fasm::locate(&config.assembler, timeout)
                .with_context(|| format!("Assembler '{}' is not on PATH", config.assembler))?;

            let report = Orchestrator::new(config, assembler).run().await?;

            println!("Entries:");
            for name in report.injected.iter().chain(report.copied.iter()) {
                println!("  {}", name);
            }
            if !report.failed.is_empty() {
                println!("\nFailed to compile:");
                for path in &report.failed {
                    println!("  {}", path);
                }
            }
        }
        Commands::Status => {
            let image = config.image_path.clone();
            let timeout = Duration::from_secs(config.compile_timeout_secs);
            let assembler = Fasm::new(config.assembler.clone(), timeout);
            let orchestrator = Orchestrator::new(config, assembler);

            let pending = orchestrator.pending()?;
            if pending.is_empty() {
                println!("No changes since last build.");
            } else {
                println!("Changed since last build:");
                for path in &pending {
                    println!("  {}", path);
                }
            }

            if image.is_file() {
                let mut volume = Fat12Volume::open(&image)
                    .with_context(|| format!("Cannot read {}", image.display()))?;
                println!("\n{} ({} bytes free):", image.display(), volume.free_bytes());
                for entry in volume.entries()? {
                    println!("  {:<12} {:>8}  {}", entry.display_name(), entry.file_size, entry.attributes);
                }
                volume.close()?;
            } else {
                println!("\n{} has not been built yet.", image.display());
            }
        }
    }

    Ok(())
}
