//! LAMO command-line tool
//!
//! Convert images to LAMO, extract them back to PNG, and inspect headers.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lamo_rs::{Lamo, LamoConfig, LamoError, PasswordContext};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lamo")]
#[command(about = "Convert, extract and inspect LAMO image archives")]
#[command(version)]
struct Cli {
    /// TOML file with limits and default zlib level
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Password for encrypted files
    #[arg(long, global = true, env = "LAMO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an image (PNG, JPEG, WebP, BMP, GIF) to LAMO
    Convert {
        input: PathBuf,

        /// Output path [default: <input stem>.lamo in the current directory]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// zlib level 0-9 [default: from config, else 9]
        #[arg(short, long)]
        level: Option<u32>,

        /// Encrypt with the password from --password or LAMO_PASSWORD
        #[arg(short, long)]
        encrypt: bool,
    },

    /// Write the image stored in a LAMO file as PNG
    Extract { input: PathBuf, output: PathBuf },

    /// Print version, payload size and metadata
    Info { input: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<LamoError>() {
                Some(lamo_error) => eprintln!("error: {}", lamo_error.user_message()),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration: {:?}", path);
            LamoConfig::load(path)?
        }
        None => LamoConfig::default(),
    };
    let lamo = Lamo::builder().config(config).build()?;

    match cli.command {
        Command::Convert {
            input,
            output,
            level,
            encrypt,
        } => {
            let password = match (encrypt, cli.password.as_deref()) {
                (true, Some(password)) => Some(password),
                (true, None) => bail!("--encrypt needs --password or LAMO_PASSWORD"),
                (false, _) => None,
            };
            let lamo = match level {
                Some(level) => Lamo::builder()
                    .config(lamo.config().clone())
                    .zlib_level(level)
                    .build()
                    .context("invalid --level")?,
                None => lamo,
            };
            let written = lamo.convert_file(&input, output.as_deref(), password)?;
            println!("{}", written.display());
        }

        Command::Extract { input, output } => {
            let password = cli.password;
            let provider = move |context: &PasswordContext<'_>| {
                if password.is_none() {
                    info!("{:?} is encrypted; pass --password or set LAMO_PASSWORD", context.path);
                }
                password.clone()
            };
            let metadata = lamo.export_png(&input, &output, &provider)?;
            info!("Extracted {} metadata keys", metadata.len());
            println!("{}", output.display());
        }

        Command::Info { input } => {
            let info = lamo.inspect(&input)?;
            println!("file:       {}", input.display());
            println!("version:    {}", info.version);
            println!("payload:    {} bytes", info.payload_len);
            println!("encrypted:  {}", info.encrypted);
            println!(
                "metadata:   {}",
                serde_json::to_string_pretty(&info.metadata)
                    .context("metadata is not printable")?
            );
        }
    }

    Ok(())
}
