mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use cli::{Cli, Commands};
use ow_core::config::Config;
use ow_core::{JobId, UploadedFile};
use ow_engine::{FfmpegEngine, ToolRegistry};
use ow_pipeline::{JobOutcome, JobUpdate, Transcoder};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use defaults based on the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "otoware=trace,ow_core=trace,ow_engine=trace,ow_pipeline=trace,ow_server=trace,tower_http=debug"
                .to_string()
        } else {
            "otoware=debug,ow_core=debug,ow_engine=debug,ow_pipeline=debug,ow_server=debug,tower_http=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = Config::load_or_default(cli.config.as_deref());
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(ow_server::start(config))?;
            Ok(())
        }
        Commands::Run {
            input,
            output_dir,
            mime,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&config, &input, &output_dir, mime))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { file } => validate_config(file.or(cli.config).as_deref()),
        Commands::Version => {
            println!("otoware {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_file(
    config: &Config,
    input: &Path,
    output_dir: &Path,
    mime: Option<String>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Input path has no usable file name: {:?}", input))?;
    let mime = mime.unwrap_or_else(|| {
        mime_guess::from_path(input)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {:?}", input))?;

    let upload = UploadedFile::new(name, mime, bytes::Bytes::from(data));
    // Reject before paying for engine start-up.
    upload.kind()?;

    let engine = FfmpegEngine::initialize(&config.engine).await?;
    let transcoder = Transcoder::new(Arc::new(engine));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let job_id = JobId::new();

    let printer = tokio::spawn(async move {
        let mut last_pct = None;
        while let Some(update) = rx.recv().await {
            if let JobUpdate::Progress { ratio, .. } = update {
                let pct = (ratio * 100.0).floor() as u32;
                if last_pct != Some(pct) {
                    eprint!("\r[{pct:>3}%]");
                    last_pct = Some(pct);
                }
            }
        }
        eprintln!();
    });

    let outcome = transcoder.run(job_id, &upload, &tx).await;
    drop(tx);
    let _ = printer.await;

    match outcome {
        JobOutcome::Succeeded(result) => {
            tokio::fs::create_dir_all(output_dir).await?;
            let path = output_dir.join(&result.file_name);
            tokio::fs::write(&path, &result.data)
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("Output: {} ({})", path.display(), ow_core::format_bytes(result.size()));
            Ok(())
        }
        JobOutcome::NoOutput => {
            println!("No output produced (does the input have an audio track?)");
            Ok(())
        }
        JobOutcome::Failed(error) => anyhow::bail!("Processing failed: {error}"),
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.engine).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable transcoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Max upload: {}",
        ow_core::format_bytes(config.server.max_upload_bytes as u64)
    );
    println!(
        "  ffmpeg: {}",
        config
            .engine
            .ffmpeg_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(PATH)".into())
    );
    println!("  Share page: {}", config.share.page_url);

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
