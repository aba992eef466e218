//! CLI entry point for `xopack`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use xopack::attachment::{PackageSink, SinkMode};
use xopack::config::{Config, SinkConfig};
use xopack::error::Error;
use xopack::marshal::{marshal_to_vec, MarshalReport, Marshaller};
use xopack::model::attachment::{sha256_hex, AttachmentPart, TransferEncoding};
use xopack::model::document::{BinaryField, Document, Element, QName, XMIME_NAMESPACE};
use xopack::package::{write_package, Package};
use xopack::parser::xml::{parse_document, BinaryElements};
use xopack::store::{DirectoryStore, MemoryStore, PartStore};

/// Namespace of the document built by `pack`.
const FILES_NAMESPACE: &str = "urn:xopack:files";

#[derive(Parser)]
#[command(
    name = "xopack",
    version,
    about = "Move binary content out of XML documents into MIME attachments (XOP/MTOM, swaRef)"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Overrides for the `[sink]` and `[package]` config sections.
#[derive(clap::Args)]
struct SinkArgs {
    /// Sink mode: inline or xop
    #[arg(long, value_name = "MODE")]
    mode: Option<SinkMode>,

    /// Inline payloads smaller than this many bytes
    #[arg(long, value_name = "BYTES")]
    min_size: Option<usize>,

    /// Domain part of generated Content-IDs
    #[arg(long, value_name = "DOMAIN")]
    cid_domain: Option<String>,

    /// Write attachment parts base64-encoded instead of binary
    #[arg(long)]
    base64: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize an XML document into a MIME package
    Optimize {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Element holding base64Binary content (local name or {ns}local)
        #[arg(short, long = "binary-element", value_name = "NAME")]
        binary_elements: Vec<String>,
        /// Element holding swaRef content (local name or {ns}local)
        #[arg(short, long = "swaref-element", value_name = "NAME")]
        swaref_elements: Vec<String>,
        /// Store parts in this directory instead of packaging them
        #[arg(long, value_name = "DIR")]
        parts_dir: Option<PathBuf>,
        #[command(flatten)]
        sink: SinkArgs,
    },
    /// Package files as binary elements of a generated document
    Pack {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        sink: SinkArgs,
    },
    /// Show the parts of a MIME package
    Inspect {
        package: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Extract the parts of a MIME package
    Unpack {
        package: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Also rebuild the document with attachments inlined
        #[arg(long)]
        reconstruct: bool,
    },
    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = xopack::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Optimize {
            input,
            output,
            binary_elements,
            swaref_elements,
            parts_dir,
            sink,
        } => {
            let elements = BinaryElements {
                xop: binary_elements,
                swaref: swaref_elements,
            };
            let config = apply_overrides(config, &sink);
            cmd_optimize(&input, &output, &elements, parts_dir.as_deref(), &config)
        }
        Commands::Pack {
            files,
            output,
            sink,
        } => cmd_pack(&files, &output, &apply_overrides(config, &sink)),
        Commands::Inspect { package, json } => cmd_inspect(&package, json),
        Commands::Unpack {
            package,
            output,
            reconstruct,
        } => cmd_unpack(&package, &output, reconstruct),
        Commands::Config { action } => cmd_config(action, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = xopack::config::log_file_path(config);
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let log_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "xopack.log".into());

    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(mut config: Config, args: &SinkArgs) -> Config {
    if let Some(mode) = args.mode {
        config.sink.mode = mode;
    }
    if let Some(min_size) = args.min_size {
        config.sink.min_externalize_size = min_size;
    }
    if let Some(ref domain) = args.cid_domain {
        config.sink.cid_domain = domain.clone();
    }
    if args.base64 {
        config.package.transfer_encoding = TransferEncoding::Base64;
    }
    config
}

fn build_sink<S: PartStore>(config: &SinkConfig, store: S) -> PackageSink<S> {
    PackageSink::new(config.mode, store)
        .with_policy(config.policy())
        .with_cid_domain(&config.cid_domain)
}

fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Parse an XML document and marshal it through a package sink.
fn cmd_optimize(
    input: &Path,
    output: &Path,
    elements: &BinaryElements,
    parts_dir: Option<&Path>,
    config: &Config,
) -> anyhow::Result<()> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()).into());
    }
    if elements.xop.is_empty() && elements.swaref.is_empty() {
        anyhow::bail!("Name at least one --binary-element or --swaref-element");
    }

    let file = File::open(input).map_err(|e| Error::io(input, e))?;
    let document = parse_document(BufReader::new(file), elements)?;
    let start = Instant::now();

    match parts_dir {
        Some(dir) => {
            let mut sink = build_sink(&config.sink, DirectoryStore::open(dir)?);
            let file = File::create(output).map_err(|e| Error::io(output, e))?;
            let mut out = BufWriter::new(file);
            let report =
                Marshaller::new(&mut sink, config.marshal.clone()).marshal(&document, &mut out)?;
            out.flush()?;
            let manifest = sink.into_store().write_manifest()?;

            print_report(&report, start.elapsed());
            println!("  {:<20} {}", "Document", output.display());
            println!("  {:<20} {}", "Manifest", manifest.display());
            println!();
        }
        None => {
            let mut sink = build_sink(&config.sink, MemoryStore::new());
            let (xml, report) = marshal_to_vec(&mut sink, &document, &config.marshal)?;
            let parts = sink.into_store().into_parts();
            write_output(output, &xml, &report, &parts, config)?;

            print_report(&report, start.elapsed());
            println!("  {:<20} {}", "Output", output.display());
            println!();
        }
    }

    Ok(())
}

/// Build a document with one binary element per file and package it.
fn cmd_pack(files: &[PathBuf], output: &Path, config: &Config) -> anyhow::Result<()> {
    for file in files {
        if !file.exists() {
            return Err(Error::FileNotFound(file.clone()).into());
        }
    }

    let mut root = Element::new(QName::new(FILES_NAMESPACE, "files"));
    for path in files {
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let content_type = xopack::export::attachment::content_type_for_path(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        root = root.with_child(
            Element::new(QName::new(FILES_NAMESPACE, "file"))
                .with_attribute(QName::local("name"), name)
                .with_attribute(QName::new(XMIME_NAMESPACE, "contentType"), content_type)
                .with_binary(BinaryField::new(data).with_content_type(content_type)),
        );
    }
    let document = Document::new(root);

    let pb = progress_bar(files.len() as u64, "Packing");
    let start = Instant::now();
    let mut sink = build_sink(&config.sink, MemoryStore::new());
    let mut xml = Vec::new();
    let report = Marshaller::new(&mut sink, config.marshal.clone()).marshal_with_progress(
        &document,
        &mut xml,
        Some(&|visited| {
            pb.set_position(visited as u64);
            true
        }),
    )?;
    pb.finish_and_clear();

    let parts = sink.into_store().into_parts();
    write_output(output, &xml, &report, &parts, config)?;

    print_report(&report, start.elapsed());
    println!("  {:<20} {}", "Output", output.display());
    println!();
    Ok(())
}

/// Write a MIME package, or plain XML when nothing was externalized.
fn write_output(
    output: &Path,
    xml: &[u8],
    report: &MarshalReport,
    parts: &[AttachmentPart],
    config: &Config,
) -> anyhow::Result<()> {
    if !report.has_attachments() {
        std::fs::write(output, xml).map_err(|e| Error::io(output, e))?;
        return Ok(());
    }

    let file = File::create(output).map_err(|e| Error::io(output, e))?;
    let mut out = BufWriter::new(file);
    let summary = write_package(xml, report, parts, &config.package, &mut out)?;
    out.flush()?;
    tracing::debug!(boundary = %summary.boundary, "Package written");
    Ok(())
}

/// Show the parts of a MIME package.
fn cmd_inspect(path: &Path, json: bool) -> anyhow::Result<()> {
    let package = read_package_file(path)?;
    if json {
        print_package_json(path, &package)
    } else {
        print_package_table(path, &package);
        Ok(())
    }
}

/// Extract the parts of a MIME package.
fn cmd_unpack(path: &Path, output: &Path, reconstruct: bool) -> anyhow::Result<()> {
    let package = read_package_file(path)?;

    let pb = progress_bar(package.parts.len() as u64, "Extracting");
    let paths = xopack::export::attachment::export_package_parts(
        &package,
        output,
        &|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        },
    )?;
    pb.finish_and_clear();
    println!("  Extracted {} file(s) to {}", paths.len(), output.display());

    if reconstruct {
        let xml = package.reconstruct()?;
        let target = xopack::export::attachment::unique_path(&output.join("document.xml"));
        std::fs::write(&target, xml).map_err(|e| Error::io(&target, e))?;
        println!("  Reconstructed document: {}", target.display());
    }

    Ok(())
}

fn read_package_file(path: &Path) -> anyhow::Result<Package> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()).into());
    }
    let raw = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(Package::parse(&raw)?)
}

fn cmd_config(action: ConfigAction, config: &Config) -> anyhow::Result<()> {
    let path = xopack::config::config_file_path();
    match action {
        ConfigAction::Show => {
            if let Some(path) = path {
                println!("# {}", path.display());
            }
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Init { force } => {
            if let Some(ref path) = path {
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
            }
            xopack::config::save_config(&Config::default())?;
            if let Some(path) = path {
                println!("  Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "xopack", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print marshalling statistics in a human-readable table.
fn print_report(report: &MarshalReport, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Mode", report.mode);
    println!(
        "  {:<20} {} ({})",
        "Externalized",
        report.externalized,
        format_size(report.externalized_bytes, BINARY)
    );
    println!(
        "  {:<20} {} ({})",
        "Inlined",
        report.inlined,
        format_size(report.inlined_bytes, BINARY)
    );
    if report.swaref > 0 {
        println!(
            "  {:<20} {} ({})",
            "swaRef",
            report.swaref,
            format_size(report.swaref_bytes, BINARY)
        );
    }
    if report.fallbacks > 0 {
        println!("  {:<20} {}", "Store fallbacks", report.fallbacks);
    }
    println!("  {:<20} {:.2?}", "Time", elapsed);
}

/// Print a package summary in a human-readable table.
fn print_package_table(path: &Path, package: &Package) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Content-Type", package.content_type);
    println!(
        "  {:<20} {}",
        "XOP",
        if package.is_xop { "yes" } else { "no" }
    );
    println!(
        "  {:<20} <{}> {} ({})",
        "Root",
        package.root_content_id,
        package.root_content_type,
        format_size(package.root.len() as u64, BINARY)
    );
    println!(
        "  {:<20} {} ({})",
        "Attachments",
        package.parts.len(),
        format_size(package.attachment_bytes(), BINARY)
    );

    if package.parts.is_empty() {
        println!();
        return;
    }

    println!();
    println!(
        "  {:<4} {:<44} {:<26} {:>10}  {:<16}",
        "#", "Content-ID", "Type", "Size", "SHA-256"
    );
    println!("  {}", "-".repeat(104));
    for (i, part) in package.parts.iter().enumerate() {
        let id: String = part.content_id.chars().take(43).collect();
        let ct: String = part.content_type.chars().take(25).collect();
        let digest = sha256_hex(&part.data);
        println!(
            "  {:<4} {:<44} {:<26} {:>10}  {:<16}",
            i + 1,
            id,
            ct,
            format_size(part.data.len() as u64, BINARY),
            &digest[..16]
        );
    }
    println!();
}

/// Print a package summary as JSON.
fn print_package_json(path: &Path, package: &Package) -> anyhow::Result<()> {
    let parts: Vec<serde_json::Value> = package
        .parts
        .iter()
        .map(|p| {
            serde_json::json!({
                "content_id": p.content_id,
                "content_type": p.content_type,
                "size": p.data.len(),
                "sha256": sha256_hex(&p.data),
            })
        })
        .collect();

    let output = serde_json::json!({
        "file": path.to_string_lossy(),
        "content_type": package.content_type,
        "xop": package.is_xop,
        "root": {
            "content_id": package.root_content_id,
            "content_type": package.root_content_type,
            "size": package.root.len(),
        },
        "attachment_bytes": package.attachment_bytes(),
        "parts": parts,
        "inspected_at": chrono::Utc::now().to_rfc3339(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
