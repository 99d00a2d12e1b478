//! CLI entry point for `emlshell`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};

use emlshell::config::Config;
use emlshell::error::EmlError;
use emlshell::export::{save_attachments, SaveToDirResolver};
use emlshell::message::{DataUrlResolver, EmlMessage};
use emlshell::parser::part::PartNode;

#[derive(Parser)]
#[command(name = "emlshell", version, about = "Inspect and extract RFC 2822 / MIME .eml files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the main headers, the text body and the attachment list
    Show {
        path: PathBuf,
        /// Print a JSON summary instead
        #[arg(long)]
        json: bool,
    },
    /// List every top-level header
    Headers {
        path: PathBuf,
        /// Print values as they appear in the file
        #[arg(long)]
        raw: bool,
    },
    /// Print the MIME structure
    Tree {
        path: PathBuf,
    },
    /// Print the plain-text body
    Text {
        path: PathBuf,
    },
    /// Print the HTML body
    Html {
        path: PathBuf,
        /// Embed inline images as data: URLs
        #[arg(long, conflicts_with = "images_dir")]
        data_urls: bool,
        /// Save inline images into DIR and point the HTML at them
        #[arg(long, value_name = "DIR")]
        images_dir: Option<PathBuf>,
    },
    /// Save attachments to a directory
    Attachments {
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also save inline images
        #[arg(long)]
        inline: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = emlshell::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show { path, json } => cmd_show(&path, json, &config),
        Commands::Headers { path, raw } => cmd_headers(&path, raw, &config),
        Commands::Tree { path } => cmd_tree(&path, &config),
        Commands::Text { path } => cmd_text(&path, &config),
        Commands::Html {
            path,
            data_urls,
            images_dir,
        } => cmd_html(&path, data_urls, images_dir.as_deref(), &config),
        Commands::Attachments {
            path,
            output,
            inline,
        } => cmd_attachments(&path, output, inline, &config),
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

    // Try to set up file logging
    let log_dir = emlshell::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "emlshell.log");
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

fn open(path: &Path, config: &Config) -> anyhow::Result<EmlMessage> {
    let options = config.parser.parse_options();
    EmlMessage::from_file_with(path, &options).map_err(|e| open_error(path, e))
}

/// Name the file for errors about its MIME structure. I/O errors already
/// carry their path.
fn open_error(path: &Path, error: EmlError) -> anyhow::Error {
    if error.is_structural() {
        anyhow::Error::new(error).context(format!("Malformed MIME structure in {}", path.display()))
    } else {
        anyhow::Error::new(error)
    }
}

/// Print a summary of a message.
fn cmd_show(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let msg = open(path, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&msg.summary())?);
        return Ok(());
    }

    let none = "-".to_string();
    println!();
    println!("  {:<12} {}", "Subject:", msg.subject().unwrap_or_else(|| none.clone()));
    println!("  {:<12} {}", "From:", msg.from().unwrap_or_else(|| none.clone()));
    println!("  {:<12} {}", "To:", msg.to().unwrap_or_else(|| none.clone()));
    if let Some(cc) = msg.cc() {
        println!("  {:<12} {}", "Cc:", cc);
    }
    let date = msg
        .date()
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or(none);
    println!("  {:<12} {}", "Date:", date);
    println!("  {:<12} {}", "Direction:", msg.direction());
    println!();

    if let Some(text) = msg.text() {
        println!("{text}");
        println!();
    }

    let attachments = msg.attachments();
    let inline = msg.inline_images();
    if !attachments.is_empty() || !inline.is_empty() {
        println!("  {} attachment(s), {} inline image(s)", attachments.len(), inline.len());
        for att in attachments.iter().chain(inline.iter()) {
            println!(
                "    {:<40} {:<28} {:>10}{}",
                att.filename.as_deref().unwrap_or("(unnamed)"),
                att.content_type.as_deref().unwrap_or("-"),
                format_size(att.size(), BINARY),
                if att.is_inline { "  inline" } else { "" }
            );
        }
        println!();
    }

    Ok(())
}

/// Print the top-level headers in file order.
fn cmd_headers(path: &Path, raw: bool, config: &Config) -> anyhow::Result<()> {
    let msg = open(path, config)?;
    let root = msg.root();

    for (name, _) in root.headers().iter() {
        let Some(value) = root.get_header(name, !raw, !raw) else {
            continue;
        };
        for v in value.as_slice() {
            println!("{name}: {v}");
        }
    }
    Ok(())
}

/// Print the MIME tree, one part per line.
fn cmd_tree(path: &Path, config: &Config) -> anyhow::Result<()> {
    let msg = open(path, config)?;
    print_part(msg.root(), 0);
    Ok(())
}

fn print_part(part: &PartNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let mime = part.mime_type().unwrap_or_else(|| "(untyped)".to_string());

    let mut flags = Vec::new();
    if part.is_inline_image() {
        flags.push("inline-image".to_string());
    } else if part.is_attachment() && !part.is_container() {
        flags.push("attachment".to_string());
    }
    if let Some(name) = part.filename() {
        flags.push(format!("name={name}"));
    }
    if let Some(body) = part.body() {
        flags.push(format_size(body.len(), BINARY));
    }
    flags.push(part.line_ending().to_string());

    println!("{indent}{mime}  [{}]", flags.join(", "));

    for child in part.children() {
        print_part(child, depth + 1);
    }
    for discarded in part.discarded() {
        println!(
            "{indent}  ! section {} discarded: {}",
            discarded.index, discarded.error
        );
    }
}

/// Print the text body.
fn cmd_text(path: &Path, config: &Config) -> anyhow::Result<()> {
    let msg = open(path, config)?;
    match msg.text() {
        Some(text) => println!("{text}"),
        None => tracing::info!(path = %path.display(), "Message has no text body"),
    }
    Ok(())
}

/// Print the HTML body, optionally resolving inline images.
fn cmd_html(
    path: &Path,
    data_urls: bool,
    images_dir: Option<&Path>,
    config: &Config,
) -> anyhow::Result<()> {
    let msg = open(path, config)?;

    let html = if data_urls {
        msg.html_with_inline_images(&mut DataUrlResolver)?
    } else if let Some(dir) = images_dir {
        let mut resolver = SaveToDirResolver::new(dir)
            .with_max_filename_len(config.export.max_filename_len);
        let html = msg.html_with_inline_images(&mut resolver)?;
        eprintln!(
            "  Saved {} inline image(s) to {}",
            resolver.saved().len(),
            dir.display()
        );
        html
    } else {
        msg.html()
    };

    match html {
        Some(html) => println!("{html}"),
        None => tracing::info!(path = %path.display(), "Message has no HTML body"),
    }
    Ok(())
}

/// Save attachments (and optionally inline images) of a message.
fn cmd_attachments(
    path: &Path,
    output: Option<PathBuf>,
    inline: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let msg = open(path, config)?;
    let output = output
        .or_else(|| config.export.default_output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let max_len = config.export.max_filename_len;

    let attachments = msg.attachments();
    if attachments.is_empty() && !inline {
        println!("  No attachments found.");
        return Ok(());
    }

    let mut paths = save_attachments(&attachments, &output, max_len)?;
    if inline {
        let images = msg.inline_images();
        let dir = output.join(&config.export.inline_images_dir_name);
        if !images.is_empty() {
            paths.extend(save_attachments(&images, &dir, max_len)?);
        }
    }

    println!(
        "  Extracted {} file(s) to {}",
        paths.len(),
        output.display()
    );
    for saved in &paths {
        println!("    {}", saved.display());
    }

    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emlshell", &mut std::io::stdout());
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
