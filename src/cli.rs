//! Command-line interface for minerr-strip.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::StripOptions;
use crate::flush::JsonFileWriter;
use crate::parser::{Format, Indent};
use crate::strip::MinErrStrip;
use crate::template::{ProductionTemplate, DEFAULT_URL_MARKER};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Starter options file written by `init`.
const STARTER_OPTIONS: &str = include_str!("templates/minerr-strip.yaml");

/// Strip documented error factories from JavaScript modules.
///
/// Replaces the bulky error factory with a minimal production one that links
/// to online documentation, removes `@error` annotations, and collects every
/// error template into a JSON file.
#[derive(Parser)]
#[command(name = "minerr-strip")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite modules and write the error config
    Strip(StripArgs),
    /// Print the production factory with the documentation URL substituted
    Template(TemplateArgs),
    /// Create a starter options file
    Init(InitArgs),
}

/// Arguments for the strip command.
#[derive(Parser)]
pub struct StripArgs {
    /// Files or directories to process
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to options YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL for error documentation
    #[arg(long)]
    pub docs_url: Option<String>,

    /// Where to write the error config JSON
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Directory for rewritten modules
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Production template file (default: built-in)
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Regex matching the URL marker in the template
    #[arg(short, long)]
    pub marker: Option<String>,

    /// Indentation for the spliced factory: "tab" or a number of spaces
    #[arg(long)]
    pub indent: Option<String>,

    /// Extra field for the error config, as KEY=VALUE (repeatable)
    #[arg(long = "detail", value_name = "KEY=VALUE")]
    pub details: Vec<String>,

    /// Pretty-print the error config
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the template command.
#[derive(Parser)]
pub struct TemplateArgs {
    /// Base URL for error documentation
    #[arg(long)]
    pub docs_url: String,

    /// Production template file (default: built-in)
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Regex matching the URL marker in the template
    #[arg(short, long, default_value = DEFAULT_URL_MARKER)]
    pub marker: String,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "minerr-strip.yaml")]
    pub output: PathBuf,
}

/// A module to process and where its output goes, relative to `--out-dir`.
struct Input {
    path: PathBuf,
    relative: PathBuf,
}

/// Print an error the way every command reports failures.
pub fn print_error(message: impl std::fmt::Display) {
    eprintln!("{} {}", "ERROR:".white().on_red().bold(), message);
}

/// Parse an `--indent` value.
fn parse_indent(value: &str) -> anyhow::Result<String> {
    if value.eq_ignore_ascii_case("tab") {
        return Ok("\t".to_string());
    }
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(" ".repeat(n)),
        _ => anyhow::bail!("invalid indent {:?}, must be 'tab' or a positive number", value),
    }
}

/// Parse a `--detail KEY=VALUE` pair. Values that parse as JSON keep their type.
fn parse_detail(pair: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let Some((key, value)) = pair.split_once('=') else {
        anyhow::bail!("invalid detail {:?}, expected KEY=VALUE", pair);
    };
    if key.is_empty() {
        anyhow::bail!("invalid detail {:?}, key is empty", pair);
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Combine the options file with command-line overrides.
fn build_options(args: &StripArgs) -> anyhow::Result<StripOptions> {
    let mut options = match &args.config {
        Some(path) => StripOptions::parse_file(path)?,
        None => StripOptions::new(String::new(), PathBuf::new()),
    };

    if let Some(url) = &args.docs_url {
        options.docs_url = url.clone();
    }
    if let Some(dest) = &args.dest {
        options.config_dest = dest.clone();
    }
    if let Some(template) = &args.template {
        options = options.with_production_template(template);
    }
    if let Some(marker) = &args.marker {
        options = options.with_url_replacement(marker);
    }
    if let Some(indent) = &args.indent {
        let format = Format {
            indent: Indent {
                style: parse_indent(indent)?,
                base: options.parsed_file_format.indent.base,
            },
        };
        options = options.with_format(format);
    }
    for pair in &args.details {
        let (key, value) = parse_detail(pair)?;
        options = options.with_detail(key, value);
    }

    Ok(options)
}

/// Collect `.js` modules to process.
/// Output path for an explicit file argument: its normal components, so that
/// `a/x.js` and `b/x.js` stay apart under the output directory.
fn explicit_output_path(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn collect_files(paths: &[PathBuf], options: &StripOptions) -> anyhow::Result<Vec<Input>> {
    let mut files = Vec::new();

    for root in paths {
        if root.is_file() {
            files.push(Input {
                path: root.clone(),
                relative: explicit_output_path(root),
            });
            continue;
        }

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                // Skip hidden directories
                if e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.') {
                    return false;
                }
                !(e.file_type().is_dir() && name == "node_modules")
            })
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("js") {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            if options.is_path_excluded(&relative) || options.is_path_excluded(path) {
                tracing::debug!("Excluded {}", path.display());
                continue;
            }
            files.push(Input {
                path: path.to_path_buf(),
                relative,
            });
        }
    }

    let mut seen = HashSet::new();
    for input in &files {
        if !seen.insert(input.relative.as_path()) {
            anyhow::bail!(
                "{} would overwrite another module's output {}",
                input.path.display(),
                input.relative.display()
            );
        }
    }

    Ok(files)
}

fn write_output(out_dir: &Path, relative: &Path, contents: &str) -> anyhow::Result<()> {
    let dest = out_dir.join(relative);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&dest, contents)?;
    Ok(())
}

/// Run the strip command.
pub fn run_strip(args: &StripArgs) -> anyhow::Result<i32> {
    let options = match build_options(args) {
        Ok(o) => o,
        Err(e) => {
            print_error(e);
            return Ok(EXIT_ERROR);
        }
    };

    let files = match collect_files(&args.paths, &options) {
        Ok(f) => f,
        Err(e) => {
            print_error(format!("cannot collect modules: {}", e));
            return Ok(EXIT_ERROR);
        }
    };

    let mut tool = match MinErrStrip::with_writer(options, JsonFileWriter::new(args.pretty)) {
        Ok(t) => t,
        Err(e) => {
            print_error(e);
            return Ok(EXIT_ERROR);
        }
    };

    // Surface template problems before touching any module
    if let Err(e) = tool.factory() {
        print_error(e);
        return Ok(EXIT_ERROR);
    }

    if files.is_empty() {
        eprintln!("{} no modules to process", "Warning:".yellow());
    }

    let mut failed = 0;
    for input in &files {
        let contents = match fs::read_to_string(&input.path) {
            Ok(c) => c,
            Err(e) => {
                print_error(format!("cannot read {}: {}", input.path.display(), e));
                failed += 1;
                continue;
            }
        };

        match tool.process_module(&contents) {
            Ok(output) => {
                write_output(&args.out_dir, &input.relative, &output)?;
                tracing::debug!("Stripped {}", input.path.display());
            }
            Err(e) if e.is_module_error() => {
                print_error(format!("{}: {}", input.path.display(), e));
                failed += 1;
            }
            Err(e) => {
                print_error(e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    let dest = tool.options().config_dest.clone();
    let config = match tool.flush_error_config() {
        Ok(c) => c,
        Err(e) => {
            print_error(e);
            return Ok(EXIT_ERROR);
        }
    };

    let templates: usize = config.errors.values().map(|codes| codes.len()).sum();
    println!(
        "{} {} modules ({} failed)",
        "Stripped".green().bold(),
        files.len() - failed,
        failed
    );
    println!(
        "{} {} error templates in {} namespaces to {}",
        "Wrote".green().bold(),
        templates,
        config.errors.len(),
        dest.display()
    );

    if failed > 0 {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the template command.
pub fn run_template(args: &TemplateArgs) -> anyhow::Result<i32> {
    let template = ProductionTemplate::new(args.template.clone(), &args.marker, args.docs_url.clone())?;
    print!("{}", template.load()?);
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        print_error(format!("file already exists: {}", args.output.display()));
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = fs::create_dir_all(parent) {
                print_error(format!("failed to create directory: {}", e));
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = fs::write(&args.output, STARTER_OPTIONS) {
        print_error(format!("failed to write options: {}", e));
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set docs_url and config_dest in {}", args.output.display());
    println!(
        "  2. Run: minerr-strip strip src --config {} --out-dir build",
        args.output.display()
    );

    Ok(EXIT_SUCCESS)
}
