//! CLI entry point for `mimesieve`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mimesieve::config::{self, Config};
use mimesieve::error::ErrorFlags;
use mimesieve::model::entity::HeaderClass;
use mimesieve::model::report::StructureReport;
use mimesieve::parser::header::HeaderInfo;
use mimesieve::parser::mime::{MimeParser, MimeSink, Options};
use mimesieve::parser::record::{RecordKind, RecordReader};

/// Read buffer size for message input (128 KB).
const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Progress is reported every 4 MB of input.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "mimesieve", version)]
#[command(about = "Inspect and repair the MIME structure of mail messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an annotated structure dump of a message
    Scan {
        path: PathBuf,
    },
    /// Parse a message and report structural anomalies
    Check {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Rewrite a message with 8-bit bodies converted to quoted-printable
    Downgrade {
        path: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
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
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Scan { path } => cmd_scan(&path, &config),
        Commands::Check { path, json } => cmd_check(&path, json, &config),
        Commands::Downgrade { path, output } => cmd_downgrade(&path, output.as_deref(), &config),
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
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimesieve.log");
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

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimesieve", &mut std::io::stdout());
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

/// Map the configured report toggles onto parser options.
fn report_options(config: &Config) -> Options {
    let mut options = Options::NONE;
    if config.report.trunc_header {
        options |= Options::REPORT_TRUNC_HEADER;
    }
    if config.report.eight_bit_in_header {
        options |= Options::REPORT_8BIT_IN_HEADER;
    }
    if config.report.eight_bit_in_7bit_body {
        options |= Options::REPORT_8BIT_IN_7BIT_BODY;
    }
    if config.report.encoding_domain {
        options |= Options::REPORT_ENCODING_DOMAIN;
    }
    options
}

fn open_message(path: &Path) -> anyhow::Result<BufReader<File>> {
    if !path.exists() {
        anyhow::bail!("file not found: {}", path.display());
    }
    let file = File::open(path)?;
    Ok(BufReader::with_capacity(READ_BUFFER_SIZE, file))
}

// ── scan ────────────────────────────────────────────────────────

/// Sink that prints each parser event with a class label, one event per
/// line.
struct ScanSink<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> ScanSink<W> {
    fn write(&mut self, parts: &[&[u8]]) {
        if self.error.is_some() {
            return;
        }
        for part in parts {
            if let Err(e) = self.out.write_all(part) {
                self.error = Some(e);
                return;
            }
        }
    }
}

impl<W: Write> MimeSink for ScanSink<W> {
    fn header(&mut self, class: HeaderClass, _info: Option<&'static HeaderInfo>, buf: &mut Vec<u8>) {
        self.write(&[class.label().as_bytes(), b"\t", buf.as_slice(), b"\n"]);
    }

    fn header_end(&mut self) {
        self.write(&[b"HEADER END\n"]);
    }

    fn body(&mut self, kind: RecordKind, line: &[u8]) {
        if kind == RecordKind::Complete {
            self.write(&[b"BODY\t", line, b"\n"]);
        } else {
            self.write(&[b"BODY\t", line]);
        }
    }

    fn body_end(&mut self) {
        self.write(&[b"BODY END\n"]);
    }
}

/// Annotated structure dump of one message.
fn cmd_scan(path: &Path, config: &Config) -> anyhow::Result<()> {
    let reader = open_message(path)?;
    let mut records =
        RecordReader::with_max_record_len(reader, path, config.general.max_record_len);

    let stdout = io::stdout();
    let sink = ScanSink {
        out: BufWriter::new(stdout.lock()),
        error: None,
    };
    let mut parser = MimeParser::new(report_options(config), config.limits, sink);

    let mut buf = Vec::new();
    let mut flags = ErrorFlags::NONE;
    while let Some(kind) = records.next_record(&mut buf)? {
        flags = parser.update(kind, &buf);
    }

    let mut sink = parser.into_sink();
    sink.out.flush()?;
    if let Some(e) = sink.error {
        return Err(e.into());
    }

    for message in flags.messages() {
        tracing::warn!(path = %path.display(), "{message}");
    }
    Ok(())
}

// ── check ───────────────────────────────────────────────────────

/// Sink that only counts events, for the structure report.
#[derive(Default)]
struct CountingSink {
    report: StructureReport,
    in_part_block: bool,
}

impl MimeSink for CountingSink {
    fn header(&mut self, class: HeaderClass, _info: Option<&'static HeaderInfo>, _buf: &mut Vec<u8>) {
        match class {
            HeaderClass::Primary => self.report.primary_headers += 1,
            HeaderClass::Multipart => {
                self.report.part_headers += 1;
                if !self.in_part_block {
                    self.in_part_block = true;
                    self.report.parts += 1;
                }
            }
            HeaderClass::Nested => self.report.nested_headers += 1,
        }
    }

    fn body(&mut self, kind: RecordKind, _line: &[u8]) {
        self.in_part_block = false;
        if kind == RecordKind::Complete {
            self.report.body_lines += 1;
        }
    }
}

/// Parse a message and report its structure and anomalies.
fn cmd_check(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let reader = open_message(path)?;
    let mut records =
        RecordReader::with_max_record_len(reader, path, config.general.max_record_len);

    let pb = ProgressBar::new(file_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Checking [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut parser = MimeParser::new(report_options(config), config.limits, CountingSink::default());

    let start = Instant::now();
    let mut buf = Vec::new();
    let mut flags = ErrorFlags::NONE;
    let mut bytes_read: u64 = 0;
    let mut last_progress: u64 = 0;
    let mut deepest = 0usize;

    while let Some(kind) = records.next_record(&mut buf)? {
        bytes_read += buf.len() as u64 + 1;
        flags = parser.update(kind, &buf);
        deepest = deepest.max(parser.nesting_depth());
        if bytes_read - last_progress >= PROGRESS_INTERVAL {
            pb.set_position(bytes_read.min(file_size));
            last_progress = bytes_read;
        }
    }
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let mut report = parser.into_sink().report;
    report.deepest_nesting = deepest;
    report.anomalies = flags.messages().iter().map(|m| m.to_string()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_check_table(path, file_size, &report, elapsed);
    }

    if !flags.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the structure report as a human-readable table.
fn print_check_table(
    path: &Path,
    file_size: u64,
    report: &StructureReport,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Size", format_size(file_size, BINARY));
    println!("  {:<20} {}", "Primary headers", report.primary_headers);
    println!("  {:<20} {}", "Part headers", report.part_headers);
    println!("  {:<20} {}", "Nested headers", report.nested_headers);
    println!("  {:<20} {}", "Body lines", report.body_lines);
    println!("  {:<20} {}", "Parts", report.parts);
    println!("  {:<20} {}", "Deepest nesting", report.deepest_nesting);
    println!("  {:<20} {:.2?}", "Parse time", elapsed);

    if report.anomalies.is_empty() {
        println!("  {:<20} none", "Anomalies");
    } else {
        println!();
        println!("  Anomalies:");
        for message in &report.anomalies {
            println!("    - {message}");
        }
    }
    println!();
}

// ── downgrade ───────────────────────────────────────────────────

/// Sink that reassembles the message, inserting the blank separator line
/// at each header/body transition.
struct DowngradeSink<W: Write> {
    out: W,
    in_headers: bool,
    error: Option<io::Error>,
}

impl<W: Write> DowngradeSink<W> {
    fn write(&mut self, bytes: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_all(bytes) {
            self.error = Some(e);
        }
    }
}

impl<W: Write> MimeSink for DowngradeSink<W> {
    fn header(&mut self, _class: HeaderClass, _info: Option<&'static HeaderInfo>, buf: &mut Vec<u8>) {
        self.in_headers = true;
        self.write(buf.as_slice());
        self.write(b"\n");
    }

    fn body(&mut self, kind: RecordKind, line: &[u8]) {
        if self.in_headers {
            // A header block just ended; restore the separator.
            self.in_headers = false;
            self.write(b"\n");
        }
        self.write(line);
        if kind == RecordKind::Complete {
            self.write(b"\n");
        }
    }
}

/// Rewrite a message with 8-bit leaf bodies converted to quoted-printable.
fn cmd_downgrade(path: &Path, output: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let reader = open_message(path)?;
    let mut records =
        RecordReader::with_max_record_len(reader, path, config.general.max_record_len);

    let out: Box<dyn Write> = match output {
        Some(out_path) => Box::new(BufWriter::new(File::create(out_path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let sink = DowngradeSink {
        out,
        in_headers: true,
        error: None,
    };
    let mut parser = MimeParser::new(Options::DOWNGRADE, config.limits, sink);

    let mut buf = Vec::new();
    let mut flags = ErrorFlags::NONE;
    while let Some(kind) = records.next_record(&mut buf)? {
        flags = parser.update(kind, &buf);
    }

    let mut sink = parser.into_sink();
    sink.out.flush()?;
    if let Some(e) = sink.error {
        return Err(e.into());
    }

    for message in flags.messages() {
        tracing::warn!(path = %path.display(), "{message}");
    }
    Ok(())
}
