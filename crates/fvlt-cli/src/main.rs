//! fvlt: FileVault password-based file encryption
//!
//! Commands:
//!   encrypt <files..>   - encrypt files into .enc containers
//!   decrypt <files..>   - decrypt containers back to their original files
//!   verify <files..>    - check container structure (--deep also decrypts in memory)
//!   info <files..>      - print header metadata without the password
//!   config show         - display current configuration
//!
//! The password comes from FVLT_PASSWORD or an interactive prompt.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use fvlt_container::{
    default_decrypted_path, default_encrypted_path, expected_container_size, ContainerHeader,
    ContainerOptions, ProgressFn,
};
use fvlt_core::config::expand_tilde;
use fvlt_core::{FvltConfig, FvltError, VerificationResult, VerificationSummary};
use fvlt_crypto::{check_strength, PasswordPolicy, PasswordStrength};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "fvlt",
    version,
    about = "FileVault file encryption",
    long_about = "fvlt: encrypt, decrypt and verify files with a password (PBKDF2-HMAC-SHA256 + AES-256-GCM)"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "FVLT_CONFIG",
        default_value = "~/.config/fvlt/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "FVLT_LOG")]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, env = "FVLT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Hide progress bars
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt files (glob patterns are expanded)
    Encrypt {
        /// Files to encrypt
        #[arg(required = true)]
        files: Vec<String>,
        /// Output path (single input only; default: <input><extension>)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite existing output files
        #[arg(long, short = 'f')]
        force: bool,
        /// PBKDF2 iterations (overrides [crypto].kdf_iterations)
        #[arg(long, env = "FVLT_KDF_ITERATIONS")]
        iterations: Option<u32>,
    },

    /// Decrypt containers
    ///
    /// Without --output the stored original filename is used, placed next to
    /// the container.
    Decrypt {
        /// Containers to decrypt
        #[arg(required = true)]
        files: Vec<String>,
        /// Output path (single input only)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite existing output files
        #[arg(long, short = 'f')]
        force: bool,
        /// PBKDF2 iterations used at encryption time
        #[arg(long, env = "FVLT_KDF_ITERATIONS")]
        iterations: Option<u32>,
    },

    /// Verify container structure without decrypting
    Verify {
        /// Containers to verify
        #[arg(required = true)]
        files: Vec<String>,
        /// Also decrypt in memory (requires the password)
        #[arg(long)]
        deep: bool,
        /// Emit results and summary as JSON
        #[arg(long)]
        json: bool,
        /// Verify files in parallel
        #[arg(long, conflicts_with = "deep")]
        parallel: bool,
        /// PBKDF2 iterations for --deep
        #[arg(long, env = "FVLT_KDF_ITERATIONS")]
        iterations: Option<u32>,
    },

    /// Show container header metadata
    Info {
        /// Containers to inspect
        #[arg(required = true)]
        files: Vec<String>,
        /// Also dump the raw header bytes
        #[arg(long)]
        hex: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

/// Raised when at least one file in a batch failed; carries the exit code
/// of the first failure.
#[derive(Debug, thiserror::Error)]
#[error("{failed} of {total} files failed")]
struct BatchFailed {
    code: u8,
    failed: usize,
    total: usize,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // batch failures were already reported file by file
            if e.downcast_ref::<BatchFailed>().is_none() {
                eprintln!("error: {e:#}");
                print_hints(&e);
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = expand_tilde(&cli.config);
    let config = FvltConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, format);
    tracing::debug!(config = %config_path.display(), "fvlt starting");

    match cli.command {
        Commands::Encrypt { files, output, force, iterations } => {
            let options = container_options(&config, iterations, force);
            cmd_encrypt(&config, &options, &files, output.as_deref(), cli.quiet)
        }
        Commands::Decrypt { files, output, force, iterations } => {
            let options = container_options(&config, iterations, force);
            cmd_decrypt(&config, &options, &files, output.as_deref(), cli.quiet)
        }
        Commands::Verify { files, deep, json, parallel, iterations } => {
            let options = container_options(&config, iterations, false);
            cmd_verify(&options, &files, deep, json, parallel)
        }
        Commands::Info { files, hex } => cmd_info(&files, hex),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn container_options(config: &FvltConfig, iterations: Option<u32>, force: bool) -> ContainerOptions {
    let mut options = ContainerOptions::from(config);
    if let Some(n) = iterations {
        options.kdf_iterations = n;
    }
    options.overwrite |= force;
    options
}

// ── Errors and exit codes ─────────────────────────────────────────────────────

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(batch) = err.downcast_ref::<BatchFailed>() {
        return batch.code;
    }
    err.chain()
        .find_map(|e| e.downcast_ref::<FvltError>())
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

fn print_hints(err: &anyhow::Error) {
    if let Some(e) = err.chain().find_map(|e| e.downcast_ref::<FvltError>()) {
        for hint in e.suggestions() {
            eprintln!("  hint: {hint}");
        }
    }
}

/// Per-file outcome tracking for multi-file commands
struct Batch {
    total: usize,
    succeeded: usize,
    failed: usize,
    first_code: Option<u8>,
}

impl Batch {
    fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            first_code: None,
        }
    }

    fn ok(&mut self) {
        self.succeeded += 1;
    }

    fn fail(&mut self, path: &Path, err: &anyhow::Error) {
        eprintln!("✗ {}: {err:#}", path.display());
        print_hints(err);
        self.failed += 1;
        self.first_code.get_or_insert(exit_code_for(err));
    }

    fn finish(self, verb: &str) -> Result<()> {
        if self.total > 1 {
            println!();
            println!(
                "{verb}: {} succeeded, {} failed, {} total",
                self.succeeded, self.failed, self.total
            );
        }
        match self.first_code {
            Some(code) => Err(BatchFailed {
                code,
                failed: self.failed,
                total: self.total,
            }
            .into()),
            None => Ok(()),
        }
    }
}

// ── Input helpers ─────────────────────────────────────────────────────────────

/// Expand glob patterns; plain paths pass through untouched so a missing
/// file is reported by the command itself.
fn expand_paths(args: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for arg in args {
        if !arg.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(arg));
            continue;
        }
        let before = paths.len();
        for entry in glob::glob(arg).with_context(|| format!("invalid glob pattern: {arg}"))? {
            paths.push(entry.with_context(|| format!("expanding {arg}"))?);
        }
        if paths.len() == before {
            anyhow::bail!("no files match {arg}");
        }
    }
    Ok(paths)
}

fn single_output(output: Option<&Path>, inputs: &[PathBuf]) -> Result<()> {
    if output.is_some() && inputs.len() != 1 {
        anyhow::bail!(
            "--output needs exactly one input file, got {}",
            inputs.len()
        );
    }
    Ok(())
}

/// FVLT_PASSWORD if set, otherwise prompt (twice when `confirm`).
fn read_password(confirm: bool) -> Result<SecretString> {
    if let Ok(pw) = std::env::var("FVLT_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    let pw = rpassword::prompt_password("Password: ").context("reading password")?;
    if confirm {
        let again = rpassword::prompt_password("Confirm password: ").context("reading password")?;
        if pw != again {
            return Err(FvltError::InvalidInput("passwords do not match".into()).into());
        }
    }
    Ok(SecretString::from(pw))
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(quiet: bool, prefix: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {msg}") {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_for(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

// ── `fvlt encrypt` ────────────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &FvltConfig,
    options: &ContainerOptions,
    files: &[String],
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let inputs = expand_paths(files)?;
    single_output(output, &inputs)?;

    let password = read_password(true)?;
    PasswordPolicy::from_config(&config.password)
        .validate(&password)
        .context("password rejected")?;
    let strength = check_strength(&password);
    if strength < PasswordStrength::Strong {
        eprintln!("warning: password strength is {strength}");
    }

    let mut batch = Batch::new(inputs.len());
    for input in &inputs {
        let dest = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_encrypted_path(input, &config.files.encrypted_extension));

        let pb = make_progress_bar(quiet, &display_name(input));
        let progress = progress_for(&pb);
        let result =
            fvlt_container::encrypt_file_with_progress(input, &dest, &password, options, Some(&progress))
                .with_context(|| format!("encrypting {}", input.display()));
        pb.finish_and_clear();

        match result {
            Ok(report) => {
                println!(
                    "✓ {} → {} ({} → {}, {:.2?})",
                    input.display(),
                    report.output.display(),
                    fmt_bytes(report.original_size),
                    fmt_bytes(report.container_size),
                    report.elapsed
                );
                batch.ok();
            }
            Err(e) => batch.fail(input, &e),
        }
    }
    batch.finish("encrypt")
}

// ── `fvlt decrypt` ────────────────────────────────────────────────────────────

fn cmd_decrypt(
    config: &FvltConfig,
    options: &ContainerOptions,
    files: &[String],
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let inputs = expand_paths(files)?;
    single_output(output, &inputs)?;
    let password = read_password(false)?;

    let mut batch = Batch::new(inputs.len());
    for input in &inputs {
        let dest = match output {
            Some(p) => p.to_path_buf(),
            None => {
                let stored = ContainerHeader::read_from_path(input)
                    .ok()
                    .map(|h| h.original_name);
                default_decrypted_path(input, stored.as_deref(), &config.files.encrypted_extension)
            }
        };

        let pb = make_progress_bar(quiet, &display_name(input));
        let progress = progress_for(&pb);
        let result =
            fvlt_container::decrypt_file_with_progress(input, &dest, &password, options, Some(&progress))
                .with_context(|| format!("decrypting {}", input.display()));
        pb.finish_and_clear();

        match result {
            Ok(report) => {
                println!(
                    "✓ {} → {} ({}, {:.2?})",
                    input.display(),
                    report.output.display(),
                    fmt_bytes(report.plaintext_size),
                    report.elapsed
                );
                batch.ok();
            }
            Err(e) => batch.fail(input, &e),
        }
    }
    batch.finish("decrypt")
}

// ── `fvlt verify` ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct VerifyReport<'a> {
    results: &'a [VerificationResult],
    summary: VerificationSummary,
}

fn cmd_verify(
    options: &ContainerOptions,
    files: &[String],
    deep: bool,
    json: bool,
    parallel: bool,
) -> Result<()> {
    let inputs = expand_paths(files)?;

    let results = if deep {
        let password = read_password(false)?;
        inputs
            .iter()
            .map(|p| fvlt_container::verify_deep(p, &password, options))
            .collect()
    } else if parallel {
        fvlt_container::par_batch_verify(&inputs)
    } else {
        fvlt_container::batch_verify(&inputs)
    };
    let summary = fvlt_container::summarize(&results);

    if json {
        let report = VerifyReport {
            results: &results,
            summary,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serializing verification report")?
        );
    } else {
        for r in &results {
            print_verification(r, deep);
        }
        if results.len() > 1 {
            println!();
            println!(
                "verify: {} valid, {} invalid, {} total (accessible {}, format ok {}, header ok {}, size ok {})",
                summary.valid,
                summary.invalid,
                summary.total,
                summary.accessible,
                summary.format_ok,
                summary.header_ok,
                summary.size_ok
            );
        }
    }

    match results.iter().find(|r| !r.is_valid) {
        Some(first) => Err(BatchFailed {
            code: verification_exit_code(first),
            failed: summary.invalid,
            total: summary.total,
        }
        .into()),
        None => Ok(()),
    }
}

fn verification_exit_code(r: &VerificationResult) -> u8 {
    if !r.file_accessible {
        2
    } else if r.size_consistent && !r.content_verified {
        // structure fine, decryption dry run failed
        4
    } else {
        5
    }
}

fn print_verification(r: &VerificationResult, deep: bool) {
    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    if r.is_valid {
        println!(
            "✓ {} ({}, {}, {} v{})",
            r.path.display(),
            r.original_name.as_deref().unwrap_or("?"),
            fmt_bytes(r.original_size.unwrap_or(0)),
            r.algorithm.as_deref().unwrap_or("?"),
            r.format_version.unwrap_or(0)
        );
    } else {
        println!(
            "✗ {}: {}",
            r.path.display(),
            r.error.as_deref().unwrap_or("invalid")
        );
    }
    let mut checks = format!(
        "    accessible {}  format {}  header {}  size {}",
        mark(r.file_accessible),
        mark(r.format_valid),
        mark(r.header_valid),
        mark(r.size_consistent)
    );
    if deep {
        checks.push_str(&format!("  content {}", mark(r.content_verified)));
    }
    println!("{checks}  ({:.2?})", r.elapsed);
}

// ── `fvlt info` ───────────────────────────────────────────────────────────────

fn cmd_info(files: &[String], dump_hex: bool) -> Result<()> {
    let inputs = expand_paths(files)?;
    let mut batch = Batch::new(inputs.len());

    for input in &inputs {
        match show_info(input, dump_hex) {
            Ok(()) => batch.ok(),
            Err(e) => batch.fail(input, &e),
        }
    }
    batch.finish("info")
}

fn show_info(path: &Path, dump_hex: bool) -> Result<()> {
    let header = ContainerHeader::read_from_path(path)
        .with_context(|| format!("reading header: {}", path.display()))?;
    header.validate(false)?;

    let file_size = std::fs::metadata(path)?.len();
    let checksum_ok = header.compute_checksum() == header.checksum;
    let expected_size = expected_container_size(&header)
        .map_or_else(|| "overflows u64".to_owned(), |n| n.to_string());

    println!("{}", path.display());
    println!("  format version: {}", header.version);
    println!("  algorithm:      {}", header.algorithm_name().unwrap_or("unknown"));
    println!("  original name:  {}", header.original_name);
    println!("  original size:  {} ({} bytes)", fmt_bytes(header.original_size), header.original_size);
    println!("  container size: {} (expected {expected_size})", file_size);
    println!("  header size:    {} bytes", header.size());
    println!("  salt:           {}", hex::encode(header.salt));
    println!("  nonce:          {}", hex::encode(header.nonce()));
    println!(
        "  checksum:       {} ({})",
        hex::encode(header.checksum),
        if checksum_ok { "ok" } else { "MISMATCH" }
    );
    if dump_hex {
        println!("  header bytes:");
        for line in header.to_bytes().chunks(16) {
            println!("    {}", hex::encode(line));
        }
    }

    if !checksum_ok {
        return Err(FvltError::HeaderCorruption("header checksum mismatch".into()).into());
    }
    Ok(())
}

// ── `fvlt config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &FvltConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_verify_flags() {
        let cli = Cli::try_parse_from(["fvlt", "verify", "--json", "--parallel", "a.enc", "b.enc"])
            .unwrap();
        match cli.command {
            Commands::Verify { files, json, parallel, deep, .. } => {
                assert_eq!(files, vec!["a.enc", "b.enc"]);
                assert!(json && parallel && !deep);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["fvlt", "verify", "--deep", "--parallel", "a.enc"]).is_err());
        assert!(Cli::try_parse_from(["fvlt", "encrypt"]).is_err());
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(0), "0 B");
        assert_eq!(fmt_bytes(1023), "1023 B");
        assert_eq!(fmt_bytes(1536), "1.5 KB");
        assert_eq!(fmt_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_expand_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        for name in ["a.enc", "b.enc", "c.txt"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }

        let pattern = format!("{}/*.enc", tmp.path().display());
        let mut found = expand_paths(&[pattern]).unwrap();
        found.sort();
        assert_eq!(found, vec![tmp.path().join("a.enc"), tmp.path().join("b.enc")]);

        // literal paths pass through even when missing
        let literal = expand_paths(&["missing.enc".to_string()]).unwrap();
        assert_eq!(literal, vec![PathBuf::from("missing.enc")]);

        let none = format!("{}/*.zip", tmp.path().display());
        assert!(expand_paths(&[none]).is_err());
    }

    #[test]
    fn test_exit_codes_survive_context() {
        let err = anyhow::Error::from(FvltError::Authentication).context("decrypting x.enc");
        assert_eq!(exit_code_for(&err), 4);

        let err: anyhow::Error = BatchFailed { code: 5, failed: 1, total: 3 }.into();
        assert_eq!(exit_code_for(&err), 5);

        assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), 1);
    }

    #[test]
    fn test_container_options_overrides() {
        let config = FvltConfig::default();
        let options = container_options(&config, Some(2000), true);
        assert_eq!(options.kdf_iterations, 2000);
        assert!(options.overwrite);

        let options = container_options(&config, None, false);
        assert_eq!(options.kdf_iterations, config.crypto.kdf_iterations);
        assert!(!options.overwrite);
    }

    #[test]
    fn test_verification_exit_codes() {
        let missing = VerificationResult::new("x");
        assert_eq!(verification_exit_code(&missing), 2);

        let corrupt = VerificationResult {
            file_accessible: true,
            format_valid: true,
            ..VerificationResult::new("y")
        };
        assert_eq!(verification_exit_code(&corrupt), 5);
    }
}
