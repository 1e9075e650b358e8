//! CLI entrypoint for `provisioner`.
//!
//! Parses command-line arguments, validates inputs and run settings, loads
//! the roster and department table, connects to the directory, provisions
//! every record, prints a terminal summary and writes the audit log.
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error, info, warn};
use provisioner::{
    config::{DEFAULT_MAX_RECORDS, PasswordMode, RunConfig},
    directory::ldap::{LdapDirectory, LdapSettings},
    engine::Provisioner,
    export::{save_outcome_log, save_outcomes_csv},
    input::{load_departments, load_people},
    report::render_summary,
    secret_log::{EncryptedSecretLog, SecretKey, SecretSink},
};

#[derive(Parser, Debug)]
#[command(
    name = "provisioner",
    version,
    about = "Bulk directory account provisioner"
)]
struct Args {
    /// Roster CSV (FirstName, LastName, DepartmentID)
    #[arg(short = 'u', long = "users")]
    users: PathBuf,

    /// Department CSV (DepartmentID, OU)
    #[arg(short = 'd', long = "departments")]
    departments: PathBuf,

    /// Field delimiter used by both CSV files
    #[arg(long = "delimiter", default_value_t = ',')]
    delimiter: char,

    /// Directory URL, e.g. ldaps://dc1.example.local
    #[arg(long = "ldap-url", env = "PROVISIONER_LDAP_URL")]
    ldap_url: String,

    /// DN to bind as (anonymous when omitted)
    #[arg(long = "bind-dn", env = "PROVISIONER_BIND_DN")]
    bind_dn: Option<String>,

    #[arg(long = "bind-password", env = "PROVISIONER_BIND_PASSWORD", hide_env_values = true)]
    bind_password: Option<String>,

    /// Search base for identifier lookups
    #[arg(long = "base-dn", env = "PROVISIONER_BASE_DN")]
    base_dn: String,

    /// Upgrade a plain ldap:// connection with StartTLS
    #[arg(long = "starttls")]
    starttls: bool,

    /// Skip TLS certificate verification
    #[arg(long = "no-tls-verify")]
    no_tls_verify: bool,

    /// Connection timeout in seconds
    #[arg(long = "timeout", default_value_t = 10)]
    timeout_secs: u64,

    /// Principal name suffix, e.g. @example.local
    #[arg(long = "upn-suffix", env = "PROVISIONER_UPN_SUFFIX")]
    upn_suffix: String,

    /// Mail domain (defaults to the principal suffix)
    #[arg(long = "mail-domain", env = "PROVISIONER_MAIL_DOMAIN")]
    mail_domain: Option<String>,

    /// How initial passwords are chosen
    #[arg(long = "password-mode", value_enum, default_value_t = PasswordChoice::Random)]
    password_mode: PasswordChoice,

    /// Initial password for --password-mode fixed
    #[arg(long = "fixed-password", env = "PROVISIONER_FIXED_PASSWORD", hide_env_values = true)]
    fixed_password: Option<String>,

    /// Append generated passwords, encrypted, to this file
    #[arg(long = "secret-log")]
    secret_log: Option<PathBuf>,

    /// 32-byte key for --secret-log, as hex or base64
    #[arg(long = "secret-log-key", env = "PROVISIONER_SECRET_LOG_KEY", hide_env_values = true)]
    secret_log_key: Option<String>,

    /// Maximum records processed in one run
    #[arg(long = "max-records", default_value_t = DEFAULT_MAX_RECORDS)]
    max_records: usize,

    /// Resolve and check every record without creating accounts
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Directory for the audit log and outcome CSV
    #[arg(short = 'o', long = "output", default_value = ".")]
    output: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress summary output (the audit log is still written)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PasswordChoice {
    Random,
    Fixed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn delimiter_byte(c: char) -> Result<u8> {
    if !c.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {c:?}");
    }
    Ok(c as u8)
}

fn run_config(args: &Args) -> RunConfig {
    RunConfig {
        max_records: args.max_records,
        principal_suffix: args.upn_suffix.clone(),
        mail_domain: args
            .mail_domain
            .clone()
            .unwrap_or_else(|| args.upn_suffix.clone()),
        password_mode: match args.password_mode {
            PasswordChoice::Random => PasswordMode::Random,
            PasswordChoice::Fixed => PasswordMode::Fixed,
        },
        fixed_password: args.fixed_password.clone(),
        dry_run: args.dry_run,
    }
}

fn verify_inputs(args: &Args, config: &RunConfig) -> Result<()> {
    for p in [&args.users, &args.departments] {
        if !p.exists() {
            bail!("input file not found: {}", p.display());
        }
    }
    delimiter_byte(args.delimiter)?;
    config.validate()?;
    if config.password_mode == PasswordMode::Fixed && config.fixed_secret().is_none() {
        warn!("fixed password mode without --fixed-password; every record will fail");
    }
    if args.bind_dn.is_none() && args.bind_password.is_some() {
        bail!("--bind-password given without --bind-dn");
    }
    Ok(())
}

/// Secret sink for random passwords. A missing or invalid key disables it.
fn secret_sink(args: &Args, config: &RunConfig) -> Option<EncryptedSecretLog> {
    if config.password_mode != PasswordMode::Random {
        return None;
    }
    let path = args.secret_log.as_ref()?;
    match args.secret_log_key.as_deref().and_then(SecretKey::parse) {
        Some(key) => {
            let sink = EncryptedSecretLog::new(path, key);
            info!("recording generated passwords to {}", sink.path().display());
            Some(sink)
        }
        None => {
            warn!("no valid 32-byte secret log key; generated passwords will not be recorded");
            None
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    // Configure color policy
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    let config = run_config(&args);
    if let Err(e) = verify_inputs(&args, &config) {
        error!("{}", e);
        std::process::exit(2);
    }
    let delimiter = args.delimiter as u8;

    let people = match load_people(&args.users, delimiter) {
        Ok(p) => p,
        Err(e) => {
            error!("failed to load roster: {:#}", e);
            std::process::exit(3);
        }
    };
    let departments = match load_departments(&args.departments, delimiter) {
        Ok(d) => d,
        Err(e) => {
            error!("failed to load departments: {:#}", e);
            std::process::exit(3);
        }
    };
    info!(
        "loaded {} people and {} departments",
        people.len(),
        departments.len()
    );

    let settings = LdapSettings {
        url: args.ldap_url.clone(),
        bind_dn: args.bind_dn.clone(),
        bind_password: args.bind_password.clone(),
        base_dn: args.base_dn.clone(),
        starttls: args.starttls,
        no_tls_verify: args.no_tls_verify,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let mut directory = match LdapDirectory::connect(&settings) {
        Ok(d) => d,
        Err(e) => {
            error!("{}", e);
            std::process::exit(4);
        }
    };

    let mut sink = secret_sink(&args, &config);
    let log = {
        let sink: Option<&mut dyn SecretSink> = sink.as_mut().map(|s| s as &mut dyn SecretSink);
        Provisioner::new(&config, &mut directory, sink).run(&people, &departments)
    };
    directory.close();

    if !args.quiet {
        println!("{}", render_summary(&log));
    }

    if let Err(e) = fs::create_dir_all(&args.output) {
        error!(
            "failed to create output directory {}: {}",
            args.output.display(),
            e
        );
        std::process::exit(5);
    }
    let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
    let log_path = args.output.join(format!("provisioner_{}.log", ts));
    let csv_path = args.output.join(format!("provisioner_outcomes_{}.csv", ts));
    if let Err(e) = save_outcome_log(&log, &log_path) {
        error!("failed to write {}: {:#}", log_path.display(), e);
        std::process::exit(5);
    }
    if let Err(e) = save_outcomes_csv(&log, &csv_path) {
        error!("failed to write {}: {:#}", csv_path.display(), e);
        std::process::exit(5);
    }
    if !args.quiet {
        println!("{} {}", "Audit log:".bold(), log_path.display());
    }
}
