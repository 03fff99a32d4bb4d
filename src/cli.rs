//! Command-line front end.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;

use crate::alias::DEFAULT_PREFIX;
use crate::config::InstallConfig;
use crate::engine::{Engine, Report};

#[derive(Parser, Debug)]
#[command(name = "truststore")]
#[command(about = "Install a CA certificate into the system, NSS and Java trust stores")]
pub struct Cli {
    /// Certificate file, PEM or DER
    pub certificate: PathBuf,

    /// Uninstall the given certificate
    #[arg(long)]
    pub uninstall: bool,

    /// Also use the Java trust store
    #[arg(long)]
    pub java: bool,

    /// Also use the Firefox (NSS) trust stores
    #[arg(long)]
    pub firefox: bool,

    /// Do not use the system trust store
    #[arg(long = "no-system")]
    pub no_system: bool,

    /// Shorthand for -java -firefox
    #[arg(long)]
    pub all: bool,

    /// Verbose output
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Prefix of the name given to the certificate in each store
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,
}

const LONG_FLAGS: &[&str] = &[
    "uninstall",
    "java",
    "firefox",
    "no-system",
    "all",
    "prefix",
    "help",
];

/// Accepts `-uninstall` style flags as well as `--uninstall`. Nothing after
/// `--` is rewritten.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut options_ended = false;
    args.into_iter()
        .map(|arg| {
            if options_ended {
                return arg;
            }
            if arg == "--" {
                options_ended = true;
                return arg;
            }

            let is_long_flag = arg
                .to_str()
                .and_then(|s| s.strip_prefix('-'))
                .and_then(|name| name.split('=').next())
                .map(|name| LONG_FLAGS.contains(&name))
                .unwrap_or(false);

            if is_long_flag {
                let mut long = OsString::from("-");
                long.push(&arg);
                long
            } else {
                arg
            }
        })
        .collect()
}

impl Cli {
    pub fn config(&self) -> InstallConfig {
        let mut config = InstallConfig::from_env().with_prefix(self.prefix.clone());
        config.java = self.java || self.all;
        config.firefox = self.firefox || self.all;
        config.no_system = self.no_system;
        config.verbose = self.verbose;
        config
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn execute(cli: &Cli) -> anyhow::Result<Report> {
    let cert = crate::read_certificate(&cli.certificate)?;
    let engine = Engine::new(cli.config());

    if cli.uninstall {
        engine
            .uninstall(&cert)
            .with_context(|| format!("uninstalling {}", cli.certificate.display()))
    } else {
        engine
            .install(&cert)
            .with_context(|| format!("installing {}", cli.certificate.display()))
    }
}

/// Parses `args` and runs, returning the exit status: 0 on success or help,
/// 1 on usage errors, 2 when the operation fails.
pub fn run<I>(args: I) -> u8
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(normalize_args(args)) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
        }
    };

    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(report) => {
            for (target, outcome) in report.entries() {
                log::info!("{}: {}", target, outcome);
            }
            0
        }
        Err(e) => {
            eprintln!("{e:#}");
            2
        }
    }
}
