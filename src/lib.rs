pub mod build;
pub mod config;
pub mod diff;
pub mod emit;
pub mod interner;
pub mod naming;
pub mod resolver;
pub mod snapshot;
pub mod units;
pub mod watch;

mod error;

pub use error::{Error, Result};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::build::{CSS_FILE_NAME, DOCS_FILE_NAME, compile};
use crate::diff::{DiffPolicy, FirstRunPolicy};
use crate::snapshot::{DEFAULT_SNAPSHOT_PATH, FileSnapshotStore};
use crate::watch::WatchOptions;

const DEFAULT_CONFIG_PATH: &str = "tokens.toml";
const DEFAULT_OUT_DIR: &str = "dist";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Build {
        config: String,
        out_dir: String,
        snapshot: Option<String>,
        on_first_run: Option<FirstRunPolicy>,
        minify: bool,
    },
    Watch {
        config: String,
        out_dir: String,
        snapshot: Option<String>,
        on_first_run: Option<FirstRunPolicy>,
        minify: bool,
        poll: bool,
        poll_interval_ms: u64,
        debounce_ms: u64,
    },
    Help,
}

/// Options shared by `build` and every rebuild in `watch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    pub config: String,
    pub out_dir: String,
    pub snapshot: Option<String>,
    pub on_first_run: Option<FirstRunPolicy>,
    pub minify: bool,
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Build {
            config,
            out_dir,
            snapshot,
            on_first_run,
            minify,
        } => run_build(&BuildArgs {
            config,
            out_dir,
            snapshot,
            on_first_run,
            minify,
        }),
        Command::Watch {
            config,
            out_dir,
            snapshot,
            on_first_run,
            minify,
            poll,
            poll_interval_ms,
            debounce_ms,
        } => run_watch(
            BuildArgs {
                config,
                out_dir,
                snapshot,
                on_first_run,
                minify,
            },
            WatchOptions {
                poll,
                poll_interval_ms,
                debounce_ms,
            },
        ),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let Some(cmd) = iter.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "build" => parse_build_args(iter.collect()),
        "watch" => parse_watch_args(iter.collect()),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(Error::cli(format!("unknown command: {}", cmd))),
    }
}

fn parse_build_args(args: Vec<String>) -> Result<Command> {
    let mut build = default_build_args();
    let mut idx = 0;

    while idx < args.len() {
        if !parse_shared_flag("build", &args, &mut idx, &mut build)? {
            match args[idx].as_str() {
                "--poll" | "--poll-interval" | "--debounce" => {
                    return Err(Error::cli(format!(
                        "{} is only supported with watch",
                        args[idx]
                    )));
                }
                value => {
                    return Err(Error::cli(format!("unexpected argument: {}", value)));
                }
            }
        }
        idx += 1;
    }

    Ok(Command::Build {
        config: build.config,
        out_dir: build.out_dir,
        snapshot: build.snapshot,
        on_first_run: build.on_first_run,
        minify: build.minify,
    })
}

fn parse_watch_args(args: Vec<String>) -> Result<Command> {
    let mut build = default_build_args();
    let mut poll = false;
    let mut poll_interval_ms = 500;
    let mut debounce_ms = 300;
    let mut idx = 0;

    while idx < args.len() {
        if !parse_shared_flag("watch", &args, &mut idx, &mut build)? {
            match args[idx].as_str() {
                "--poll" => {
                    poll = true;
                }
                "--poll-interval" => {
                    let value = flag_value("watch", &args, &mut idx, "--poll-interval")?;
                    poll = true;
                    poll_interval_ms = parse_u64_arg(value, "--poll-interval")?;
                }
                "--debounce" => {
                    let value = flag_value("watch", &args, &mut idx, "--debounce")?;
                    debounce_ms = parse_u64_arg(value, "--debounce")?;
                }
                value => {
                    return Err(Error::cli(format!("unexpected argument: {}", value)));
                }
            }
        }
        idx += 1;
    }

    Ok(Command::Watch {
        config: build.config,
        out_dir: build.out_dir,
        snapshot: build.snapshot,
        on_first_run: build.on_first_run,
        minify: build.minify,
        poll,
        poll_interval_ms,
        debounce_ms,
    })
}

fn default_build_args() -> BuildArgs {
    BuildArgs {
        config: DEFAULT_CONFIG_PATH.to_string(),
        out_dir: DEFAULT_OUT_DIR.to_string(),
        snapshot: None,
        on_first_run: None,
        minify: false,
    }
}

/// Consumes one flag understood by both commands. Returns false when
/// `args[*idx]` is not one of them.
fn parse_shared_flag(
    command: &str,
    args: &[String],
    idx: &mut usize,
    build: &mut BuildArgs,
) -> Result<bool> {
    match args[*idx].as_str() {
        "--config" | "-c" => {
            build.config = flag_value(command, args, idx, "--config")?.to_string();
        }
        "--out-dir" | "--output" | "-o" => {
            build.out_dir = flag_value(command, args, idx, "--out-dir")?.to_string();
        }
        "--snapshot" => {
            build.snapshot = Some(flag_value(command, args, idx, "--snapshot")?.to_string());
        }
        "--on-first-run" => {
            let value = flag_value(command, args, idx, "--on-first-run")?;
            build.on_first_run = Some(FirstRunPolicy::parse(value).ok_or_else(|| {
                Error::cli(format!(
                    "--on-first-run expects markAll or markNone, got '{}'",
                    value
                ))
            })?);
        }
        "--minify" => {
            build.minify = true;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn flag_value<'a>(
    command: &str,
    args: &'a [String],
    idx: &mut usize,
    flag: &str,
) -> Result<&'a str> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| Error::cli(format!("{} requires a value for {}", command, flag)))
}

fn run_build(args: &BuildArgs) -> Result<()> {
    let config_path = Path::new(&args.config);
    let config = crate::config::load(config_path)?;
    let project_dir = config_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let snapshot_path = resolve_snapshot_path(
        project_dir,
        args.snapshot.as_deref(),
        config.build.snapshot_path.as_deref(),
    );
    let policy = DiffPolicy {
        on_first_run: args.on_first_run.unwrap_or(config.build.on_first_run),
        on_removed_class: config.build.on_removed_class,
    };
    let store = FileSnapshotStore::new(snapshot_path);
    let output = compile(
        &config,
        &store,
        policy,
        args.minify || config.build.minify,
    )?;

    let out_dir = Path::new(&args.out_dir);
    fs::create_dir_all(out_dir).map_err(|err| Error::io(out_dir, err))?;
    let css_path = out_dir.join(CSS_FILE_NAME);
    fs::write(&css_path, output.css.as_bytes()).map_err(|err| Error::io(&css_path, err))?;
    let docs_path = out_dir.join(DOCS_FILE_NAME);
    fs::write(&docs_path, &output.docs).map_err(|err| Error::io(&docs_path, err))?;

    for key in output.changes.iter() {
        tracing::debug!(key = %key, "changed");
    }
    tracing::info!(
        variables = output.variable_count,
        changed = output.changes.len(),
        "wrote {} and {}",
        css_path.display(),
        docs_path.display()
    );
    Ok(())
}

/// CLI override, then the config's `build.snapshotPath`, then the default;
/// relative paths resolve against the config file's directory.
fn resolve_snapshot_path(
    project_dir: &Path,
    cli_override: Option<&str>,
    configured: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_override {
        return PathBuf::from(path);
    }
    let path = configured.unwrap_or(Path::new(DEFAULT_SNAPSHOT_PATH));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

fn run_watch(args: BuildArgs, options: WatchOptions) -> Result<()> {
    run_build(&args)?;
    let config_path = PathBuf::from(&args.config);
    let build_args = Arc::new(args);
    crate::watch::watch(
        &config_path,
        &options,
        Arc::new(move || run_build(&build_args)),
    )
}

fn print_help() {
    println!("tokenframe");
    println!();
    println!("USAGE:");
    println!(
        "  tokenframe build [--config <path>] [--out-dir <dir>] [--snapshot <path>] [--on-first-run markAll|markNone] [--minify]"
    );
    println!(
        "  tokenframe watch [build options] [--poll] [--poll-interval <ms>] [--debounce <ms>]"
    );
    println!();
    println!("EXAMPLES:");
    println!("  tokenframe build -c tokens.toml -o dist");
    println!("  tokenframe build -c tokens.json --on-first-run markAll");
    println!("  tokenframe watch -c tokens.toml --debounce 250");
    println!("  tokenframe watch --poll --poll-interval 250");
}

fn parse_u64_arg(value: &str, flag: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(Error::cli(format!(
            "{} requires a positive integer, got '{}'",
            flag, value
        ))),
    }
}
