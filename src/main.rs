//! Purpose: `keyscope` CLI entry point.
//! Role: Binary crate root; parses args, sets up logging, runs commands, emits JSON on stdout.
//! Invariants: Commands emit JSON on stdout (pretty on a terminal, compact otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Failed mutation outcomes still print the reloaded records.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod seed;

use keyscope::api::{Error, ErrorKind, KeyType, to_exit_code};
use keyscope::core::config::DEFAULT_URL;
use keyscope::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `keyscope --help`."));
            }
        },
    };

    init_tracing(cli.log.as_deref());
    command_dispatch::dispatch_command(cli).map_err(add_connection_hint)
}

fn init_tracing(filter: Option<&str>) {
    let env_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "keyscope",
    version,
    about = "Browse and edit the keyspace of a Redis-compatible server",
    after_help = r#"EXAMPLES
  $ keyscope scan                       # every key with its type and value
  $ keyscope scan 'user:*' --group :    # keys grouped into a prefix tree
  $ keyscope add todos --type list 'coffee,code'
  $ keyscope rm status todos
  $ keyscope --db 1 databases

NOTES
  - Default server: localhost:6379 (override with --url)
  - --memory runs against an in-process store, optionally seeded with --seed"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, default_value = DEFAULT_URL, help = "Server address (host:port or redis://host:port)")]
    url: String,
    #[arg(long, default_value = "0", help = "Database index")]
    db: String,
    #[arg(long, help = "Use an in-process store instead of a server")]
    memory: bool,
    #[arg(
        long,
        requires = "memory",
        value_name = "FILE",
        help = "JSON file of keys to load into the in-process store"
    )]
    seed: Option<PathBuf>,
    #[arg(long, default_value = "5s", help = "Connect timeout (e.g. 500ms, 5s)")]
    connect_timeout: String,
    #[arg(long, default_value = "30s", help = "Socket read/write timeout")]
    io_timeout: String,
    #[arg(long, value_name = "FILTER", help = "Log filter (default: $RUST_LOG or warn)")]
    log: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KeyTypeArg {
    String,
    List,
    Set,
    Hash,
    Zset,
}

impl From<KeyTypeArg> for KeyType {
    fn from(value: KeyTypeArg) -> Self {
        match value {
            KeyTypeArg::String => KeyType::String,
            KeyTypeArg::List => KeyType::List,
            KeyTypeArg::Set => KeyType::Set,
            KeyTypeArg::Hash => KeyType::Hash,
            KeyTypeArg::Zset => KeyType::ZSet,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Load every key matching a pattern")]
    Scan {
        #[arg(default_value = "*", help = "Glob pattern over key names")]
        pattern: String,
        #[arg(long, value_name = "SEP", help = "Group keys into a tree by this separator")]
        group: Option<String>,
    },
    #[command(
        about = "Add a value to a key, then reload",
        long_about = r#"Add a value to a key, then reload the keyspace.

STRING overwrites the key. LIST and SET split VALUE on commas and push or add
each element. HASH and ZSET are not supported and report a failed outcome."#
    )]
    Add {
        key: String,
        #[arg(long = "type", value_enum)]
        key_type: KeyTypeArg,
        value: String,
        #[arg(long, default_value = "*", help = "Pattern for the reload")]
        pattern: String,
    },
    #[command(about = "Remove loaded keys, then reload")]
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, default_value = "*", help = "Pattern the keys are selected from")]
        pattern: String,
    },
    #[command(about = "List the databases the server exposes")]
    Databases,
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

fn parse_duration(input: &str) -> Result<Duration, Error> {
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid duration `{input}`"))
            .with_hint("Use a number plus ms|s|m (e.g. 5s).")
    };
    let trimmed = input.trim();
    let split = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .ok_or_else(invalid)?;
    let (num_str, unit) = trimmed.split_at(split);
    let value: u64 = num_str.parse().map_err(|_| invalid())?;
    let millis = match unit {
        "ms" => value,
        "s" => value.saturating_mul(1_000),
        "m" => value.saturating_mul(60_000),
        _ => return Err(invalid()),
    };
    if millis == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(millis))
}

fn add_connection_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Connection || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check that the server is reachable, or use --memory for a local store.")
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("keyscope {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "keyscope",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice) {
    if io::stderr().is_terminal() {
        eprintln!("notice: {}", notice.message);
        return;
    }

    let json = serde_json::to_string(&notice_json(notice)).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Connection => "connection failed".to_string(),
        ErrorKind::UnknownType => "unsupported key type".to_string(),
        ErrorKind::UnsupportedMutation => "unsupported mutation".to_string(),
        ErrorKind::InvalidSelection => "invalid selection".to_string(),
        ErrorKind::StoreOperation => "store operation failed".to_string(),
        ErrorKind::Protocol => "protocol error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key.to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(key) = err.key() {
        lines.push(format!("key: {key}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{Cli, error_json, parse_duration};
    use clap::CommandFactory;
    use keyscope::api::{Error, ErrorKind};
    use std::time::Duration;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn durations_parse_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn durations_reject_bad_input() {
        for input in ["", "5", "s", "0s", "5h", "-1s"] {
            let err = parse_duration(input).expect_err(input);
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }

    #[test]
    fn error_json_carries_key_and_hint() {
        let err = Error::new(ErrorKind::InvalidSelection)
            .with_message("no loaded record for key")
            .with_hint("scan first")
            .with_key("todos");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "InvalidSelection");
        assert_eq!(value["error"]["key"], "todos");
        assert_eq!(value["error"]["hint"], "scan first");
    }
}
