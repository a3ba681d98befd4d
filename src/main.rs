//! bz - query and update Bugzilla from the terminal
//!
//! A thin command-line front end over the `bugzilla_rpc` library. Results
//! are printed as JSON.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, warn};

use bugzilla_rpc::api::Struct;
use bugzilla_rpc::config::ConfigError;
use bugzilla_rpc::error::{AppError, Result};
use bugzilla_rpc::{connect, logging, tracker, AuthMode, ConnectOptions, CredentialStore, Settings, Value};

#[derive(Debug, Parser)]
#[command(name = "bz", version, about = "Query and update Bugzilla over XML-RPC")]
struct Cli {
    /// XML-RPC endpoint, e.g. https://bugzilla.example.com/xmlrpc.cgi
    #[arg(long, global = true)]
    url: Option<String>,

    /// API key to use instead of stored credentials
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log in with this username (needs --password)
    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true, requires = "username")]
    password: Option<String>,

    /// Where to send the API key: auto, header, payload or both
    #[arg(long, global = true, value_parser = parse_auth_mode)]
    auth_mode: Option<AuthMode>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show one or more bugs
    Get {
        #[arg(required = true)]
        ids: Vec<u64>,
        /// Only fetch id and summary
        #[arg(long)]
        summary: bool,
    },
    /// Assign bugs to a user
    Assign {
        #[arg(required = true)]
        ids: Vec<u64>,
        /// Login of the new assignee
        #[arg(long)]
        to: String,
    },
    /// Find bugs linked to an external ticket, e.g. http://tracker.ceph.com/issues/16673
    FindExternal { ticket_url: String },
    /// Make a raw XML-RPC call, e.g. `bz call Product.get --payload '{"names": ["Fedora"]}'`
    Call {
        method: String,
        /// JSON object sent as the call's struct parameter
        #[arg(long)]
        payload: Option<String>,
    },
    /// Open a bug in the browser
    Open { id: u64 },
}

fn parse_auth_mode(s: &str) -> std::result::Result<AuthMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "auto" => Ok(AuthMode::Auto),
        "header" => Ok(AuthMode::Header),
        "payload" => Ok(AuthMode::Payload),
        "both" => Ok(AuthMode::Both),
        other => Err(format!(
            "unknown auth mode '{}' (expected auto, header, payload or both)",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: logging disabled: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err.user_message());
            if let Some(action) = err.suggested_action() {
                eprintln!("hint: {}", action);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match Settings::load() {
        Err(ConfigError::NoConfigDir) => Settings::default(),
        other => other?,
    };

    let mut options = ConnectOptions::new()
        .url(cli.url.unwrap_or(settings.url))
        .auth_mode(cli.auth_mode.unwrap_or(settings.auth_mode));
    if let Some(secs) = cli.timeout.or(settings.timeout_secs) {
        options = options.timeout(Duration::from_secs(secs));
    }
    if let Some(username) = cli.username {
        options = options.login(username, cli.password);
    } else if let Some(key) = cli.api_key {
        options = options.api_key(key);
    } else {
        match CredentialStore::default_location() {
            Ok(store) => options = options.credential_store(store),
            Err(e) => warn!("Not reading stored credentials: {}", e),
        }
    }

    let bz = connect(options).await?;

    match cli.command {
        Command::Get { ids, summary } => {
            let bugs = if summary {
                bz.get_bugs_summaries(&ids).await?
            } else {
                bz.get_bugs(&ids).await?
            };
            print_json(&bugs)
        }
        Command::Assign { ids, to } => {
            if bz.assign(&ids, &to).await? {
                println!("Assigned to {}", to);
            } else {
                println!("{} was already assigned", to);
            }
            Ok(())
        }
        Command::FindExternal { ticket_url } => {
            let (tracker_url, ticket_id) = tracker::parse_ticket_url(&ticket_url)?;
            let bugs = bz.find_by_external_tracker(&tracker_url, &ticket_id).await?;
            print_json(&bugs)
        }
        Command::Call { method, payload } => {
            let payload = match payload {
                Some(json) => parse_payload(&json)?,
                None => Struct::new(),
            };
            let result = bz.call(&method, payload).await?;
            print_json(&result)
        }
        Command::Open { id } => {
            let bug = bz.get_bug(id).await?;
            open::that(&bug.weburl)?;
            println!("{}", bug.weburl);
            Ok(())
        }
    }
}

fn parse_payload(json: &str) -> Result<Struct> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| AppError::other(format!("--payload is not valid JSON: {}", e)))?;

    match Value::from(value) {
        Value::Struct(payload) => Ok(payload),
        _ => Err(AppError::other("--payload must be a JSON object")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::other(format!("could not format output: {}", e)))?;
    println!("{}", text);
    Ok(())
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
    fn test_parse_get() {
        let cli = Cli::try_parse_from(["bz", "get", "1", "2", "--summary"]).unwrap();
        match cli.command {
            Command::Get { ids, summary } => {
                assert_eq!(ids, vec![1, 2]);
                assert!(summary);
            }
            other => panic!("Expected Get, got {:?}", other),
        }
    }

    #[test]
    fn test_password_requires_username() {
        assert!(Cli::try_parse_from(["bz", "--password", "pw", "open", "1"]).is_err());
    }

    #[test]
    fn test_parse_auth_mode() {
        assert_eq!(parse_auth_mode("Header").unwrap(), AuthMode::Header);
        assert!(parse_auth_mode("pigeon").is_err());
    }

    #[test]
    fn test_parse_payload() {
        let payload = parse_payload(r#"{"names": ["Red Hat Ceph Storage"]}"#).unwrap();
        assert_eq!(
            payload.get("names"),
            Some(&Value::from(vec!["Red Hat Ceph Storage"]))
        );
    }

    #[test]
    fn test_parse_payload_rejects_non_object() {
        assert!(parse_payload("[1, 2]").is_err());
        assert!(parse_payload("{").is_err());
    }
}
