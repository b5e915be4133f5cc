//! votestream CLI — watch a live voting session or replay a captured stream.
//!
//! Usage:
//! ```bash
//! # Follow a live session
//! votestream watch --url https://api.example.com/votings/10/stream --token $TOKEN \
//!     --options-url https://api.example.com/votings/10/options \
//!     --units-url https://api.example.com/votings/10/units
//!
//! # Same, from a config file, reconnecting on drops
//! votestream watch --config votestream.yaml --token $TOKEN --reconnect
//!
//! # Replay a captured event stream offline
//! votestream replay --file capture.sse --options options.json --units units.json
//! ```

mod logging;

use std::env;
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use logging::{init_tracing, LogConfig};
use votestream_client::{
    load_file, parse_list, DirectoryConfig, EngineConfig, VoteStreamEngine,
};
use votestream_core::wire::{WireOption, WireUnit};
use votestream_core::{
    tally, units, ConnectionStatus, StreamSession, TallyEntry, UnitRecord, UnitVoteStatus,
    VotingOption,
};

/// Config file layout: engine settings plus a `log` section.
#[derive(Debug, Deserialize)]
struct CliConfig {
    #[serde(flatten)]
    engine: EngineConfig,
    #[serde(default)]
    log: LogConfig,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "watch" => cmd_watch(&args[2..]).await,
        "replay" => cmd_replay(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("votestream {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("votestream {}", env!("CARGO_PKG_VERSION"));
    println!("Follow live voting sessions over server-sent events\n");
    println!("USAGE:");
    println!("    votestream <COMMAND>\n");
    println!("COMMANDS:");
    println!("    watch      Connect to a live session and print tallies as votes arrive");
    println!("    replay     Run a captured event stream through the tally engine");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("WATCH FLAGS:");
    println!("    --url <URL>           Event-stream endpoint  [required unless --config]");
    println!("    --token <TOKEN>       Session credential (or VOTESTREAM_TOKEN)");
    println!("    --config <FILE>       YAML or JSON config file");
    println!("    --options-url <URL>   Voting options endpoint");
    println!("    --units-url <URL>     Unit roster endpoint");
    println!("    --votes-url <URL>     Already-cast votes endpoint");
    println!("    --reconnect           Reconnect with exponential backoff");
    println!("    --json                One JSON object per update");
    println!("    --log-level <LEVEL>   trace | debug | info | warn | error");
    println!("    --log-json            Structured JSON logs on stderr\n");
    println!("REPLAY FLAGS:");
    println!("    --file <FILE>         Captured event-stream body  [required]");
    println!("    --options <FILE>      Voting options JSON");
    println!("    --units <FILE>        Unit roster JSON");
    println!("    --json                Print the final views as JSON");
}

// ─── watch ────────────────────────────────────────────────────────────────────

async fn cmd_watch(args: &[String]) -> Result<()> {
    let (mut config, mut log) = match parse_flag(args, "--config") {
        Some(path) => {
            let file: CliConfig =
                load_file(&path).with_context(|| format!("loading config {path}"))?;
            (file.engine, file.log)
        }
        None => {
            let url = parse_flag(args, "--url").context("--url or --config is required")?;
            (EngineConfig::single_stream(url), LogConfig::default())
        }
    };
    apply_watch_flags(args, &mut config, &mut log)?;

    let token = parse_flag(args, "--token")
        .or_else(|| env::var("VOTESTREAM_TOKEN").ok())
        .context("--token is required")?;
    let json = has_flag(args, "--json");

    init_tracing(&log);
    tracing::info!(url = %config.stream_url, "starting watch");

    let engine = VoteStreamEngine::new(&config)?;
    let mut handle = engine.connect(token).await?;

    let mut tallies = handle.tallies();
    let mut statuses = handle.unit_statuses();
    let mut connection = handle.connection();
    print_views(&tallies.borrow_and_update(), &statuses.borrow_and_update(), json);

    let interrupted = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break true,
            _ = handle.finished() => break false,
            Ok(()) = connection.changed() => {
                let status = connection.borrow_and_update().clone();
                print_status(&status, json);
            }
            Ok(()) = tallies.changed() => {
                let t = tallies.borrow_and_update().clone();
                let s = statuses.borrow_and_update().clone();
                print_views(&t, &s, json);
            }
            Ok(()) = statuses.changed() => {
                let t = tallies.borrow_and_update().clone();
                let s = statuses.borrow_and_update().clone();
                print_views(&t, &s, json);
            }
        }
    };

    if interrupted {
        handle.close().await;
        return Ok(());
    }

    let last = connection.borrow().clone();
    print_status(&last, json);
    match last.last_error {
        Some(e) => bail!("stream ended: {e}"),
        None => Ok(()),
    }
}

/// Flags override whatever the config file said.
fn apply_watch_flags(args: &[String], config: &mut EngineConfig, log: &mut LogConfig) -> Result<()> {
    if let Some(url) = parse_flag(args, "--url") {
        config.stream_url = url;
    }

    let options_url = parse_flag(args, "--options-url");
    let units_url = parse_flag(args, "--units-url");
    if options_url.is_some() || units_url.is_some() {
        match config.directory.as_mut() {
            Some(dir) => {
                if let Some(url) = options_url {
                    dir.options_url = url;
                }
                if let Some(url) = units_url {
                    dir.units_url = url;
                }
            }
            None => {
                let (Some(options_url), Some(units_url)) = (options_url, units_url) else {
                    bail!("--options-url and --units-url must be given together");
                };
                config.directory = Some(DirectoryConfig {
                    options_url,
                    units_url,
                    votes_url: None,
                    request_timeout_ms: 10_000,
                });
            }
        }
    }
    if let Some(votes_url) = parse_flag(args, "--votes-url") {
        match config.directory.as_mut() {
            Some(dir) => dir.votes_url = Some(votes_url),
            None => bail!("--votes-url needs --options-url and --units-url"),
        }
    }

    if has_flag(args, "--reconnect") {
        config.reconnect.enabled = true;
    }
    if let Some(level) = parse_flag(args, "--log-level") {
        log.level = level;
    }
    if has_flag(args, "--log-json") {
        log.json = true;
    }

    config.validate()?;
    Ok(())
}

fn print_status(status: &ConnectionStatus, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "connection": status }));
        return;
    }
    match &status.last_error {
        Some(e) => println!("[{}] {e}", status.state),
        None => println!("[{}]", status.state),
    }
}

fn print_views(tallies: &[TallyEntry], statuses: &[UnitVoteStatus], json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({ "tallies": tallies, "units": statuses })
        );
        return;
    }

    let total = tally::total_votes(tallies);
    println!("Votes: {total}  Units voted: {}/{}", units::voted_count(statuses), statuses.len());
    for entry in tallies {
        println!(
            "  option {:>4}  {:>6}  {:>5.1}%",
            entry.option_id, entry.vote_count, entry.percentage
        );
    }
}

// ─── replay ───────────────────────────────────────────────────────────────────

fn cmd_replay(args: &[String]) -> Result<()> {
    let file = parse_flag(args, "--file").context("--file is required")?;
    let json = has_flag(args, "--json");

    let mut log = LogConfig::default();
    if let Some(level) = parse_flag(args, "--log-level") {
        log.level = level;
    }
    init_tracing(&log);

    let options: Vec<VotingOption> = match parse_flag(args, "--options") {
        Some(path) => read_list::<WireOption>(&path)?
            .into_iter()
            .map(VotingOption::from)
            .collect(),
        None => vec![],
    };
    let roster: Vec<UnitRecord> = match parse_flag(args, "--units") {
        Some(path) => read_list::<WireUnit>(&path)?
            .into_iter()
            .map(UnitRecord::from)
            .collect(),
        None => vec![],
    };

    let body = std::fs::read(&file).with_context(|| format!("reading {file}"))?;
    let mut session = StreamSession::new();
    session.ingest(&body);
    session.finish();

    let tallies = session.tallies(&options);
    let statuses = session.unit_statuses(&roster, &options);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "tallies": tallies,
                "units": statuses,
                "metrics": session.metrics(),
            }))?
        );
        return Ok(());
    }

    let metrics = session.metrics();
    println!("Replayed {file}");
    println!(
        "  frames: {}  votes: {}  duplicates: {}  parse errors: {}",
        metrics.frames_received, metrics.votes_ingested, metrics.duplicates_absorbed, metrics.parse_errors
    );
    println!();
    print_views(&tallies, &statuses, false);

    if !roster.is_empty() {
        println!();
        for (unit, status) in roster.iter().zip(&statuses) {
            let choice = match (&status.voted_option, status.has_voted) {
                (Some(option), _) => option.text.as_str(),
                (None, true) => "(unknown option)",
                (None, false) => "-",
            };
            let name = unit.participant_name.as_deref().unwrap_or("(vacant)");
            println!("  {:<8} {:<24} {choice}", unit.unit_number, name);
        }
    }
    Ok(())
}

fn read_list<T: serde::de::DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(Path::new(path)).with_context(|| format!("reading {path}"))?;
    parse_list(&raw).with_context(|| format!("parsing {path}"))
}

// ─── flags ────────────────────────────────────────────────────────────────────

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
