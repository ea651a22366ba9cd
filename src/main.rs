//! graphchat — interactive console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args
//!   3. Load config
//!   4. Init logger (CLI `-v` flags > env > config)
//!   5. Build settings, engine backend, and the session
//!   6. Warm up the engine (best-effort)
//!   7. Run the console loop until EOF or /quit

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use graphchat::config;
use graphchat::engine::EngineBackend;
use graphchat::error::AppError;
use graphchat::export;
use graphchat::graph;
use graphchat::logger;
use graphchat::pipeline::Session;
use graphchat::settings::{Settings, SettingsUpdate};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref().map(Path::new))?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        app = %config.app_name,
        work_dir = %config.work_dir.display(),
        engine = %config.engine.backend,
        log_level = %effective_log_level,
        "config loaded"
    );

    std::fs::create_dir_all(&config.work_dir)?;

    let credential_from_env = config.credential.is_some();
    let settings = Settings::from_config(&config)?;
    let backend = EngineBackend::from_config(&config)?;
    let mut session = Session::new(settings, backend, config.work_dir.clone());

    if credential_from_env {
        session.note_env_credential();
    }
    if let Err(e) = session.warm_up().await {
        eprintln!("engine not ready: {e}");
    }

    println!("─────────────────────────────────────────────");
    println!(" graphchat console  (/help for commands)");
    println!("─────────────────────────────────────────────");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => print_help(),
            ("/log", _) => {
                for entry in session.activity().snapshot() {
                    println!("{entry}");
                }
            }
            ("/settings", "") => print_settings(&session),
            ("/settings", rest) => handle_settings(&mut session, rest),
            ("/insert", rest) => handle_insert(&mut session, rest).await,
            ("/stats", _) => print_stats(&session),
            ("/export", rest) => handle_export(&session, rest)?,
            (cmd, _) if cmd.starts_with('/') => {
                println!("unknown command: {cmd} (try /help)");
            }
            _ => {
                // A chat turn. The await below is the busy indicator: the
                // console accepts no input until the engine answers.
                let reply = session.chat(line).await;
                println!("{}", reply.content);
                if let Some(info) = &reply.meta.query_info {
                    println!("  ({info})");
                }
                if let Some(error) = &reply.meta.error {
                    println!("  (error: {error})");
                }
            }
        }
    }

    println!("bye.");
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  <text>                 chat with the index");
    println!("  /insert <text>         insert pasted text");
    println!("  /insert @<path>        insert a local file");
    println!("  /insert url:<url>      insert a fetched web page");
    println!("  /settings              show current settings");
    println!("  /settings <k> <v>      change a setting");
    println!("  /stats                 knowledge graph statistics");
    println!("  /export chat|records   write an export file");
    println!("  /log                   show the activity log");
    println!("  /quit                  exit");
}

fn print_settings(session: &Session) {
    let s = session.settings();
    let credential = if s.credential.is_empty() { "<unset>" } else { "<set>" };
    println!("credential:       {credential}");
    println!("search_mode:      {}", s.search_mode);
    println!("llm_model:        {}", s.llm_model);
    println!("embedding_model:  {}", s.embedding_model);
    println!("temperature:      {}", s.temperature);
    println!("system_prompt:    {}", s.system_prompt);
}

fn handle_settings(session: &mut Session, rest: &str) {
    let Some((field, value)) = rest.split_once(' ').map(|(f, v)| (f, v.trim())) else {
        println!("usage: /settings <field> <value>");
        return;
    };
    let update = match SettingsUpdate::parse_field(field, value) {
        Ok(update) => update,
        Err(e) => {
            println!("{e}");
            return;
        }
    };
    match session.update_settings(update) {
        Ok(_) => {
            if session.needs_reinit() {
                println!("updated {field} — engine will re-initialize on next use");
            } else {
                println!("updated {field}");
            }
        }
        Err(e) => println!("{e}"),
    }
}

async fn handle_insert(session: &mut Session, rest: &str) {
    // Resolve the content source first; empty content is a no-op here, not
    // a pipeline error.
    let content = if let Some(path) = rest.strip_prefix('@') {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                println!("cannot read {path}: {e}");
                return;
            }
        }
    } else if let Some(url) = rest.strip_prefix("url:") {
        match fetch_url(url).await {
            Ok(content) => content,
            Err(e) => {
                println!("cannot fetch {url}: {e}");
                return;
            }
        }
    } else {
        rest.to_string()
    };

    if content.is_empty() {
        println!("nothing to insert");
        return;
    }

    match session.insert(&content).await {
        Ok(()) => println!("content inserted"),
        Err(e) => println!("insert failed: {e}"),
    }
}

async fn fetch_url(url: &str) -> Result<String, String> {
    let response = reqwest::get(url).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    response.text().await.map_err(|e| e.to_string())
}

fn print_stats(session: &Session) {
    let Some(graph) = graph::load(session.work_dir()) else {
        println!("no knowledge graph yet — insert some documents first");
        return;
    };
    let stats = graph.stats();
    println!("nodes:          {}", stats.nodes);
    println!("edges:          {}", stats.edges);
    println!("average degree: {:.2}", stats.average_degree);
    println!("density:        {:.4}", stats.density);
    if !stats.top_nodes.is_empty() {
        println!("most connected:");
        for node in &stats.top_nodes {
            println!("  {}  {}  {}", node.short_hash, node.degree, node.id);
        }
    }
}

fn handle_export(session: &Session, rest: &str) -> Result<(), AppError> {
    let now = chrono::Utc::now();
    let bundle = match rest {
        "chat" => export::chat_markdown(session.history(), session.settings(), now),
        "records" => match graph::load(session.work_dir()) {
            Some(graph) => export::graph_records(&graph, now),
            None => {
                println!("no knowledge graph yet — nothing to export");
                return Ok(());
            }
        },
        _ => {
            println!("usage: /export chat|records");
            return Ok(());
        }
    };

    match bundle {
        Ok(bundle) => {
            let dir = session.work_dir().join("exports");
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(&bundle.filename);
            std::fs::write(&path, &bundle.bytes)?;
            println!("wrote {}", path.display());
        }
        Err(e) => println!("export failed: {e}"),
    }
    Ok(())
}

// ── CLI args ──────────────────────────────────────────────────────────────────

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: graphchat [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help             Print help");
                println!("  -f, --config <PATH>    Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv   Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // Each -v raises verbosity one tier from the config default.
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
