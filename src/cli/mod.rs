use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::api::HttpFindingsApi;
use crate::config::EffectiveConfig;
use crate::core::{EventFilter, Role, SecurityEvent, Session, Severity, StatusFilter};
use crate::engine::{Engine, EngineError, EngineOptions};
use crate::remediation::{Decision, EventBoard};
use crate::ui::UiConfig;

mod interactive;

use interactive::Selection;

#[derive(Debug, Parser)]
#[command(
    name = "soarcery",
    version,
    about = "Security findings dashboard: triage GuardDuty/Security Hub events and approve or reject remediation"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Request timeout in seconds (overrides `api.timeout_secs`).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    #[arg(long, global = true)]
    pub user: Option<String>,
    #[arg(long, global = true)]
    pub role: Option<Role>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check credentials against the findings API.
    Login,
    Dashboard,
    Events(EventsArgs),
    Clients,
    Show(ShowArgs),
    /// High or critical events waiting for a remediation decision.
    Pending,
    Approve(DecideArgs),
    Reject(DecideArgs),
    /// Pick pending events and decide them in one go.
    Review,
    /// Ask the upstream to generate a report for an account.
    Report(AccountArgs),
    Password(AccountArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    #[arg(long)]
    pub client: Option<String>,
    #[arg(long)]
    pub severity: Option<Severity>,
    #[arg(long, default_value_t = StatusFilter::All)]
    pub status: StatusFilter,
    #[arg(long)]
    pub search: Option<String>,
    /// Load finding details for every listed event.
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub id: String,
    /// Print the stored finding as the upstream keeps it instead of the event view.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct DecideArgs {
    pub id: String,
    /// Skip the confirmation prompt.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct AccountArgs {
    pub account: String,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::home_dir()?;

    let env_config_path = std::env::var_os("SOARCERY_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;
    apply_flag_overrides(&mut cfg, &cli);

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match &cli.command {
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "soarcery", &mut out);
            return Ok(());
        }
        Commands::Config(args) => {
            if args.show {
                let shown = cfg.redacted();
                if cli.json {
                    write_json(&shown)?;
                } else {
                    println!("{}", toml::to_string_pretty(&shown)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `soarcery config --show`");
            }
            return Ok(());
        }
        _ => {}
    }

    let session = session_from_config(&cfg)?;
    if matches!(
        cli.command,
        Commands::Approve(_) | Commands::Reject(_) | Commands::Review
    ) && !session.can_decide_remediation()
    {
        return Err(crate::exit::invalid_args(format!(
            "remediation decisions require the admin role (current role: {})",
            session.role
        )));
    }

    let api = HttpFindingsApi::builder()
        .endpoint(cfg.api.endpoint.clone().unwrap_or_default())
        .api_key(cfg.api.api_key.clone().unwrap_or_default())
        .timeout(Duration::from_secs(cfg.api.timeout_secs))
        .build()
        .map_err(|err| crate::exit::invalid_args_err(err.into()))?;
    debug!(endpoint = api.endpoint(), user = %session.username, role = %session.role, "session ready");

    let engine = Engine::new(
        Arc::new(api),
        session,
        EngineOptions {
            show_progress: stderr_is_tty && !cli.quiet && !cli.json,
            audit_log_dir: Some(crate::logs::logs_dir(&home_dir)),
        },
    );

    match cli.command {
        Commands::Login => {
            let Some(password) = interactive::prompt_line("Password: ")? else {
                return Err(crate::exit::invalid_args("login: no password given on stdin"));
            };
            let ok = engine.authenticate(&password).await?;
            let session = engine.session();
            if cli.json {
                write_json(&serde_json::json!({
                    "authenticated": ok,
                    "username": session.username,
                    "role": session.role,
                }))?;
            } else if ok && !ui_cfg.quiet {
                println!("Authenticated as {} ({})", session.username, session.role);
            }
            if !ok {
                return Err(crate::exit::failed(format!(
                    "authentication failed for {}",
                    session.username
                )));
            }
        }
        Commands::Dashboard => {
            let events = engine.events().await?;
            if cli.json {
                write_json(&engine.report(events))?;
            } else {
                let summary = engine.summary(&events);
                crate::ui::print_dashboard(&summary, &events, &ui_cfg);
            }
        }
        Commands::Events(args) => {
            let events = match args.client.as_deref() {
                Some(account) => engine.client_events(account).await?,
                None => engine.events().await?,
            };
            let filter = EventFilter {
                search: args.search,
                severity: args.severity,
                status: args.status,
            };
            let mut events = filter.apply(&events);
            if args.detailed {
                events = enrich_with_notices(&engine, events, &ui_cfg).await;
            }
            if cli.json {
                write_json(&events)?;
            } else {
                crate::ui::print_events(&events, &ui_cfg);
            }
        }
        Commands::Clients => {
            let clients = engine.clients().await?;
            if cli.json {
                write_json(&clients)?;
            } else {
                crate::ui::print_clients(&clients, &ui_cfg);
            }
        }
        Commands::Show(args) => {
            let event = engine
                .event(&args.id)
                .await?
                .ok_or_else(|| EngineError::UnknownEvent(args.id.clone()))?;
            if args.raw {
                write_json(&engine.raw_finding(&event).await?)?;
                return Ok(());
            }
            let enriched = engine.enrich_event(event).await;
            if let Some(warning) = &enriched.warning {
                crate::ui::eprintln_notice(warning, &ui_cfg);
            }
            if cli.json {
                write_json(&enriched.event)?;
            } else {
                crate::ui::print_event_detail(&enriched.event, &ui_cfg);
            }
        }
        Commands::Pending => {
            let events = engine.pending().await?;
            if cli.json {
                write_json(&events)?;
            } else {
                crate::ui::print_events(&events, &ui_cfg);
            }
        }
        Commands::Approve(args) => {
            decide_one(&engine, Decision::Approve, &args, cli.json, &ui_cfg).await?;
        }
        Commands::Reject(args) => {
            decide_one(&engine, Decision::Reject, &args, cli.json, &ui_cfg).await?;
        }
        Commands::Review => {
            if cli.json {
                return Err(crate::exit::invalid_args("review cannot be combined with --json"));
            }
            if !(ui_cfg.stdin_is_tty && ui_cfg.stdout_is_tty) {
                return Err(crate::exit::invalid_args(
                    "review requires a TTY (stdin + stdout)",
                ));
            }
            review(&engine, &ui_cfg).await?;
        }
        Commands::Report(args) => {
            engine.generate_report(&args.account).await?;
            if cli.json {
                write_json(&serde_json::json!({
                    "account": args.account,
                    "requested": true,
                }))?;
            } else if !ui_cfg.quiet {
                println!(
                    "Report generation requested for {}; it will be delivered when ready.",
                    args.account
                );
            }
        }
        Commands::Password(args) => {
            let current = interactive::prompt_line("Current password: ")?.unwrap_or_default();
            let new = interactive::prompt_line("New password: ")?.unwrap_or_default();
            engine
                .reset_password(&args.account, &current, &new)
                .await
                .with_context(|| format!("password change for {} failed", args.account))?;
            if !ui_cfg.quiet {
                println!("Password updated for {}", args.account);
            }
        }
        Commands::Completion(_) | Commands::Config(_) => {}
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("soarcery=debug,warn")
    } else {
        std::env::var("SOARCERY_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|v| EnvFilter::try_new(v).ok())
            .unwrap_or_else(|| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_flag_overrides(cfg: &mut EffectiveConfig, cli: &Cli) {
    if let Some(timeout) = cli.timeout {
        cfg.api.timeout_secs = timeout;
    }
    if let Some(user) = cli.user.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        cfg.session.username = Some(user.to_string());
    }
    if let Some(role) = cli.role {
        cfg.session.role = role;
    }
}

fn session_from_config(cfg: &EffectiveConfig) -> Result<Session> {
    match (cfg.session.username.as_deref(), cfg.session.role) {
        (Some(username), role) => Ok(Session::new(username, role)),
        (None, Role::Admin) => Ok(Session::new("admin", Role::Admin)),
        (None, Role::Client) => Err(crate::exit::invalid_args(
            "no user configured: pass --user, set SOARCERY_USER, or set session.username",
        )),
    }
}

async fn enrich_with_notices(
    engine: &Engine<HttpFindingsApi>,
    events: Vec<SecurityEvent>,
    ui_cfg: &UiConfig,
) -> Vec<SecurityEvent> {
    engine
        .enrich_all(events)
        .await
        .into_iter()
        .map(|enriched| {
            if let Some(warning) = &enriched.warning {
                crate::ui::eprintln_notice(warning, ui_cfg);
            }
            enriched.event
        })
        .collect()
}

async fn decide_one(
    engine: &Engine<HttpFindingsApi>,
    decision: Decision,
    args: &DecideArgs,
    json: bool,
    ui_cfg: &UiConfig,
) -> Result<()> {
    let mut board = EventBoard::new(engine.events().await?);
    let Some(event) = board.get(&args.id) else {
        return Err(EngineError::UnknownEvent(args.id.clone()).into());
    };

    if !args.yes {
        if !(ui_cfg.stdin_is_tty && ui_cfg.stdout_is_tty) {
            return Err(crate::exit::invalid_args(format!(
                "{decision} needs confirmation: run on a TTY or pass --yes"
            )));
        }
        if !ui_cfg.quiet {
            crate::ui::print_event_detail(event, ui_cfg);
        }
        let verb = decision.as_str();
        if !confirm_exact(
            &format!("Type '{verb}' to {verb} remediation for {}: ", args.id),
            verb,
        )? {
            if !ui_cfg.quiet {
                eprintln!("Cancelled.");
            }
            return Ok(());
        }
    }

    let outcome = engine.decide(&mut board, &args.id, decision).await?;
    if json {
        write_json(&serde_json::json!({
            "decision": decision,
            "event": outcome.event,
            "upstream_message": outcome.receipt.message,
            "log": outcome.audit_log,
        }))?;
        if let Some(err) = &outcome.audit_error {
            crate::ui::eprintln_notice(
                &format!("decision was applied but its log could not be written: {err}"),
                ui_cfg,
            );
        }
    } else {
        crate::ui::print_decision(decision, &outcome, ui_cfg);
    }
    Ok(())
}

async fn review(engine: &Engine<HttpFindingsApi>, ui_cfg: &UiConfig) -> Result<()> {
    let mut board = EventBoard::new(engine.events().await?);
    let pending: Vec<SecurityEvent> = board
        .events()
        .iter()
        .filter(|e| e.needs_approval())
        .cloned()
        .collect();
    if pending.is_empty() {
        if !ui_cfg.quiet {
            println!("Nothing is waiting for approval.");
        }
        return Ok(());
    }

    for (i, event) in pending.iter().enumerate() {
        println!(
            "{:>3}. [{}] {}  {}  {}",
            i + 1,
            crate::ui::format_severity(event.severity, ui_cfg.color),
            event.id,
            event.client_id,
            event.description
        );
    }

    let selected: Vec<&SecurityEvent> = match interactive::prompt_event_selection(pending.len())
        .map_err(crate::exit::invalid_args_err)?
    {
        Selection::None => {
            eprintln!("Cancelled.");
            return Ok(());
        }
        Selection::All => pending.iter().collect(),
        Selection::Indices(indices) => indices.into_iter().map(|i| &pending[i]).collect(),
    };
    let Some(decision) = interactive::prompt_decision()? else {
        eprintln!("Cancelled.");
        return Ok(());
    };

    let mut failures = 0usize;
    for event in selected {
        match engine.decide(&mut board, &event.id, decision).await {
            Ok(outcome) => crate::ui::print_decision(decision, &outcome, ui_cfg),
            Err(err) => {
                failures += 1;
                crate::ui::eprintln_notice(&format!("{}: {err:#}", event.id), ui_cfg);
            }
        }
    }
    if failures > 0 {
        return Err(crate::exit::upstream(format!(
            "{failures} remediation decision(s) failed"
        )));
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn confirm_exact(prompt: &str, expected: &str) -> Result<bool> {
    Ok(interactive::prompt_line(prompt)?.is_some_and(|input| input.trim() == expected))
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
