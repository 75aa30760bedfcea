use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{Client, DashboardSummary, RemediationState, SecurityEvent, Severity};
use crate::engine::DecisionOutcome;
use crate::remediation::Decision;

const DESCRIPTION_MAX_CHARS: usize = 60;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for diagnostic logs");
    let _ = writeln!(
        stderr,
        "  - see `soarcery --help` for available commands and options"
    );
}

/// Transient, non-fatal message on stderr.
pub fn eprintln_notice(message: &str, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let prefix = if cfg.color && cfg.stderr_is_tty {
        "\x1b[33mnotice:\x1b[0m"
    } else {
        "notice:"
    };
    eprintln!("{prefix} {message}");
}

pub fn print_dashboard(summary: &DashboardSummary, recent: &[SecurityEvent], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "Summary: total={}  remediated={}  unremediated={}  pending approval={}",
        summary.total, summary.remediated, summary.unremediated, summary.pending_approval
    );
    let by = &summary.by_severity;
    let _ = writeln!(
        out,
        "By severity: {}={}  {}={}  {}={}  {}={}",
        format_severity(Severity::Critical, cfg.color),
        by.critical,
        format_severity(Severity::High, cfg.color),
        by.high,
        format_severity(Severity::Medium, cfg.color),
        by.medium,
        format_severity(Severity::Low, cfg.color),
        by.low,
    );
    let _ = writeln!(out);
    let rows = cfg.max_table_rows.min(recent.len());
    if recent.len() > rows {
        let _ = writeln!(out, "Recent events ({rows} of {}):", recent.len());
    } else {
        let _ = writeln!(out, "Recent events ({rows}):");
    }
    write_events_table(&mut out, recent, rows, cfg.color);
}

pub fn print_events(events: &[SecurityEvent], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    if events.is_empty() {
        let _ = writeln!(out, "No events match.");
        return;
    }
    let rows = cfg.max_table_rows.min(events.len());
    write_events_table(&mut out, events, rows, cfg.color);
    if events.len() > rows {
        let _ = writeln!(out, "... ({} more; use --json for all)", events.len() - rows);
    }
}

pub fn print_clients(clients: &[Client], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    if clients.is_empty() {
        let _ = writeln!(out, "No clients.");
        return;
    }

    let headers = ["ACCOUNT", "NAME", "CRITICAL", "HIGH", "MEDIUM", "LOW", "TOTAL"];
    let id_w = column_width(headers[0], clients.iter().map(|c| c.id.as_str()));
    let name_w = column_width(headers[1], clients.iter().map(|c| c.name.as_str()));
    let num_w = headers[2..].iter().map(|h| h.len()).max().unwrap_or(0);

    let _ = writeln!(
        out,
        "{}  {}  {}",
        pad_end_display(headers[0], id_w),
        pad_end_display(headers[1], name_w),
        headers[2..]
            .iter()
            .map(|h| pad_start_display(h, num_w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for c in clients {
        let n = &c.event_count;
        let counts = [n.critical, n.high, n.medium, n.low, n.total]
            .iter()
            .map(|v| pad_start_display(&v.to_string(), num_w))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(
            out,
            "{}  {}  {counts}",
            pad_end_display(&c.id, id_w),
            pad_end_display(&c.name, name_w)
        );
    }
}

pub fn print_event_detail(event: &SecurityEvent, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let mut rows: Vec<(&str, String)> = vec![
        ("id", event.id.clone()),
        ("client", format!("{} ({})", event.client_name, event.client_id)),
        ("severity", format_severity(event.severity, cfg.color)),
        ("type", event.event_type.clone()),
        ("description", event.description.clone()),
        ("state", state_label(event.remediation_state()).to_string()),
        (
            "needs approval",
            (if event.needs_approval() { "yes" } else { "no" }).to_string(),
        ),
    ];
    let optional = [
        ("timestamp", event.timestamp.clone()),
        ("source ip", event.source_ip.clone()),
        ("destination ip", event.destination_ip.clone()),
        ("protocol", event.protocol.clone()),
        (
            "source location",
            event.source_location.as_ref().map(|l| {
                [l.city.as_deref(), l.country.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
        ),
        ("first observed", event.first_observed.clone()),
        ("last observed", event.last_observed.clone()),
        ("updated", event.updated_at.clone()),
        ("remediated at", event.remediation_timestamp.clone()),
        ("remediation", event.remediation_details.clone()),
        ("key", event.key().map(str::to_string)),
    ];
    rows.extend(
        optional
            .into_iter()
            .filter_map(|(label, value)| value.map(|v| (label, v))),
    );

    let label_w = rows
        .iter()
        .map(|(l, _)| visible_width_ansi(l))
        .max()
        .unwrap_or(0);
    for (label, value) in rows {
        let _ = writeln!(out, "{}  {value}", pad_end_display(label, label_w));
    }
}

pub fn print_decision(decision: Decision, outcome: &DecisionOutcome, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let verb = match decision {
        Decision::Approve => "Approved",
        Decision::Reject => "Rejected",
    };
    println!(
        "{verb} remediation for {} ({})",
        outcome.event.id,
        state_label(outcome.event.remediation_state())
    );
    if let Some(message) = outcome.receipt.message.as_deref() {
        println!("upstream: {message}");
    }
    if let Some(path) = &outcome.audit_log {
        println!("log: {}", path.display());
    }
    if let Some(err) = &outcome.audit_error {
        eprintln_notice(&format!("decision was applied but its log could not be written: {err}"), cfg);
    }
}

fn write_events_table(out: &mut dyn Write, events: &[SecurityEvent], rows: usize, color: bool) {
    let label_sev = "SEVERITY";
    let label_state = "STATE";
    let label_id = "ID";
    let label_client = "CLIENT";
    let label_time = "TIMESTAMP";
    let label_desc = "DESCRIPTION";

    let shown = &events[..rows.min(events.len())];
    let sev_w = Severity::ALL
        .iter()
        .map(|s| s.as_str().len())
        .max()
        .unwrap_or(0)
        .max(label_sev.len());
    let state_w = column_width(
        label_state,
        shown.iter().map(|e| state_label(e.remediation_state())),
    );
    let id_w = column_width(label_id, shown.iter().map(|e| e.id.as_str()));
    let client_w = column_width(label_client, shown.iter().map(|e| e.client_id.as_str()));
    let time_w = column_width(
        label_time,
        shown.iter().map(|e| e.timestamp.as_deref().unwrap_or("-")),
    );

    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}",
        pad_end_display(label_sev, sev_w),
        pad_end_display(label_state, state_w),
        pad_end_display(label_id, id_w),
        pad_end_display(label_client, client_w),
        pad_end_display(label_time, time_w),
        label_desc
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}",
        "-".repeat(sev_w),
        "-".repeat(state_w),
        "-".repeat(id_w),
        "-".repeat(client_w),
        "-".repeat(time_w),
        "-".repeat(label_desc.len())
    );

    for event in shown {
        let sev = pad_end_ansi(&format_severity(event.severity, color), sev_w);
        let _ = writeln!(
            out,
            "{sev}  {}  {}  {}  {}  {}",
            pad_end_display(state_label(event.remediation_state()), state_w),
            pad_end_display(&event.id, id_w),
            pad_end_display(&event.client_id, client_w),
            pad_end_display(event.timestamp.as_deref().unwrap_or("-"), time_w),
            truncate_middle(&event.description, DESCRIPTION_MAX_CHARS)
        );
    }
}

pub fn state_label(state: RemediationState) -> &'static str {
    match state {
        RemediationState::Open => "open",
        RemediationState::ApprovedPending => "approved",
        RemediationState::Remediated => "remediated",
        RemediationState::Rejected => "rejected",
        RemediationState::RemediatedUpstream => "remediated (upstream)",
    }
}

pub fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Severity::Low => "90",
        Severity::Medium => "33",
        Severity::High => "31",
        Severity::Critical => "1;31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(visible_width_ansi)
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(header))
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();

    format!("{prefix}...{suffix}")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    pad_end_ansi(s, width)
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
