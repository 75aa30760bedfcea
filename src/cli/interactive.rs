use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};

use crate::remediation::Decision;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    None,
    Indices(Vec<usize>),
}

pub(crate) fn prompt_event_selection(event_count: usize) -> Result<Selection> {
    let input = prompt_line("Select events (e.g. 1,3-5 / all / none) [default: none]: ")?;
    match input {
        Some(input) if !input.trim().is_empty() => parse_selection(&input, event_count),
        _ => Ok(Selection::None),
    }
}

pub(crate) fn prompt_decision() -> Result<Option<Decision>> {
    let Some(input) = prompt_line("Approve or reject the selected events? [approve/reject/cancel]: ")?
    else {
        return Ok(None);
    };
    match input.trim().to_ascii_lowercase().as_str() {
        "a" | "approve" => Ok(Some(Decision::Approve)),
        "r" | "reject" => Ok(Some(Decision::Reject)),
        _ => Ok(None),
    }
}

/// Reads one line from stdin after printing `prompt` on stderr.
/// `None` on end of input.
pub(crate) fn prompt_line(prompt: &str) -> Result<Option<String>> {
    let mut stderr = io::stderr().lock();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut input = String::new();
    let mut stdin = io::stdin().lock();
    let n = stdin.read_line(&mut input)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim_end_matches(['\r', '\n']).to_string()))
}

pub(crate) fn parse_selection(input: &str, max: usize) -> Result<Selection> {
    if max == 0 {
        return Ok(Selection::None);
    }

    let s = input.trim().to_ascii_lowercase();
    match s.as_str() {
        "all" | "*" => return Ok(Selection::All),
        "none" | "no" | "n" | "q" | "quit" => return Ok(Selection::None),
        _ => {}
    }

    let mut selected = vec![false; max];
    for token in s.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once('-') {
            let start = start
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid range start: {token}"))?;
            let end = end
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid range end: {token}"))?;
            if start == 0 || end == 0 {
                return Err(anyhow!("selection is 1-based: {token}"));
            }
            if start > end {
                return Err(anyhow!("invalid range (start > end): {token}"));
            }
            if end > max {
                return Err(anyhow!("selection out of range (max {max}): {token}"));
            }
            for i in start..=end {
                selected[i - 1] = true;
            }
        } else {
            let idx = token
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid selection: {token}"))?;
            if idx == 0 {
                return Err(anyhow!("selection is 1-based: {token}"));
            }
            if idx > max {
                return Err(anyhow!("selection out of range (max {max}): {token}"));
            }
            selected[idx - 1] = true;
        }
    }

    let indices: Vec<usize> = selected
        .into_iter()
        .enumerate()
        .filter_map(|(idx, on)| on.then_some(idx))
        .collect();

    if indices.is_empty() {
        return Err(anyhow!("nothing selected (use 'all' or 'none')"));
    }

    Ok(Selection::Indices(indices))
}
