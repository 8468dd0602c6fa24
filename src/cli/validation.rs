use std::sync::OnceLock;

use regex::Regex;

use crate::cli::args::{CliArgs, Command};
use crate::codec::SavePolicy;
use crate::output::OutputFormat;

// Ids end up in "a b" and "[a, b]" field values, so they can't carry
// whitespace, commas or brackets.
fn event_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s,\[\]]+$").expect("valid event id pattern"))
}

pub fn validate_event_id(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("event type is empty".to_string());
    }
    if !event_id_pattern().is_match(raw) {
        return Err(format!(
            "invalid event type '{raw}', expected no whitespace, commas or brackets"
        ));
    }
    if raw == crate::codec::DEFAULT_SENTINEL {
        return Err(format!("'{raw}' is reserved"));
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.save_policy.as_deref() {
        SavePolicy::parse(raw)
            .ok_or_else(|| format!("invalid --policy '{raw}', expected sentinel or dual"))?;
    }
    if let Some(raw) = args.output_format.as_deref() {
        OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --output-format '{raw}', expected text or json"))?;
    }
    if args.poll_interval == Some(0) {
        return Err("invalid poll-interval, expected positive integer".to_string());
    }
    if args.timeout == Some(0) {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    if args.workers == Some(0) {
        return Err("invalid workers, expected positive integer".to_string());
    }
    if let Command::Transfer {
        include, exclude, ..
    } = &args.command
    {
        for id in include.iter().chain(exclude.iter()) {
            validate_event_id(id.trim()).map_err(|e| format!("invalid transfer selection: {e}"))?;
        }
        if let Some(both) = include.iter().find(|id| exclude.contains(id)) {
            return Err(format!(
                "event type '{both}' can't be moved in both directions at once"
            ));
        }
    }
    Ok(())
}
