use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;

use crate::codec::SerializedForm;
use crate::filter::{EventId, Partition};
use crate::servers::ServerRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn format_kv_line(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!(":: {:<10}: {}\n", label, value));
}

fn join_ids(ids: &[EventId]) -> String {
    if ids.is_empty() {
        return "-".dimmed().to_string();
    }
    ids.iter().map(EventId::as_str).join(", ")
}

pub fn render_partition_text(partition: &Partition) -> String {
    let mut out = String::new();
    format_kv_line(
        &mut out,
        "Filter in",
        &join_ids(&partition.included).green().to_string(),
    );
    format_kv_line(
        &mut out,
        "Filter out",
        &join_ids(&partition.excluded).yellow().to_string(),
    );
    out
}

pub fn render_serialized_text(form: &SerializedForm) -> String {
    let mut out = String::new();
    format_kv_line(&mut out, "filterIn", &form.filter_in);
    if let Some(filter_out) = form.filter_out.as_ref() {
        format_kv_line(&mut out, "filterOut", filter_out);
    }
    out
}

pub fn render_listening_text(ids: &[EventId]) -> String {
    let mut out = String::new();
    format_kv_line(&mut out, "Listening", &join_ids(ids).cyan().to_string());
    out
}

fn status_label(row: &ServerRow) -> String {
    match row.status.as_str() {
        "up" => "up".bold().blue().to_string(),
        "down" => "down".bold().red().to_string(),
        other => other.dimmed().to_string(),
    }
}

pub fn render_servers_text(rows: &[ServerRow]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        out.push_str(":: no servers configured\n");
        return out;
    }
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    out.push_str(&format!(
        "{:<width$}  {:<10}  {:<6}  {}\n",
        "NAME",
        "VERSION",
        "STATUS",
        "HEALTH",
        width = width
    ));
    for r in rows {
        let health = if r.has_errors {
            "errors".red().to_string()
        } else if r.has_warnings {
            "warnings".yellow().to_string()
        } else {
            "ok".green().to_string()
        };
        let version = if r.version.is_empty() { "-" } else { r.version.as_str() };
        // escape codes break `{:<6}`, so pad by hand
        let pad = " ".repeat(6usize.saturating_sub(r.status.len()));
        let status = format!("{}{pad}", status_label(r));
        out.push_str(&format!(
            "{:<width$}  {:<10}  {}  {}\n",
            r.name,
            version,
            status,
            health,
            width = width
        ));
    }
    out
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
