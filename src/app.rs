use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::args::{CliArgs, Command, ServersCommand};
use crate::cli::validation;
use crate::codec::{self, SavePolicy, SerializedForm};
use crate::config::{self, ConfigFile, DEFAULT_CRUMB_FIELD};
use crate::events::{EventCatalog, EventFilterConfig};
use crate::filter::{EventId, FilterEngine, Partition, Selection, Side};
use crate::form::{FilterForm, FormFields};
use crate::output::{self, OutputFormat};
use crate::servers::{
    self, ClientOptions, Crumb, ServerError, ServerStatusDocument, StatusClient,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SETTLE_DELAY_MS,
};

// Walks argv down the subcommand tree so `eventfilter servers --help`
// documents `servers` and not the top level.
fn help_target(argv: &[String]) -> (clap::Command, String) {
    let mut cmd = CliArgs::command();
    cmd.build();
    let mut path = cmd.get_name().to_string();
    for word in argv.iter().skip(1) {
        if word.starts_with('-') {
            continue;
        }
        // option values are skipped the same way
        let next = match cmd.find_subcommand(word) {
            Some(sub) => sub.clone(),
            None => continue,
        };
        path.push(' ');
        path.push_str(next.get_name());
        cmd = next;
    }
    (cmd, path)
}

fn render_custom_help(cmd: &clap::Command, path: &str) -> String {
    let mut out = String::new();

    if let Some(version) = cmd.get_version() {
        out.push_str(path);
        out.push(' ');
        out.push_str(version);
        out.push('\n');
    } else {
        out.push_str(path);
        out.push('\n');
    }

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(path);
    out.push_str(" [OPTIONS]");
    if cmd.has_subcommands() {
        out.push_str(" <COMMAND>");
    }
    for arg in cmd.get_positionals() {
        let name = arg
            .get_value_names()
            .and_then(|names| names.first())
            .map(|name| name.as_str())
            .unwrap_or_else(|| arg.get_id().as_str());
        out.push_str(&format!(" <{name}>"));
    }
    out.push_str("\n\n");

    let subcommands: Vec<&clap::Command> = cmd
        .get_subcommands()
        .filter(|sub| !sub.is_hide_set() && sub.get_name() != "help")
        .collect();
    if !subcommands.is_empty() {
        out.push_str("Commands:\n");
        for sub in subcommands {
            out.push_str(&format!("  {:<12}", sub.get_name()));
            if let Some(about) = sub.get_about() {
                out.push_str(&about.to_string());
            }
            out.push('\n');
        }
        out.push('\n');
    }

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() || arg.is_positional() {
            continue;
        }

        let heading = arg.get_help_heading().unwrap_or("Options").to_string();

        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };

        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();

            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }

            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }

            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");

            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }

            out.push('\n');
        }
    }

    out
}

#[derive(Clone, Debug)]
struct RunConfig {
    command: Command,
    verbose: u8,
    no_color: bool,
    output_format: OutputFormat,
    form_path: Option<PathBuf>,
    save_policy: SavePolicy,
    server_url: Option<String>,
    crumb: Option<Crumb>,
    poll_interval: Duration,
    settle_delay: Duration,
    timeout: Duration,
    workers: usize,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let output_format_raw = args
        .output_format
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw).ok_or_else(|| {
        format!("invalid output_format '{output_format_raw}', expected text or json")
    })?;

    let save_policy = match args.save_policy.or(cfg.save_policy) {
        Some(raw) => SavePolicy::parse(&raw)
            .ok_or_else(|| format!("invalid save_policy '{raw}', expected sentinel or dual"))?,
        None => SavePolicy::default(),
    };

    let form_path = args.form.or(cfg.form).map(|p| config::expand_tilde(&p));

    let server_url = args
        .server_url
        .or(cfg.server_url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(url) = server_url.as_deref() {
        reqwest::Url::parse(url).map_err(|e| format!("invalid server URL '{url}': {e}"))?;
    }

    let crumb = args
        .crumb_value
        .or(cfg.crumb_value)
        .filter(|v| !v.is_empty())
        .map(|value| Crumb {
            field_name: args
                .crumb_field
                .or(cfg.crumb_field)
                .unwrap_or_else(|| DEFAULT_CRUMB_FIELD.to_string()),
            value,
        });

    let poll_interval = args
        .poll_interval
        .or(cfg.poll_interval)
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    if poll_interval == 0 {
        return Err("invalid poll_interval, expected positive integer".to_string());
    }
    let settle_delay = args
        .settle_delay
        .or(cfg.settle_delay)
        .unwrap_or(DEFAULT_SETTLE_DELAY_MS);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    let workers = args.workers.or(cfg.workers).unwrap_or(2);
    if workers == 0 {
        return Err("invalid workers, expected positive integer".to_string());
    }

    Ok(RunConfig {
        command: args.command,
        verbose: args.verbose,
        no_color,
        output_format,
        form_path,
        save_policy,
        server_url,
        crumb,
        poll_interval: Duration::from_secs(poll_interval),
        settle_delay: Duration::from_millis(settle_delay),
        timeout: Duration::from_secs(timeout),
        workers,
    })
}

fn load_fields(run: &RunConfig) -> Result<FormFields, String> {
    match run.form_path.as_ref() {
        Some(path) => FormFields::load(path).map_err(|e| e.to_string()),
        None => {
            debug!("no form file, using the built-in event catalog");
            Ok(EventFilterConfig::default().page_fields(&EventCatalog::builtin()))
        }
    }
}

fn write_back(run: &RunConfig, form: &FilterForm, fields: &mut FormFields) -> Result<(), String> {
    let path = run
        .form_path
        .as_ref()
        .ok_or_else(|| "--write needs a form file (--form)".to_string())?;
    let saved = form
        .save(fields, run.save_policy)
        .map_err(|e| e.to_string())?;
    fields.store(path).map_err(|e| e.to_string())?;
    info!(
        path = %path.display(),
        filter_in = %saved.filter_in,
        "event filter saved"
    );
    Ok(())
}

/// `--include` picks from the filter-out list, `--exclude` from the
/// filter-in list. Ids on the wrong side are reported and left alone.
fn build_selection(engine: &FilterEngine, include: &[String], exclude: &[String]) -> Selection {
    let mut selection = Selection::new();
    let wanted = include
        .iter()
        .map(|raw| (Side::Excluded, raw))
        .chain(exclude.iter().map(|raw| (Side::Included, raw)));
    for (side, raw) in wanted {
        let id = EventId::new(raw.trim());
        match engine.side_of(&id) {
            Some(found) if found == side => {
                selection.select(side, id);
            }
            Some(_) => warn!("{id} is already on the requested side, ignoring"),
            None => warn!("{id} is not a known event type, ignoring"),
        }
    }
    selection
}

fn render_partition(run: &RunConfig, partition: &Partition) -> String {
    match run.output_format {
        OutputFormat::Text => output::render_partition_text(partition),
        OutputFormat::Json => format!("{}\n", output::render_json(partition)),
    }
}

#[derive(Serialize)]
struct SaveReport<'a> {
    #[serde(flatten)]
    form: &'a SerializedForm,
    listening: Vec<EventId>,
}

// What the listener ends up reacting to once the serialized value is
// submitted, using the form's own universe as the catalog.
fn listening_after_save(
    form: &FilterForm,
    saved: &SerializedForm,
    policy: SavePolicy,
) -> Vec<EventId> {
    let engine = form.engine();
    let types: Vec<(&str, bool)> = engine
        .universe()
        .iter()
        .map(|id| (id.as_str(), form.default_included().contains(id)))
        .collect();
    let mut catalog = EventCatalog::from_types(&types);
    let config = match policy {
        SavePolicy::Sentinel => EventFilterConfig::from_form_value(Some(&saved.filter_in)),
        SavePolicy::Dual => EventFilterConfig::new(Some(codec::deserialize(&saved.filter_in))),
    };
    config.update_event_filter(&mut catalog);
    catalog.interesting()
}

fn run_filter_command(run: &RunConfig) -> Result<String, String> {
    let mut fields = load_fields(run)?;
    let mut form = FilterForm::bind(&fields).map_err(|e| e.to_string())?;

    match &run.command {
        Command::Show => Ok(render_partition(run, &form.engine().snapshot())),
        Command::Transfer {
            include,
            exclude,
            write,
        } => {
            let selection = build_selection(form.engine(), include, exclude);
            if selection.is_empty() {
                info!("nothing selected, lists left as they are");
            }
            form.engine_mut().transfer(selection);
            if *write {
                write_back(run, &form, &mut fields)?;
            }
            Ok(render_partition(run, &form.engine().snapshot()))
        }
        Command::Reset { write } => {
            form.reset();
            if *write {
                write_back(run, &form, &mut fields)?;
            }
            Ok(render_partition(run, &form.engine().snapshot()))
        }
        Command::Save => {
            let saved = form.serialize(run.save_policy);
            let listening = listening_after_save(&form, &saved, run.save_policy);
            Ok(match run.output_format {
                OutputFormat::Text => format!(
                    "{}{}",
                    output::render_serialized_text(&saved),
                    output::render_listening_text(&listening)
                ),
                OutputFormat::Json => format!(
                    "{}\n",
                    output::render_json(&SaveReport {
                        form: &saved,
                        listening,
                    })
                ),
            })
        }
        Command::Servers { .. } | Command::InitConfig => {
            Err("not a filter command".to_string())
        }
    }
}

fn render_servers(run: &RunConfig, doc: &ServerStatusDocument) -> String {
    let rows = servers::rows(doc);
    match run.output_format {
        OutputFormat::Text => output::render_servers_text(&rows),
        OutputFormat::Json => format!("{}\n", output::render_json(&rows)),
    }
}

async fn run_servers(run: &RunConfig, action: &ServersCommand) -> Result<(), String> {
    let base_url = run
        .server_url
        .clone()
        .ok_or_else(|| "servers commands need --server-url".to_string())?;
    let client = StatusClient::new(ClientOptions {
        base_url,
        crumb: run.crumb.clone(),
        timeout: run.timeout,
        settle_delay: run.settle_delay,
    })
    .map_err(|e| e.to_string())?;

    match action {
        ServersCommand::List => {
            let doc = client.fetch().await.map_err(|e| e.to_string())?;
            print!("{}", render_servers(run, &doc));
        }
        ServersCommand::Watch => {
            info!(
                url = %client.status_url(),
                every = run.poll_interval.as_secs(),
                "watching server status"
            );
            tokio::select! {
                delivered = servers::poll(|| client.fetch(), run.poll_interval, |doc| {
                    print!("{}", render_servers(run, doc));
                    println!();
                    ControlFlow::Continue(())
                }) => {
                    debug!(delivered, "server status polling ended");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("stopped watching server status");
                }
            }
        }
        ServersCommand::Toggle { name } => {
            let doc = client.fetch().await.map_err(|e| e.to_string())?;
            let server = doc
                .find(name)
                .ok_or_else(|| ServerError::UnknownServer { name: name.clone() }.to_string())?;
            let action = client.toggle(server).await.map_err(|e| e.to_string())?;
            info!(server = %name, action = action.path(), "connection toggled");
            let doc = client.fetch().await.map_err(|e| e.to_string())?;
            print!("{}", render_servers(run, &doc));
        }
    }
    Ok(())
}

fn init_config(args: &CliArgs) -> Result<(), String> {
    let path = match args.config.as_deref() {
        Some(p) => config::expand_tilde(p),
        None => config::default_config_path()
            .ok_or_else(|| "can't locate the home directory, pass --config".to_string())?,
    };
    if config::ensure_default_config_file(&path)? {
        println!(":: {:<10}: {} (written)", "Config", path.display());
    } else {
        println!(":: {:<10}: {} (exists)", "Config", path.display());
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                let argv: Vec<String> = std::env::args().collect();
                let (cmd, path) = help_target(&argv);
                print!("{}", render_custom_help(&cmd, &path));
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    if args.command == Command::InitConfig {
        crate::logging::init(args.verbose, args.no_color);
        return init_config(&args);
    }

    let cfg = match args.config.as_deref() {
        Some(p) => config::load_config(&config::expand_tilde(p), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    crate::logging::init(run.verbose, run.no_color);
    if run.no_color {
        colored::control::set_override(false);
    }

    match &run.command {
        Command::Servers { action } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .worker_threads(run.workers)
                .build()
                .map_err(|e| format!("failed to build runtime: {e}"))?;
            rt.block_on(run_servers(&run, action))
        }
        _ => {
            print!("{}", run_filter_command(&run)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    use crate::form::{ALL_EVENTS_FIELD, DEFAULT_FILTER_FIELD, FILTER_IN_FIELD};

    fn temp_form(name: &str, fields: &FormFields) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "eventfilter-{}-{name}.yml",
            std::process::id()
        ));
        fields.store(&path).unwrap();
        path
    }

    #[test]
    fn cli_values_override_config() {
        let args = CliArgs::parse_from(["eventfilter", "--policy", "dual", "-i", "5", "show"]);
        let cfg = ConfigFile {
            save_policy: Some("sentinel".to_string()),
            poll_interval: Some(60),
            workers: Some(4),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg).unwrap();
        assert_eq!(run.save_policy, SavePolicy::Dual);
        assert_eq!(run.poll_interval, Duration::from_secs(5));
        assert_eq!(run.workers, 4);
    }

    #[test]
    fn defaults_without_config() {
        let args = CliArgs::parse_from(["eventfilter", "show"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        assert_eq!(run.save_policy, SavePolicy::Sentinel);
        assert_eq!(run.output_format, OutputFormat::Text);
        assert_eq!(run.poll_interval, Duration::from_secs(30));
        assert_eq!(run.settle_delay, Duration::from_millis(1000));
        assert!(run.crumb.is_none());
        assert!(run.form_path.is_none());
    }

    #[test]
    fn crumb_field_defaults_when_only_value_given() {
        let args = CliArgs::parse_from(["eventfilter", "--crumb", "abc", "servers", "list"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        assert_eq!(
            run.crumb,
            Some(Crumb {
                field_name: DEFAULT_CRUMB_FIELD.to_string(),
                value: "abc".to_string(),
            })
        );
    }

    #[test]
    fn bad_config_values_are_rejected() {
        let args = CliArgs::parse_from(["eventfilter", "show"]);
        let cfg = ConfigFile {
            save_policy: Some("hybrid".to_string()),
            ..ConfigFile::default()
        };
        assert!(build_run_config(args, cfg).is_err());

        let args = CliArgs::parse_from(["eventfilter", "-u", "not a url", "servers", "list"]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
    }

    #[test]
    fn selection_only_takes_ids_from_the_expected_side() {
        let universe: Vec<EventId> = ["a", "b", "c"].into_iter().map(EventId::from).collect();
        let engine = FilterEngine::init(universe, &[EventId::new("a")], &[]);
        let selection = build_selection(
            &engine,
            &["b".to_string(), "a".to_string()],
            &["a".to_string(), "zz".to_string()],
        );
        assert!(selection.from_excluded.contains(&EventId::new("b")));
        assert!(!selection.from_excluded.contains(&EventId::new("a")));
        assert!(selection.from_included.contains(&EventId::new("a")));
        assert_eq!(selection.from_included.len(), 1);
    }

    #[test]
    fn show_uses_builtin_catalog_without_form() {
        colored::control::set_override(false);
        let args = CliArgs::parse_from(["eventfilter", "show"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        let text = run_filter_command(&run).unwrap();
        assert!(text.contains("change-abandoned, change-merged"));
        assert!(text.contains(":: Filter out: -"));
    }

    #[test]
    fn transfer_with_write_updates_form_file() {
        let fields = FormFields::new()
            .with(ALL_EVENTS_FIELD, "[a, b, c, d]")
            .with(DEFAULT_FILTER_FIELD, "[a, b, c, d]")
            .with(FILTER_IN_FIELD, "null");
        let path = temp_form("transfer", &fields);

        let args = CliArgs::parse_from([
            "eventfilter",
            "-A",
            "json",
            "--form",
            path.to_str().unwrap(),
            "transfer",
            "-E",
            "d,b",
            "--write",
        ]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        let out = run_filter_command(&run).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["included"], serde_json::json!(["a", "c"]));
        assert_eq!(v["excluded"], serde_json::json!(["b", "d"]));

        let stored = FormFields::load(&path).unwrap();
        assert_eq!(stored.get(FILTER_IN_FIELD), Some("a c"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_without_form_file_fails() {
        let args = CliArgs::parse_from(["eventfilter", "reset", "--write"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        let err = run_filter_command(&run).unwrap_err();
        assert!(err.contains("--form"));
    }

    #[test]
    fn save_reports_sentinel_and_listener_types() {
        let args = CliArgs::parse_from(["eventfilter", "-A", "json", "save"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        let out = run_filter_command(&run).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["filter_in"], "null");
        assert!(v.get("filter_out").is_none());
        assert_eq!(v["listening"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn help_target_descends_into_subcommands() {
        let argv: Vec<String> = ["eventfilter", "-n", "servers", "toggle", "--help"]
            .into_iter()
            .map(String::from)
            .collect();
        let (cmd, path) = help_target(&argv);
        assert_eq!(cmd.get_name(), "toggle");
        assert_eq!(path, "eventfilter servers toggle");
        let help = render_custom_help(&cmd, &path);
        assert!(help.contains("Usage: eventfilter servers toggle [OPTIONS] <NAME>"));
    }
}
