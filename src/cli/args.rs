use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "eventfilter",
    version,
    about = "event filter and server status console helper",
    long_about = "eventfilter edits which event types are filtered in, and shows the connection state of the configured servers.\n\nExamples:\n  eventfilter show\n  eventfilter --form ./event-filter.yml transfer --exclude ref-updated --write\n  eventfilter save --policy dual\n  eventfilter --server-url https://ci.example.com/gerrit-trigger servers watch\n\nTip: Use --config to persist settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format (text or json)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.eventfilter/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'f',
        long = "fm",
        visible_alias = "form",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Form fields file (YAML or JSON). Defaults to the built-in event catalog."
    )]
    pub form: Option<String>,

    #[arg(
        short = 'p',
        long = "sp",
        visible_alias = "policy",
        value_name = "POLICY",
        global = true,
        help_heading = "Filter",
        help = "Save policy: sentinel (default) or dual."
    )]
    pub save_policy: Option<String>,

    #[arg(
        short = 'u',
        long = "su",
        visible_alias = "server-url",
        value_name = "URL",
        global = true,
        help_heading = "Servers",
        help = "Base URL of the server status console."
    )]
    pub server_url: Option<String>,

    #[arg(
        long = "cf",
        visible_alias = "crumb-field",
        value_name = "NAME",
        global = true,
        help_heading = "Servers",
        help = "Anti-forgery crumb field name sent with toggle requests."
    )]
    pub crumb_field: Option<String>,

    #[arg(
        long = "cv",
        visible_alias = "crumb",
        value_name = "VALUE",
        global = true,
        help_heading = "Servers",
        help = "Anti-forgery crumb value sent with toggle requests."
    )]
    pub crumb_value: Option<String>,

    #[arg(
        short = 'i',
        long = "pi",
        visible_alias = "poll-interval",
        value_name = "SECONDS",
        global = true,
        help_heading = "Servers",
        help = "Seconds between server table refreshes."
    )]
    pub poll_interval: Option<u64>,

    #[arg(
        long = "sd",
        visible_alias = "settle-delay",
        value_name = "MILLIS",
        global = true,
        help_heading = "Servers",
        help = "Milliseconds to wait after a toggle before refreshing."
    )]
    pub settle_delay: Option<u64>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "Servers",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'w',
        long = "wrk",
        visible_alias = "workers",
        value_name = "N",
        global = true,
        help_heading = "Performance",
        help = "Number of runtime worker threads."
    )]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the filter-in and filter-out lists.
    Show,

    /// Move event types between the lists, then sort both.
    Transfer {
        #[arg(
            short = 'I',
            long = "include",
            value_name = "IDS",
            value_delimiter = ',',
            help = "Event types to move from filter-out into filter-in (comma-separated)."
        )]
        include: Vec<String>,

        #[arg(
            short = 'E',
            long = "exclude",
            value_name = "IDS",
            value_delimiter = ',',
            help = "Event types to move from filter-in into filter-out (comma-separated)."
        )]
        exclude: Vec<String>,

        #[arg(long = "write", help = "Save the result back into the form file.")]
        write: bool,
    },

    /// Put the default filter back.
    Reset {
        #[arg(long = "write", help = "Save the result back into the form file.")]
        write: bool,
    },

    /// Print the values a save would write into the form.
    Save,

    /// Server status table.
    Servers {
        #[command(subcommand)]
        action: ServersCommand,
    },

    /// Write the default config file if it does not exist yet.
    InitConfig,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ServersCommand {
    /// Fetch and print the table once.
    List,
    /// Refresh the table on the poll interval until interrupted.
    Watch,
    /// Put an up server to sleep or wake a down one.
    Toggle {
        #[arg(value_name = "NAME")]
        name: String,
    },
}
