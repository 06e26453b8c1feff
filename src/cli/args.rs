use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokendesk",
    version,
    about = "terminal client for a paginated token service",
    long_about = "Tokendesk lists, sorts, filters and edits the tokens held by a token service.\n\nExamples:\n  tokendesk list --sort asc --min 10\n  tokendesk create gold 25\n  tokendesk -b http://tokens.internal:8080 shell\n\nTip: Run `tokendesk init-config` once and keep the base URL in ~/.tokendesk/config.yml."
)]
pub struct CliArgs {
    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.tokendesk/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "url",
        visible_alias = "base-url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Base URL of the token service (e.g. http://localhost:8080)."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Per-request timeout in seconds (0 = none)."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "hdr",
        visible_alias = "header",
        value_name = "HEADER",
        global = true,
        help_heading = "HTTP",
        help = "Add a header to all requests (format: 'Key: Value')."
    )]
    pub header: Option<String>,

    #[arg(
        short = 'l',
        long = "lim",
        visible_alias = "page-limit",
        value_name = "N",
        global = true,
        help_heading = "Listing",
        help = "Tokens per page."
    )]
    pub page_limit: Option<u32>,

    #[arg(
        long = "sa",
        visible_alias = "strict-amount",
        num_args = 0..=1,
        default_missing_value = "true",
        global = true,
        help_heading = "Listing",
        help = "Refuse amounts that are not whole integers instead of sending null."
    )]
    pub strict_amount: Option<bool>,

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
        short = 'c',
        long = "clr",
        visible_alias = "color",
        global = true,
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

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
        long = "ll",
        visible_alias = "log-level",
        value_name = "LEVEL",
        global = true,
        help_heading = "Output",
        help = "Log level (off, error, warn, info, debug, trace)."
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in with a username and password.
    Login { username: String, password: String },

    /// Show one page of tokens.
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Create a token.
    Create { name: String, amount: String },

    /// Update a token's name and amount.
    Update {
        id: String,
        name: String,
        amount: String,
    },

    /// Delete a token by id.
    #[command(visible_alias = "rm")]
    Delete { id: String },

    /// Look a single token up by id.
    Search { id: String },

    /// Send an email through the service.
    Mail {
        to: String,
        subject: String,
        body: String,
    },

    /// Post a free-form message to the service.
    Say {
        #[arg(num_args = 1.., required = true)]
        message: Vec<String>,
    },

    /// Interactive session (the default when no command is given).
    Shell,

    /// Write a commented default config file if none exists.
    InitConfig,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    #[arg(long, value_name = "N", help = "Page to show (1-based).")]
    pub page: Option<String>,

    #[arg(long, value_name = "ORDER", help = "Sort by amount (asc, desc or none).")]
    pub sort: Option<String>,

    #[arg(long, value_name = "AMOUNT", allow_hyphen_values = true, help = "Lower amount bound.")]
    pub min: Option<String>,

    #[arg(long, value_name = "AMOUNT", allow_hyphen_values = true, help = "Upper amount bound.")]
    pub max: Option<String>,
}
