use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{error::ErrorKind, Parser};
use env_logger::Env;
use log::{info, LevelFilter};
use tokio::io::BufReader;

use crate::api::{
    HttpOptions, HttpTokenApi, MailRequest, QueryOverrides, SortOrder, TokenId,
    DEFAULT_PAGE_LIMIT,
};
use crate::cli::args::{CliArgs, Command, ListArgs};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::output::{OutputFormat, TerminalView};
use crate::session::{ActionError, SessionOptions, TokenListController};
use crate::shell::Shell;
use crate::utils;
use crate::view::View;

pub fn parse_log_level(raw: &str) -> Result<LevelFilter, String> {
    match raw.trim().to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => Err(format!(
            "invalid log level '{other}', expected off, error, warn, info, debug or trace"
        )),
    }
}

fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(level.to_string()))
        .format_timestamp(None)
        .try_init();
}

#[derive(Clone, Debug)]
struct RunConfig {
    http: HttpOptions,
    session: SessionOptions,
    output_format: OutputFormat,
    no_color: bool,
    log_level: LevelFilter,
    command: Command,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let base_url = args
        .base_url
        .or(cfg.base_url)
        .unwrap_or_else(|| crate::api::http::DEFAULT_BASE_URL.to_string());
    let timeout_seconds = args.timeout.or(cfg.timeout).unwrap_or(30);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let header = args.header.or(cfg.header).filter(|h| !h.trim().is_empty());

    let limit = match args.page_limit.or(cfg.page_limit) {
        Some(raw) => NonZeroU32::new(raw)
            .ok_or_else(|| "invalid page_limit, expected positive integer".to_string())?,
        None => DEFAULT_PAGE_LIMIT,
    };
    let strict_amount = args
        .strict_amount
        .or(cfg.strict_amount)
        .unwrap_or(false);

    let output_format_raw = args
        .output_format
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw)
        .ok_or_else(|| format!("invalid output_format '{output_format_raw}'"))?;

    let log_level = match args.log_level.or(cfg.log_level) {
        Some(raw) => parse_log_level(&raw)?,
        None => LevelFilter::Warn,
    };

    Ok(RunConfig {
        http: HttpOptions {
            base_url,
            timeout_seconds,
            proxy,
            header,
        },
        session: SessionOptions {
            limit,
            strict_amount,
        },
        output_format,
        no_color,
        log_level,
        command: args.command.unwrap_or(Command::Shell),
    })
}

fn list_overrides(list: &ListArgs) -> Result<QueryOverrides, String> {
    let mut overrides = QueryOverrides::default();
    if let Some(raw) = list.page.as_deref() {
        overrides.page = Some(utils::parse_page(raw)?);
    }
    if let Some(raw) = list.sort.as_deref() {
        overrides.sort_order =
            Some(SortOrder::parse(raw).ok_or_else(|| format!("invalid sort order '{raw}'"))?);
    }
    if let Some(raw) = list.min.as_deref() {
        overrides.min_amount = Some(utils::parse_bound(raw)?);
    }
    if let Some(raw) = list.max.as_deref() {
        overrides.max_amount = Some(utils::parse_bound(raw)?);
    }
    Ok(overrides)
}

async fn dispatch(
    controller: Arc<TokenListController>,
    view: Arc<dyn View>,
    command: Command,
    interactive: bool,
) -> Result<Result<(), ActionError>, String> {
    let c = &controller;
    let outcome = match command {
        Command::Login { username, password } => c.login(&username, &password).await,
        Command::List(list) => c.fetch_tokens(&list_overrides(&list)?).await.map(drop),
        Command::Create { name, amount } => c.create_token(&name, &amount).await,
        Command::Update { id, name, amount } => {
            c.update_token(TokenId::from_input(&id), &name, &amount)
                .await
        }
        Command::Delete { id } => c.delete_token(&TokenId::from_input(&id)).await,
        Command::Search { id } => c.search_token(&TokenId::from_input(&id)).await.map(drop),
        Command::Mail { to, subject, body } => {
            c.send_mail(MailRequest { to, subject, body }).await
        }
        Command::Say { message } => c.send_message(&message.join(" ")).await.map(drop),
        Command::Shell => {
            let mut shell = Shell::new(controller.clone(), view);
            if interactive {
                shell = shell.with_prompt("tokendesk> ");
            }
            shell.run(BufReader::new(tokio::io::stdin())).await?;
            Ok(())
        }
        Command::InitConfig => Ok(()),
    };
    Ok(outcome)
}

async fn run_async(run: RunConfig) -> Result<ExitCode, String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    let api = HttpTokenApi::new(run.http.clone()).map_err(|e| e.to_string())?;
    info!("token service at {}", api.base_url());

    let interactive = run.output_format == OutputFormat::Text;
    let view: Arc<dyn View> =
        Arc::new(TerminalView::stdout(run.output_format).with_spinner(interactive));
    let controller = Arc::new(TokenListController::new(
        Arc::new(api),
        view.clone(),
        run.session,
    ));

    match dispatch(controller, view, run.command, interactive).await? {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // already shown by the view
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn init_config(path: Option<std::path::PathBuf>) -> Result<ExitCode, String> {
    let path = path
        .or_else(config::default_config_path)
        .ok_or_else(|| "could not determine home directory for config file".to_string())?;
    if config::ensure_default_config_file(&path)? {
        println!(":: Wrote default config to {}", path.display());
    } else {
        println!(":: Config already exists at {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Entry point for the binary. `Err` is a setup problem the caller should
/// print; a failed action has already been reported and yields a failure code.
pub fn run_cli() -> Result<ExitCode, String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(ExitCode::SUCCESS);
            }
            _ => return Err(e.to_string()),
        },
    };

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    if args.command == Some(Command::InitConfig) {
        return init_config(user_config_path);
    }

    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    }
    .apply_env();

    let run = build_run_config(args, cfg)?;
    init_logging(run.log_level);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
