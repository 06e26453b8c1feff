use crate::api::SortOrder;
use crate::cli::args::{CliArgs, Command, ListArgs};
use crate::output::OutputFormat;
use crate::utils;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(limit) = args.page_limit {
        if limit == 0 {
            return Err("invalid page-limit, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --output-format '{raw}', expected text or json"));
        }
    }
    if let Some(raw) = args.log_level.as_deref() {
        crate::app::parse_log_level(raw)?;
    }
    if let Some(raw) = args.header.as_deref() {
        if crate::api::http::parse_header(raw).is_none() {
            return Err(format!("invalid --header '{raw}', expected 'Key: Value'"));
        }
    }
    if let Some(Command::List(list)) = &args.command {
        validate_list(list)?;
    }
    Ok(())
}

fn validate_list(list: &ListArgs) -> Result<(), String> {
    if let Some(raw) = list.page.as_deref() {
        utils::parse_page(raw).map_err(|e| format!("invalid --page: {e}"))?;
    }
    if let Some(raw) = list.sort.as_deref() {
        if SortOrder::parse(raw).is_none() {
            return Err(format!("invalid --sort '{raw}', expected asc, desc or none"));
        }
    }
    let min = match list.min.as_deref() {
        Some(raw) => utils::parse_bound(raw).map_err(|e| format!("invalid --min: {e}"))?,
        None => None,
    };
    let max = match list.max.as_deref() {
        Some(raw) => utils::parse_bound(raw).map_err(|e| format!("invalid --max: {e}"))?,
        None => None,
    };
    utils::check_bounds(min, max)
}
