use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::json;

use crate::view::{ListDisplay, Notice, NoticeLevel, Pagination, SearchDisplay, View};

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

pub fn render_list_text(list: &ListDisplay) -> String {
    let rows = match list {
        ListDisplay::Notice(text) => return format!("{}\n", text.as_str().yellow()),
        ListDisplay::Rows(rows) => rows,
    };
    let mut out = String::new();
    if rows.is_empty() {
        return out;
    }
    let id_width = rows.iter().map(|r| r.id.len()).max().unwrap_or(0).max(2);
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    out.push_str(&format!(
        "{:<id_width$}  {:<name_width$}  {:>10}\n",
        "ID".bold(),
        "NAME".bold(),
        "AMOUNT".bold(),
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<id_width$}  {:<name_width$}  {:>10}  {}\n",
            r.id,
            r.name,
            r.amount,
            format!("[{}]", r.delete_action).as_str().dimmed(),
        ));
    }
    out
}

pub fn render_pagination_text(pagination: &Pagination) -> String {
    let label = match pagination.label() {
        Some(label) => label,
        None => return String::new(),
    };
    let control = |text: &str, enabled: bool| {
        if enabled {
            text.bold().to_string()
        } else {
            text.dimmed().strikethrough().to_string()
        }
    };
    format!(
        "{}  {}  {}\n",
        control("< prev", pagination.prev_enabled),
        label.as_str().cyan(),
        control("next >", pagination.next_enabled),
    )
}

pub fn render_notice_text(notice: &Notice) -> String {
    let text = match notice.level {
        NoticeLevel::Info => notice.text.as_str().cyan(),
        NoticeLevel::Success => notice.text.as_str().green(),
        NoticeLevel::Error => notice.text.as_str().red().bold(),
    };
    format!("{text}\n")
}

pub fn render_list_json(list: &ListDisplay) -> String {
    let value = match list {
        ListDisplay::Rows(rows) => json!({ "tokens": rows }),
        ListDisplay::Notice(text) => json!({ "tokens": null, "notice": text }),
    };
    format!("{value}\n")
}

pub fn render_pagination_json(pagination: &Pagination) -> String {
    format!("{}\n", json!({ "pagination": pagination }))
}

pub fn render_search_json(result: &SearchDisplay) -> String {
    let value = match result {
        SearchDisplay::Found(row) => json!({ "search": row }),
        SearchDisplay::NotFound => json!({ "search": null, "notice": result.text() }),
    };
    format!("{value}\n")
}

pub fn render_notice_json(notice: &Notice) -> String {
    format!("{}\n", json!({ "notice": notice }))
}

/// One bar shared by every request in flight; cleared when the last finishes.
#[derive(Default)]
struct SpinnerSlot {
    bar: Option<ProgressBar>,
    active: usize,
}

/// Writes rendered state to a terminal (or any writer) as it changes.
pub struct TerminalView {
    format: OutputFormat,
    out: Mutex<Box<dyn Write + Send>>,
    spinner_enabled: bool,
    spinner: Mutex<SpinnerSlot>,
}

impl TerminalView {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, Box::new(std::io::stdout()))
    }

    pub fn new(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            out: Mutex::new(out),
            spinner_enabled: false,
            spinner: Mutex::new(SpinnerSlot::default()),
        }
    }

    /// Shows a spinner on stderr while requests are in flight.
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.spinner_enabled = enabled && self.format == OutputFormat::Text;
        self
    }

    fn write(&self, rendered: String) {
        if rendered.is_empty() {
            return;
        }
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = out.write_all(rendered.as_bytes()).and_then(|_| out.flush()) {
            log::warn!("failed to write output: {e}");
        }
    }
}

impl View for TerminalView {
    fn render_tokens(&self, list: ListDisplay) {
        self.write(match self.format {
            OutputFormat::Text => render_list_text(&list),
            OutputFormat::Json => render_list_json(&list),
        });
    }

    fn render_pagination(&self, pagination: Pagination) {
        self.write(match self.format {
            OutputFormat::Text => render_pagination_text(&pagination),
            OutputFormat::Json => render_pagination_json(&pagination),
        });
    }

    fn render_search(&self, result: SearchDisplay) {
        self.write(match self.format {
            OutputFormat::Text => match &result {
                SearchDisplay::Found(_) => format!("{}\n", result.text().as_str().bold()),
                SearchDisplay::NotFound => format!("{}\n", result.text().as_str().yellow()),
            },
            OutputFormat::Json => render_search_json(&result),
        });
    }

    fn notify(&self, notice: Notice) {
        self.write(match self.format {
            OutputFormat::Text => render_notice_text(&notice),
            OutputFormat::Json => render_notice_json(&notice),
        });
    }

    fn request_started(&self, label: &str) {
        if !self.spinner_enabled {
            return;
        }
        let mut slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        slot.active += 1;
        if let Some(pb) = &slot.bar {
            pb.set_message(format!("{label}..."));
            return;
        }
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{label}..."));
        pb.enable_steady_tick(Duration::from_millis(100));
        slot.bar = Some(pb);
    }

    fn request_finished(&self) {
        let mut slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        slot.active = slot.active.saturating_sub(1);
        if slot.active > 0 {
            return;
        }
        if let Some(pb) = slot.bar.take() {
            pb.finish_and_clear();
        }
    }
}
