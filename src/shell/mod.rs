//! Line-oriented interactive session over a [`TokenListController`].

use std::num::NonZeroU32;
use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};

use crate::api::{MailRequest, SortOrder, TokenId};
use crate::session::TokenListController;
use crate::utils;
use crate::view::{Notice, View};

pub const HELP: &str = "commands:
  list [page]                   show a page (default: the current one)
  next | prev                   move one page
  page <n>                      jump to page n
  sort asc|desc|none            sort by amount, back to page 1
  filter <min|-> <max|->        amount range, back to page 1
  clear                         drop the amount range
  create <name> <amount>
  update <id> <name> <amount>
  delete <id>
  search <id>
  login <username> <password>
  mail <to> <subject> <body...>
  say <text...>
  help
  quit | exit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    List(Option<NonZeroU32>),
    Next,
    Prev,
    Page(NonZeroU32),
    Sort(SortOrder),
    Filter {
        min: Option<i64>,
        max: Option<i64>,
    },
    Clear,
    Create {
        name: String,
        amount: String,
    },
    Update {
        id: TokenId,
        name: String,
        amount: String,
    },
    Delete(TokenId),
    Search(TokenId),
    Login {
        username: String,
        password: String,
    },
    Mail(MailRequest),
    Say(String),
    Help,
    Quit,
}

fn usage(form: &str) -> String {
    format!("usage: {form}")
}

/// Splits the arguments of `create`/`update`: the amount is the last word and
/// the name is whatever sits between, so names may contain spaces.
fn name_and_amount(words: &[&str]) -> Option<(String, String)> {
    let (amount, name) = words.split_last()?;
    if name.is_empty() {
        return None;
    }
    Some((name.join(" "), amount.to_string()))
}

pub fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((head, rest)) = words.split_first() else {
        return Ok(ShellCommand::Empty);
    };

    match head.to_lowercase().as_str() {
        "list" | "ls" => match rest {
            [] => Ok(ShellCommand::List(None)),
            [page] => utils::parse_page(page).map(|p| ShellCommand::List(Some(p))),
            _ => Err(usage("list [page]")),
        },
        "next" | "n" => Ok(ShellCommand::Next),
        "prev" | "p" => Ok(ShellCommand::Prev),
        "page" => match rest {
            [page] => utils::parse_page(page).map(ShellCommand::Page),
            _ => Err(usage("page <n>")),
        },
        "sort" => match rest {
            [order] => SortOrder::parse(order)
                .map(ShellCommand::Sort)
                .ok_or_else(|| usage("sort asc|desc|none")),
            _ => Err(usage("sort asc|desc|none")),
        },
        "filter" => match rest {
            [min, max] => {
                let min = utils::parse_bound(min)?;
                let max = utils::parse_bound(max)?;
                Ok(ShellCommand::Filter { min, max })
            }
            _ => Err(usage("filter <min|-> <max|->")),
        },
        "clear" => Ok(ShellCommand::Clear),
        "create" | "add" => name_and_amount(rest)
            .map(|(name, amount)| ShellCommand::Create { name, amount })
            .ok_or_else(|| usage("create <name> <amount>")),
        "update" | "edit" => match rest.split_first() {
            Some((id, tail)) => name_and_amount(tail)
                .map(|(name, amount)| ShellCommand::Update {
                    id: TokenId::from_input(id),
                    name,
                    amount,
                })
                .ok_or_else(|| usage("update <id> <name> <amount>")),
            None => Err(usage("update <id> <name> <amount>")),
        },
        "delete" | "rm" => match rest {
            [id] => Ok(ShellCommand::Delete(TokenId::from_input(id))),
            _ => Err(usage("delete <id>")),
        },
        "search" | "find" => match rest {
            [id] => Ok(ShellCommand::Search(TokenId::from_input(id))),
            _ => Err(usage("search <id>")),
        },
        "login" => match rest {
            [username, password] => Ok(ShellCommand::Login {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(usage("login <username> <password>")),
        },
        "mail" => match rest {
            [to, subject, body @ ..] if !body.is_empty() => Ok(ShellCommand::Mail(MailRequest {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.join(" "),
            })),
            _ => Err(usage("mail <to> <subject> <body...>")),
        },
        "say" => {
            if rest.is_empty() {
                Err(usage("say <text...>"))
            } else {
                Ok(ShellCommand::Say(rest.join(" ")))
            }
        }
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

pub struct Shell {
    controller: Arc<TokenListController>,
    view: Arc<dyn View>,
    prompt: Option<String>,
}

impl Shell {
    pub fn new(controller: Arc<TokenListController>, view: Arc<dyn View>) -> Self {
        Self {
            controller,
            view,
            prompt: None,
        }
    }

    /// Prompt written to stdout before each line is read.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Loads the first page, then runs commands until `quit` or end of input.
    pub async fn run<R>(&self, input: R) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
    {
        let _ = self.controller.refresh().await;

        let mut lines = input.lines();
        loop {
            self.write_prompt().await;
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(format!("failed to read input: {e}")),
            };
            let command = match parse_line(&line) {
                Ok(command) => command,
                Err(message) => {
                    self.view.notify(Notice::error(message));
                    continue;
                }
            };
            if command == ShellCommand::Quit {
                break;
            }
            self.execute(command).await;
        }
        Ok(())
    }

    async fn write_prompt(&self) {
        if let Some(prompt) = &self.prompt {
            let mut stdout = tokio::io::stdout();
            let _ = stdout.write_all(prompt.as_bytes()).await;
            let _ = stdout.flush().await;
        }
    }

    /// Runs one command. Failures have already been reported to the view by
    /// the controller, so they only get logged here.
    pub async fn execute(&self, command: ShellCommand) {
        let c = &self.controller;
        let result = match command {
            ShellCommand::Empty | ShellCommand::Quit => Ok(()),
            ShellCommand::Help => {
                self.view.notify(Notice::info(HELP));
                Ok(())
            }
            ShellCommand::List(None) => c.refresh().await.map(drop),
            ShellCommand::List(Some(page)) | ShellCommand::Page(page) => {
                c.go_to_page(page).await.map(drop)
            }
            ShellCommand::Next => match c.next_page().await {
                Ok(None) => {
                    self.view.notify(Notice::info("Already on the last page."));
                    Ok(())
                }
                other => other.map(drop),
            },
            ShellCommand::Prev => match c.prev_page().await {
                Ok(None) => {
                    self.view.notify(Notice::info("Already on the first page."));
                    Ok(())
                }
                other => other.map(drop),
            },
            ShellCommand::Sort(order) => c.set_sort(order).await.map(drop),
            ShellCommand::Filter { min, max } => c.set_filter(min, max).await.map(drop),
            ShellCommand::Clear => c.clear_filter().await.map(drop),
            ShellCommand::Create { name, amount } => c.create_token(&name, &amount).await,
            ShellCommand::Update { id, name, amount } => {
                c.update_token(id, &name, &amount).await
            }
            ShellCommand::Delete(id) => c.delete_token(&id).await,
            ShellCommand::Search(id) => c.search_token(&id).await.map(drop),
            ShellCommand::Login { username, password } => c.login(&username, &password).await,
            ShellCommand::Mail(mail) => c.send_mail(mail).await,
            ShellCommand::Say(text) => c.send_message(&text).await.map(drop),
        };
        if let Err(e) = result {
            debug!("shell command failed: {e}");
        }
    }
}
