//! Interactive REPL: type bot commands and see the replies locally.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Input goes through the same command handling as Slack messages.

use std::sync::Arc;

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use slackrat_core::config::load_config;
use slackrat_core::utils::get_repl_history_path;
use slackrat_search::SearchBot;

use crate::helpers;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Sender ID used for REPL input; keeps its own search history.
const REPL_USER: &str = "repl";

pub async fn run() -> Result<()> {
    let config = load_config(None);
    let client = helpers::build_client(&config)?;
    let engine = helpers::build_engine(&config, client);
    let bot = Arc::new(SearchBot::new(engine, config.search.clone()));

    helpers::print_banner();
    println!("Try \"help\" or \"search #channel keyword\"; \"exit\" to quit.");
    println!();

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_exit_command(trimmed) {
            println!("\nGoodbye! 👋");
            break;
        }
        let _ = editor.add_history_entry(&input);

        debug!(input = trimmed, "processing input");
        helpers::print_thinking();
        match bot.process_direct(REPL_USER, trimmed).await {
            Ok(replies) => {
                helpers::clear_thinking();
                if replies.is_empty() {
                    helpers::print_reply("");
                }
                for reply in &replies {
                    helpers::print_reply(reply);
                }
                println!();
            }
            Err(e) => {
                helpers::clear_thinking();
                eprintln!("\n❌ Error: {e}\n");
            }
        }
    }

    save_history(&mut editor);
    Ok(())
}

fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let path = get_repl_history_path();
    if path.exists() {
        let _ = editor.load_history(&path);
        debug!("loaded REPL history from {}", path.display());
    }
    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = get_repl_history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}
