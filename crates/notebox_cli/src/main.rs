//! Notebox command-line front end.
//!
//! # Responsibility
//! - Map flags and environment onto `NoteConfig`.
//! - Run one use-case through `NoteService` and close it cleanly.

mod cli;

use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use log::{error, info};
use notebox_core::{
    default_log_level, init_logging, Note, NoteConfig, NoteError, NoteResult, NoteService,
    SearchHit,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> NoteResult<()> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())?;
    }

    let config = NoteConfig::resolve(cli.data_dir.as_deref());
    let service = NoteService::open(config)?;
    let name = command_name(&cli.command);
    let outcome = dispatch(&service, cli.command, cli.json);
    if let Err(err) = &outcome {
        error!(
            "event=cli_command module=cli status=error command={} error_code={}",
            name,
            err.code()
        );
    } else {
        info!("event=cli_command module=cli status=ok command={}", name);
    }
    let closed = service.close();
    outcome.and(closed)
}

fn dispatch(service: &NoteService, command: Command, json: bool) -> NoteResult<()> {
    match command {
        Command::Add { content } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let id = service.add_note(&content)?;
            if json {
                println!("{}", serde_json::json!({ "id": id }));
            } else {
                println!("Added note {id}");
            }
        }
        Command::Search { query, limit } => {
            let hits = service.search_notes_with_limit(&query, limit)?;
            if json {
                print_json(&hits);
            } else {
                print_hits(&hits);
            }
        }
        Command::Get { id } => {
            let note = service.get_note(id)?;
            if json {
                print_json(&note);
            } else {
                println!("{}", note.content);
            }
        }
        Command::List { limit, offset } => {
            let notes = service.list_notes(limit, offset)?;
            if json {
                print_json(&notes);
            } else {
                print_notes(&notes);
            }
        }
        Command::Rebuild => {
            let notes = service.rebuild_index()?;
            if json {
                println!("{}", serde_json::json!({ "indexed_notes": notes }));
            } else {
                println!("Rebuilt index over {notes} note(s)");
            }
        }
        Command::Status => {
            let status = service.status();
            if json {
                print_json(&status);
            } else {
                println!("Data dir:      {}", status.data_dir.display());
                println!("Notes:         {}", status.note_count);
                println!("Indexed notes: {}", status.indexed_notes);
                println!("Terms:         {}", status.term_count);
                println!("Log bytes:     {}", status.log_bytes);
                println!("Recovery:      {:?}", status.recovery);
            }
        }
    }
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Add { .. } => "add",
        Command::Search { .. } => "search",
        Command::Get { .. } => "get",
        Command::List { .. } => "list",
        Command::Rebuild => "rebuild",
        Command::Status => "status",
    }
}

fn read_stdin() -> NoteResult<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(NoteError::io("stdin_read"))?;
    Ok(content)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("Error: failed to encode JSON: {err}"),
    }
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for hit in hits {
        println!("{:>6}  {:.4}  {}", hit.id, hit.score, preview(&hit.content));
    }
}

fn print_notes(notes: &[Note]) {
    for note in notes {
        println!("{:>6}  {}", note.id, preview(&note.content));
    }
}

fn preview(content: &str) -> String {
    const MAX_CHARS: usize = 72;
    let flat = content.replace(['\n', '\r'], " ");
    if flat.chars().count() > MAX_CHARS {
        let mut cut: String = flat.chars().take(MAX_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::preview;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\nb"), "a b");
        assert!(preview(&"x".repeat(100)).ends_with("..."));
    }

    #[test]
    fn parses_search_with_limit() {
        let cli = Cli::parse_from(["notebox", "--json", "search", "milk tea", "-n", "3"]);
        assert!(cli.json);
        match cli.command {
            Command::Search { query, limit } => {
                assert_eq!(query, "milk tea");
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
