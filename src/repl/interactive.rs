use std::borrow::Cow;
use std::path::PathBuf;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor, Helper};
use crate::error::{Result, SurgeonError};
use crate::remedy::StrategyId;
use super::commands::ReplCommand;
use super::session::ReplSession;

const COMMANDS: &[&str] = &[
    "load", "audit", "strategies", "propose", "confirm", "cancel", "undo",
    "history", "whitelist", "accept-schema", "export", "status", "close",
    "help", "exit", "quit",
];

const FLAGS: &[&str] = &[
    "--policy", "--output", "--strategy", "--column", "--rule", "--value",
    "--pattern",
];

struct ReplHelper {
    columns: Vec<String>,
    rules: Vec<String>,
}

impl ReplHelper {
    fn new() -> Self {
        Self {
            columns: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn refresh_candidates(&mut self, session: &ReplSession) {
        self.columns = session.column_names();
        self.rules = session
            .session()
            .map(|s| s.policy().rules.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default();
    }

    fn candidates(&self, prev_word: &str, first_word: &str, position: usize) -> Vec<String> {
        match prev_word {
            "--column" | "-c" => return self.columns.clone(),
            "--rule" | "-r" => return self.rules.clone(),
            "--strategy" | "-s" => {
                return StrategyId::ALL.iter().map(|s| s.as_str().to_string()).collect()
            }
            "--output" | "-o" => return vec!["table".into(), "json".into(), "yaml".into()],
            _ => {}
        }

        match (first_word, position) {
            ("propose", 1) | ("fix", 1) => {
                StrategyId::ALL.iter().map(|s| s.as_str().to_string()).collect()
            }
            ("whitelist", 1) => vec!["add".into(), "remove".into(), "list".into()],
            ("whitelist", 2) => self.columns.clone(),
            _ => Vec::new(),
        }
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_pos = &line[..pos];
        let words: Vec<&str> = line_to_pos.split_whitespace().collect();
        let at_boundary = line_to_pos.ends_with(' ');

        if words.is_empty() || (words.len() == 1 && !at_boundary) {
            let prefix = words.first().copied().unwrap_or("");
            let start = line_to_pos.rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0);

            let completions: Vec<Pair> = COMMANDS
                .iter()
                .filter(|cmd| cmd.starts_with(prefix))
                .map(|cmd| Pair {
                    display: cmd.to_string(),
                    replacement: cmd.to_string(),
                })
                .collect();

            return Ok((start, completions));
        }

        let last_word = words.last().copied().unwrap_or("");

        if !at_boundary && last_word.starts_with('-') {
            let start = line_to_pos.rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0);

            let completions: Vec<Pair> = FLAGS
                .iter()
                .filter(|flag| flag.starts_with(last_word))
                .map(|flag| Pair {
                    display: flag.to_string(),
                    replacement: flag.to_string(),
                })
                .collect();

            return Ok((start, completions));
        }

        let (prefix, prev_word, position) = if at_boundary {
            ("", last_word, words.len())
        } else {
            let prev = if words.len() >= 2 { words[words.len() - 2] } else { "" };
            (last_word, prev, words.len() - 1)
        };
        let start = if at_boundary {
            pos
        } else {
            line_to_pos.rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0)
        };

        let completions: Vec<Pair> = self
            .candidates(prev_word, words[0], position)
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();

        Ok((start, completions))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }

        let last_word = words.last().copied().unwrap_or("");

        if words.len() == 1 && !line.ends_with(' ') {
            for cmd in COMMANDS {
                if cmd.starts_with(last_word) && *cmd != last_word {
                    return Some(cmd[last_word.len()..].to_string());
                }
            }
        }

        None
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        false
    }
}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

pub struct InteractiveRepl {
    session: ReplSession,
    editor: Editor<ReplHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl InteractiveRepl {
    pub fn new(session: ReplSession) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(rustyline::CompletionType::List)
            .build();

        let mut editor = Editor::with_config(config)
            .map_err(|e| SurgeonError::Repl(e.to_string()))?;

        let mut helper = ReplHelper::new();
        helper.refresh_candidates(&session);
        editor.set_helper(Some(helper));

        let history_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".datasurgeon_history");

        let _ = editor.load_history(&history_path);

        Ok(Self {
            session,
            editor,
            history_path,
        })
    }

    /// Run a command before the prompt loop starts, e.g. loading the file
    /// named on the command line.
    pub fn preload(&mut self, cmd: ReplCommand) {
        self.execute(cmd);
    }

    fn execute(&mut self, cmd: ReplCommand) {
        let result = self.session.execute(cmd);

        if let Some(output) = &result.output {
            println!("{}", output);
        }
        if !result.success {
            if let Some(error) = &result.error {
                eprintln!("Error: {}", error);
            }
        }

        if let Some(helper) = self.editor.helper_mut() {
            helper.refresh_candidates(&self.session);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("datasurgeon REPL - Type 'help' for commands, 'exit' to quit");

        loop {
            let prompt = format!("{}> ", self.session.prompt_label());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    match ReplCommand::parse_interactive(line) {
                        Ok(cmd) => {
                            let is_exit = matches!(cmd, ReplCommand::Exit);
                            self.execute(cmd);
                            if is_exit {
                                break;
                            }
                        }
                        Err(e) => {
                            eprintln!("Error: {}", e);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("exit");
                    break;
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);

        Ok(())
    }
}
