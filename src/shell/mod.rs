mod history;
mod jobs;
mod state;
mod syntax;

use std::env;
use std::io::{self, Write};

use log::{debug, warn};

use self::state::ShellState;
use self::syntax::ast::Line;
use self::syntax::parser;

enum BuiltinOutcome {
    Exit,
    Handled,
}

pub struct Shell {
    state: ShellState,
}

impl Shell {
    pub fn new() -> Self {
        if let Err(errno) = jobs::install_reaper() {
            warn!("could not install SIGCHLD reaper: {errno}");
        }
        Shell {
            state: ShellState::new(),
        }
    }

    /// The prompt loop. A tail deferred by a numbered pipe on the previous
    /// line preempts the terminal read and runs as the next prompt; EOF on
    /// stdin shuts the shell down like `exit`.
    pub fn run_interactive(&mut self) {
        loop {
            let line = match self.state.take_pending_tail() {
                Some(tail) => tail,
                None => {
                    print!("% ");
                    let _ = io::stdout().flush();
                    let mut buf = String::new();
                    match io::stdin().read_line(&mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            self.state.history.add_command(&buf);
                            buf
                        }
                        Err(err) => {
                            warn!("reading stdin: {err}");
                            break;
                        }
                    }
                }
            };

            let parsed = parser::parse(&line);
            if parsed.is_empty() {
                continue;
            }
            let prompt = self.state.next_prompt();
            debug!("prompt {prompt}: {parsed:?}");
            if let Some(tail) = parsed.pending_tail.clone() {
                self.state.set_pending_tail(tail);
            }

            match self.run_builtin(&parsed) {
                Some(BuiltinOutcome::Exit) => break,
                Some(BuiltinOutcome::Handled) => {
                    // A builtin prompt still consumes its slot: anything
                    // queued for it is closed unread.
                    drop(self.state.registry.drain(prompt));
                }
                None => {
                    if let Err(err) = jobs::run(&parsed, prompt, &mut self.state.registry) {
                        eprintln!("{err}");
                    }
                }
            }
        }
    }

    /// Builtins are recognized by the first word of the line's first
    /// segment. `exit` closes the registry (by dropping it) and terminates.
    fn run_builtin(&self, line: &Line) -> Option<BuiltinOutcome> {
        let argv = &line.segments.first()?.argv;
        match argv.first().map(String::as_str)? {
            "exit" => Some(BuiltinOutcome::Exit),
            "setenv" => {
                if argv.len() < 3 {
                    eprintln!("setenv: not enough arguments");
                } else {
                    env::set_var(&argv[1], &argv[2]);
                }
                Some(BuiltinOutcome::Handled)
            }
            "printenv" => {
                match argv.get(1) {
                    None => eprintln!("printenv: not enough arguments"),
                    Some(key) => {
                        if let Some(value) = env::var_os(key) {
                            println!("{}", value.to_string_lossy());
                        }
                    }
                }
                Some(BuiltinOutcome::Handled)
            }
            _ => None,
        }
    }
}
