use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

/// Append-only command history, one input line per record, flushed after
/// every append. Best-effort throughout: a missing `$HOME` or any I/O error
/// silently disables logging — history must never break the prompt loop.
pub struct History {
    file: Option<File>,
}

impl History {
    /// Open `$HOME/.npshell_history`, or a disabled sink if `$HOME` is unset
    /// or the file cannot be opened.
    pub fn open_default() -> History {
        match std::env::var_os("HOME") {
            Some(home) => History::new(Path::new(&home).join(".npshell_history")),
            None => {
                debug!("history: $HOME unset, logging disabled");
                History { file: None }
            }
        }
    }

    pub fn new(path: PathBuf) -> History {
        let file = OpenOptions::new().create(true).append(true).open(&path);
        if file.is_err() {
            debug!("history: cannot open {}, logging disabled", path.display());
        }
        History { file: file.ok() }
    }

    pub fn add_command(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let record = line.trim_end_matches(['\n', '\r']);
        let _ = writeln!(file, "{record}");
        let _ = file.flush();
    }
}
