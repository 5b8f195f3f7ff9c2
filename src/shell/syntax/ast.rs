use std::path::PathBuf;

/// One command of a pipeline: the words to exec, plus an optional `> path`
/// redirection. A present redirection always wins over pipe output.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Segment {
    pub argv: Vec<String>,
    pub redirect: Option<PathBuf>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PipeOp {
    /// `|`: feed the next segment on this line.
    Pipe,
    /// `|N` / `!N`: feed the command line `offset` non-empty prompts later.
    Numbered { offset: u32, merge_stderr: bool },
}

/// A parsed command line. `ops[i]` follows `segments[i]`; the final segment
/// has no operator unless the line ended on one. Tokens after the first
/// numbered-pipe operator are carried verbatim in `pending_tail` and
/// re-parsed as the next prompt's input.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Line {
    pub segments: Vec<Segment>,
    pub ops: Vec<PipeOp>,
    pub pending_tail: Option<String>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
