use std::mem;
use std::path::PathBuf;

use super::ast::{Line, PipeOp, Segment};
use super::lexer;
use super::tokens::Token;

enum RedirectTarget {
    /// `>` seen, target not yet supplied.
    Pending,
    Path(PathBuf),
}

#[derive(Default)]
struct SegmentBuilder {
    argv: Vec<String>,
    redirect: Option<RedirectTarget>,
}

impl SegmentBuilder {
    /// Feed one non-operator token. The token right after `>` becomes the
    /// redirection target whatever it looks like; anything after the target
    /// up to the next pipe operator is dropped.
    fn push(&mut self, word: &str, token: &Token<'_>) {
        match (&self.redirect, token) {
            (None, Token::RedirOut) => self.redirect = Some(RedirectTarget::Pending),
            (None, _) => self.argv.push(word.to_owned()),
            (Some(RedirectTarget::Pending), _) => {
                self.redirect = Some(RedirectTarget::Path(PathBuf::from(word)));
            }
            (Some(RedirectTarget::Path(_)), _) => {}
        }
    }

    fn build(self) -> Segment {
        Segment {
            argv: self.argv,
            // A dangling `>` keeps an empty target; the child then fails to
            // open it and reports the error.
            redirect: self.redirect.map(|target| match target {
                RedirectTarget::Pending => PathBuf::new(),
                RedirectTarget::Path(path) => path,
            }),
        }
    }
}

/// Parse one raw command line into segments and pipe operators. The first
/// numbered-pipe operator terminates the line; whatever follows it is kept
/// as the pending tail for the next prompt.
pub fn parse(line: &str) -> Line {
    let words = lexer::lex(line);
    let mut segments = Vec::new();
    let mut ops = Vec::new();
    let mut current = SegmentBuilder::default();
    let mut ended_on_op = false;

    for (i, (word, token)) in words.iter().enumerate() {
        let op = match token {
            Token::Pipe => Some(PipeOp::Pipe),
            Token::PipeNum(n) => Some(PipeOp::Numbered {
                offset: *n,
                merge_stderr: false,
            }),
            Token::PipeNumErr(n) => Some(PipeOp::Numbered {
                offset: *n,
                merge_stderr: true,
            }),
            Token::Word(_) | Token::RedirOut => None,
        };
        match op {
            Some(op @ PipeOp::Numbered { .. }) => {
                segments.push(mem::take(&mut current).build());
                ops.push(op);
                let rest: Vec<&str> = words[i + 1..].iter().map(|(raw, _)| *raw).collect();
                let pending_tail = if rest.is_empty() {
                    None
                } else {
                    Some(rest.join(" "))
                };
                return Line {
                    segments,
                    ops,
                    pending_tail,
                };
            }
            Some(op) => {
                segments.push(mem::take(&mut current).build());
                ops.push(op);
                ended_on_op = true;
            }
            None => {
                current.push(word, token);
                ended_on_op = false;
            }
        }
    }

    if !words.is_empty() && !ended_on_op {
        segments.push(current.build());
    }
    Line {
        segments,
        ops,
        pending_tail: None,
    }
}
