#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Token<'a> {
    /// An ordinary word: command name, argument, or redirection target.
    Word(&'a str),
    /// `>`
    RedirOut,
    /// `|`
    Pipe,
    /// `|N`: stdout routed to the command line N non-empty prompts later.
    PipeNum(u32),
    /// `!N`: like `|N`, with stderr merged into the same pipe.
    PipeNumErr(u32),
}
