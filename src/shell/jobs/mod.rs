use std::ffi::CString;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process;
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{dup2, execvp, fork, pipe, ForkResult, Pid};

use super::state::registry::PipeRegistry;
use super::syntax::ast::{Line, PipeOp, Segment};

#[derive(Debug)]
pub enum Error {
    Pipe(Errno),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Pipe(errno) => write!(f, "pipe creation failed: {errno}"),
        }
    }
}

impl std::error::Error for Error {}

/// Install the SIGCHLD reaper. Intermediate pipeline stages, numbered-pipe
/// producers, and merge helpers are never awaited synchronously; this keeps
/// them from lingering as zombies.
pub fn install_reaper() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(reap_children),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGCHLD, &action) }.map(|_| ())
}

extern "C" fn reap_children(_signo: libc::c_int) {
    // Async-signal-safe: nothing but the non-blocking wait loop.
    loop {
        let pid = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };
        if pid <= 0 {
            break;
        }
    }
}

/// Execute one prompt's pipeline. Inbound descriptors registered for this
/// prompt are drained first (merged if there are several), each segment is
/// forked with its descriptors wired, numbered-pipe read ends are queued for
/// their target prompts, and only the terminal segment is awaited.
pub fn run(line: &Line, prompt: u32, registry: &mut PipeRegistry) -> Result<(), Error> {
    let mut inbound = assemble_inbound(registry.drain(prompt))?;

    for (i, segment) in line.segments.iter().enumerate() {
        match line.ops.get(i).copied() {
            Some(PipeOp::Pipe) => {
                let (read_end, write_end) = pipe().map_err(Error::Pipe)?;
                let read_end = unsafe { OwnedFd::from_raw_fd(read_end) };
                let write_end = unsafe { OwnedFd::from_raw_fd(write_end) };
                match fork_with_retry() {
                    ForkResult::Child => {
                        drop(read_end);
                        exec_segment(segment, inbound, Some(write_end), false);
                    }
                    ForkResult::Parent { child } => {
                        trace!("prompt {prompt} stage {i}: pid {child}");
                        drop(write_end);
                        inbound = Some(read_end);
                    }
                }
            }
            Some(PipeOp::Numbered {
                offset,
                merge_stderr,
            }) => {
                let (read_end, write_end) = pipe().map_err(Error::Pipe)?;
                let read_end = unsafe { OwnedFd::from_raw_fd(read_end) };
                let write_end = unsafe { OwnedFd::from_raw_fd(write_end) };
                match fork_with_retry() {
                    ForkResult::Child => {
                        drop(read_end);
                        exec_segment(segment, inbound, Some(write_end), merge_stderr);
                    }
                    ForkResult::Parent { child } => {
                        let target = prompt.saturating_add(offset);
                        debug!("prompt {prompt}: pid {child} feeds prompt {target}");
                        drop(write_end);
                        registry.insert(target, read_end);
                        inbound = None;
                    }
                }
            }
            None => match fork_with_retry() {
                ForkResult::Child => {
                    exec_segment(segment, inbound, None, false);
                }
                ForkResult::Parent { child } => {
                    trace!("prompt {prompt} terminal: pid {child}");
                    drop(inbound.take());
                    await_child(child);
                }
            },
        }
    }

    Ok(())
}

/// Turn the drained registry batch into at most one stdin descriptor. Two or
/// more sources are funneled through a merge pipe: one copy helper per
/// source, all awaited before the consumer runs, so the merged input is
/// materialized up front. Interleaving across sources is arrival-order only.
fn assemble_inbound(sources: Vec<OwnedFd>) -> Result<Option<OwnedFd>, Error> {
    match sources.len() {
        0 => Ok(None),
        1 => Ok(sources.into_iter().next()),
        _ => merge_sources(sources).map(Some),
    }
}

fn merge_sources(sources: Vec<OwnedFd>) -> Result<OwnedFd, Error> {
    let (read_end, write_end) = pipe().map_err(Error::Pipe)?;
    let read_end = unsafe { OwnedFd::from_raw_fd(read_end) };
    let write_end = unsafe { OwnedFd::from_raw_fd(write_end) };
    let mut helpers = Vec::with_capacity(sources.len());

    for source in sources {
        match fork_with_retry() {
            ForkResult::Child => {
                drop(read_end);
                // The helper shares the write end with its siblings; wrap the
                // raw descriptor rather than taking it from the parent's loop.
                let mut sink = unsafe { File::from_raw_fd(write_end.as_raw_fd()) };
                let mut from = File::from(source);
                let _ = io::copy(&mut from, &mut sink);
                process::exit(0);
            }
            ForkResult::Parent { child } => {
                trace!("merge helper: pid {child}");
                drop(source);
                helpers.push(child);
            }
        }
    }

    // With the parent's write end closed, the consumer sees EOF once every
    // helper has finished copying.
    drop(write_end);
    for helper in helpers {
        await_child(helper);
    }
    Ok(read_end)
}

/// Child-side setup, then exec. Never returns: on any failure the child
/// reports to stderr and exits with status 1. Wiring order matters — the
/// pipe is bound to stdout before stderr is merged onto it, and an explicit
/// `> file` redirection rebinds stdout last, so it always wins.
fn exec_segment(
    segment: &Segment,
    stdin_fd: Option<OwnedFd>,
    stdout_fd: Option<OwnedFd>,
    merge_stderr: bool,
) -> ! {
    if let Some(fd) = stdin_fd {
        let _ = dup2(fd.as_raw_fd(), libc::STDIN_FILENO);
        drop(fd);
    }
    if let Some(fd) = stdout_fd {
        let _ = dup2(fd.as_raw_fd(), libc::STDOUT_FILENO);
        drop(fd);
    }
    if merge_stderr {
        let _ = dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO);
    }
    if let Some(path) = &segment.redirect {
        match open_redirect_target(path) {
            Ok(file) => {
                let _ = dup2(file.as_raw_fd(), libc::STDOUT_FILENO);
                drop(file);
            }
            Err(_) => {
                eprintln!("Cannot open output file: {}", path.display());
                process::exit(1);
            }
        }
    }

    let name = segment.argv.first().cloned().unwrap_or_default();
    let argv: Vec<CString> = segment
        .argv
        .iter()
        .filter_map(|arg| CString::new(arg.as_str()).ok())
        .collect();
    if let Some(program) = argv.first() {
        let _ = execvp(program, &argv);
    }
    eprintln!("Unknown command: [{name}].");
    process::exit(1);
}

fn open_redirect_target(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

/// Fork, retrying transient `EAGAIN` with a short sleep. Any other failure
/// is unrecoverable and exits the shell with status 1.
fn fork_with_retry() -> ForkResult {
    loop {
        match unsafe { fork() } {
            Ok(result) => return result,
            Err(Errno::EAGAIN) => thread::sleep(Duration::from_millis(1)),
            Err(errno) => {
                eprintln!("fork failed: {errno}");
                process::exit(1);
            }
        }
    }
}

/// Wait for one specific child. The SIGCHLD reaper may win the race and
/// collect it first, which surfaces here as ECHILD.
fn await_child(child: Pid) {
    loop {
        match waitpid(child, None) {
            Ok(_) => break,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(errno) => {
                warn!("waitpid({child}): {errno}");
                break;
            }
        }
    }
}
