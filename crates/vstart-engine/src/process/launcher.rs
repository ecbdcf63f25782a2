//! Double-fork launcher that detaches service processes from the session.
//!
//! The invoking process forks an intermediate child, which starts a new
//! session and forks again before exiting. The grandchild reports its pid over
//! a close-on-exec pipe, redirects its standard streams and execs the target.
//! A successful exec closes the pipe without further writes; a failed exec
//! appends the errno, so the parent can tell both outcomes apart by reading
//! the pipe to EOF. Both values travel as fixed-width hexadecimal words.

use std::ffi::{CString, c_char};
use std::fs::{File, OpenOptions};
use std::io::{self, PipeReader, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::ptr;

use camino::Utf8Path;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, setsid};
use tracing::{debug, info};

use super::LAUNCH_TARGET;
use super::errors::LaunchError;

const EXEC_FAILURE_STATUS: i32 = 127;
const DETACH_FAILURE_STATUS: i32 = 1;
const WORD_LEN: usize = 8;
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Identifier of a detached service process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunningProcess {
    pid: u32,
}

impl RunningProcess {
    /// Wraps an operating-system process identifier.
    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self { pid }
    }

    /// Process identifier of the detached daemon.
    #[must_use]
    pub const fn pid(self) -> u32 {
        self.pid
    }
}

/// Starts service commands in the background.
pub trait Launcher: Send + Sync {
    /// Detaches `argv` into a background process whose stdout and stderr are
    /// appended to `log_path`.
    ///
    /// Returns once the process is detached; the service itself keeps running.
    fn launch(&self, argv: &[String], log_path: &Utf8Path) -> Result<RunningProcess, LaunchError>;
}

/// Launcher backed by `fork(2)`, `setsid(2)` and `execvp(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl DetachedLauncher {
    /// Builds a new launcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Launcher for DetachedLauncher {
    fn launch(&self, argv: &[String], log_path: &Utf8Path) -> Result<RunningProcess, LaunchError> {
        let Some(program) = argv.first() else {
            return Err(LaunchError::EmptyCommand);
        };
        let command = ExecCommand::new(argv)?;
        let log = open_log(log_path)?;
        let null = File::open("/dev/null").map_err(|source| LaunchError::NullDevice { source })?;
        let (reader, writer) = io::pipe().map_err(|source| LaunchError::Pipe { source })?;
        let streams = Streams {
            stdin: null.as_raw_fd(),
            output: log.as_raw_fd(),
            handshake: writer.as_raw_fd(),
        };

        debug!(
            target: LAUNCH_TARGET,
            program = %program,
            log = %log_path,
            "forking launcher process"
        );
        // SAFETY: the child branch only calls async-signal-safe functions and
        // never returns into Rust code that could observe duplicated state.
        match unsafe { fork() }.map_err(|source| LaunchError::Fork { source })? {
            ForkResult::Child => detach(&command, streams),
            ForkResult::Parent { child } => {
                drop(writer);
                reap_intermediate(child)?;
                let pid = read_handshake(reader, program)?;
                info!(
                    target: LAUNCH_TARGET,
                    program = %program,
                    pid,
                    log = %log_path,
                    "service process detached"
                );
                Ok(RunningProcess::new(pid))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Streams {
    stdin: RawFd,
    output: RawFd,
    handshake: RawFd,
}

/// Argument vector converted for `execvp(3)` before forking.
struct ExecCommand {
    _args: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl ExecCommand {
    fn new(argv: &[String]) -> Result<Self, LaunchError> {
        let args = argv
            .iter()
            .map(|argument| {
                CString::new(argument.as_str()).map_err(|_| LaunchError::InvalidArgument {
                    argument: argument.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut pointers: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        pointers.push(ptr::null());
        Ok(Self {
            _args: args,
            pointers,
        })
    }

    fn program(&self) -> *const c_char {
        self.pointers.first().copied().unwrap_or(ptr::null())
    }

    fn argv(&self) -> *const *const c_char {
        self.pointers.as_ptr()
    }
}

fn open_log(path: &Utf8Path) -> Result<File, LaunchError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LaunchError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Intermediate process: leaves the session and forks the daemon.
fn detach(command: &ExecCommand, streams: Streams) -> ! {
    if setsid().is_err() {
        exit_now(DETACH_FAILURE_STATUS);
    }
    // SAFETY: see `DetachedLauncher::launch`.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => exit_now(0),
        Ok(ForkResult::Child) => exec_daemon(command, streams),
        Err(_) => exit_now(DETACH_FAILURE_STATUS),
    }
}

/// Daemon process: reports its pid, wires the standard streams and execs.
fn exec_daemon(command: &ExecCommand, streams: Streams) -> ! {
    // SAFETY: `getpid` has no preconditions.
    let pid = unsafe { libc::getpid() };
    write_raw(streams.handshake, &encode_word(pid.cast_unsigned()));

    let redirections = [
        (streams.stdin, libc::STDIN_FILENO),
        (streams.output, libc::STDOUT_FILENO),
        (streams.output, libc::STDERR_FILENO),
    ];
    for (source, target) in redirections {
        // SAFETY: both descriptors are open in this process.
        if unsafe { libc::dup2(source, target) } < 0 {
            report_errno_and_exit(streams.handshake);
        }
    }
    // SAFETY: `ExecCommand` keeps the argument strings and the
    // null-terminated pointer array alive for the duration of the call.
    unsafe { libc::execvp(command.program(), command.argv()) };
    report_errno_and_exit(streams.handshake)
}

fn report_errno_and_exit(handshake: RawFd) -> ! {
    let errno = io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::ENOEXEC);
    write_raw(handshake, &encode_word(errno.cast_unsigned()));
    exit_now(EXEC_FAILURE_STATUS)
}

/// Renders `value` as hexadecimal digits without allocating.
fn encode_word(value: u32) -> [u8; WORD_LEN] {
    let mut word = [b'0'; WORD_LEN];
    let mut remaining = value;
    for digit in word.iter_mut().rev() {
        let nibble = usize::try_from(remaining & 0xf).unwrap_or_default();
        *digit = HEX_DIGITS.get(nibble).copied().unwrap_or(b'0');
        remaining >>= 4;
    }
    word
}

fn decode_word(word: &[u8; WORD_LEN]) -> Option<u32> {
    let text = std::str::from_utf8(word).ok()?;
    u32::from_str_radix(text, 16).ok()
}

fn write_raw(fd: RawFd, bytes: &[u8]) {
    let mut written = 0;
    while let Some(rest) = bytes.get(written..).filter(|rest| !rest.is_empty()) {
        // SAFETY: `rest` is a valid buffer of `rest.len()` bytes.
        let result = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };
        match usize::try_from(result) {
            Ok(count) if count > 0 => written += count,
            _ if Errno::last() == Errno::EINTR => {}
            _ => return,
        }
    }
}

fn exit_now(status: i32) -> ! {
    // SAFETY: `_exit` skips destructors and atexit handlers inherited from
    // the parent, which must not run in a forked child.
    unsafe { libc::_exit(status) }
}

fn reap_intermediate(child: Pid) -> Result<(), LaunchError> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, 0)) => return Ok(()),
            Ok(WaitStatus::Exited(_, code)) => {
                return Err(LaunchError::Detach { status: Some(code) });
            }
            Ok(_) => return Err(LaunchError::Detach { status: None }),
            Err(Errno::EINTR) => {}
            Err(source) => return Err(LaunchError::Wait { source }),
        }
    }
}

fn read_handshake(mut reader: PipeReader, program: &str) -> Result<u32, LaunchError> {
    let mut buffer = Vec::with_capacity(2 * WORD_LEN);
    reader
        .read_to_end(&mut buffer)
        .map_err(|source| LaunchError::Handshake {
            program: program.to_owned(),
            source,
        })?;
    let Some((pid_bytes, rest)) = buffer.split_first_chunk::<WORD_LEN>() else {
        return Err(LaunchError::Handshake {
            program: program.to_owned(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon exited before reporting its pid",
            ),
        });
    };
    let malformed = || LaunchError::Handshake {
        program: program.to_owned(),
        source: io::Error::new(io::ErrorKind::InvalidData, "malformed handshake word"),
    };
    if let Some((errno_bytes, _)) = rest.split_first_chunk::<WORD_LEN>() {
        let errno = decode_word(errno_bytes).ok_or_else(malformed)?;
        return Err(LaunchError::Exec {
            program: program.to_owned(),
            source: io::Error::from_raw_os_error(errno.cast_signed()),
        });
    }
    decode_word(pid_bytes)
        .filter(|pid| *pid != 0)
        .ok_or_else(malformed)
}
