//! Process-level standard stream swapping
//!
//! Replaces the stdout/stderr file descriptors of the running process with a
//! file for as long as a [`StdioGuard`] is alive. Everything written through
//! the descriptors ends up in the file, including output of `println!`,
//! `eprintln!` and child processes that inherit them.

use std::fs::File;
use std::io::{self, Write};

use parking_lot::{const_reentrant_mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, warn};

/// Serializes stream swaps across threads; re-entrant so nested redirections
/// on the same thread do not deadlock.
static STDIO_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

/// Which standard streams to redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streams {
    /// Redirect standard output
    pub stdout: bool,
    /// Redirect standard error
    pub stderr: bool,
}

impl Streams {
    /// Standard output only
    pub const STDOUT: Self = Self { stdout: true, stderr: false };

    /// Standard error only
    pub const STDERR: Self = Self { stdout: false, stderr: true };

    /// Both streams
    pub const BOTH: Self = Self { stdout: true, stderr: true };

    /// Create from flags
    pub fn new(stdout: bool, stderr: bool) -> Self {
        Self { stdout, stderr }
    }

    /// Nothing selected?
    pub fn is_empty(&self) -> bool {
        !self.stdout && !self.stderr
    }
}

/// Flush the buffered std handles so nothing crosses a swap boundary.
pub fn flush_std() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

/// Active redirection of one or both standard streams.
///
/// Dropping the guard flushes and restores the original descriptors.
pub struct StdioGuard {
    saved: Vec<imp::Saved>,
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl StdioGuard {
    /// Point the selected streams at `file`.
    ///
    /// # Errors
    ///
    /// Fails when a descriptor cannot be duplicated, or with
    /// [`io::ErrorKind::Unsupported`] on platforms without descriptor
    /// redirection. Streams swapped before the failure are restored.
    pub fn redirect(file: &File, streams: Streams) -> io::Result<Self> {
        let lock = STDIO_LOCK.lock();
        flush_std();

        let mut guard = Self {
            saved: Vec::with_capacity(2),
            _lock: lock,
        };

        if streams.stdout {
            guard.saved.push(imp::swap(file, imp::Target::Stdout)?);
        }
        if streams.stderr {
            guard.saved.push(imp::swap(file, imp::Target::Stderr)?);
        }

        debug!(?streams, "standard streams redirected");
        Ok(guard)
    }
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        flush_std();
        while let Some(saved) = self.saved.pop() {
            if let Err(e) = imp::restore(saved) {
                warn!("failed to restore standard stream: {}", e);
            }
        }
    }
}

#[cfg(unix)]
mod imp {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::{AsRawFd, RawFd};

    #[derive(Debug, Clone, Copy)]
    pub enum Target {
        Stdout,
        Stderr,
    }

    impl Target {
        fn fd(self) -> RawFd {
            match self {
                Target::Stdout => libc::STDOUT_FILENO,
                Target::Stderr => libc::STDERR_FILENO,
            }
        }
    }

    pub struct Saved {
        target: RawFd,
        copy: RawFd,
    }

    pub fn swap(file: &File, target: Target) -> io::Result<Saved> {
        let fd = target.fd();
        // SAFETY: dup/dup2/close only operate on descriptor numbers; `fd` is a
        // standard descriptor and `file` outlives this call.
        unsafe {
            let copy = libc::dup(fd);
            if copy < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::dup2(file.as_raw_fd(), fd) < 0 {
                let err = io::Error::last_os_error();
                libc::close(copy);
                return Err(err);
            }
            Ok(Saved { target: fd, copy })
        }
    }

    pub fn restore(saved: Saved) -> io::Result<()> {
        // SAFETY: `saved.copy` was produced by dup() in `swap` and is closed
        // exactly once here.
        unsafe {
            let rc = libc::dup2(saved.copy, saved.target);
            libc::close(saved.copy);
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod imp {
    use std::fs::File;
    use std::io;

    #[derive(Debug, Clone, Copy)]
    pub enum Target {
        Stdout,
        Stderr,
    }

    pub struct Saved;

    pub fn swap(_file: &File, _target: Target) -> io::Result<Saved> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "standard stream redirection is not supported on this platform",
        ))
    }

    pub fn restore(_saved: Saved) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_all(mut file: File) -> String {
        let mut content = String::new();
        std::io::Seek::rewind(&mut file).unwrap();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_stderr_swapped_and_restored() {
        let file = tempfile::tempfile().unwrap();

        {
            let _guard = StdioGuard::redirect(&file, Streams::STDERR).unwrap();
            io::stderr().write_all(b"into the file\n").unwrap();
        }

        assert_eq!(read_all(file), "into the file\n");
    }

    #[test]
    fn test_nested_guards_on_same_thread() {
        let outer = tempfile::tempfile().unwrap();
        let inner = tempfile::tempfile().unwrap();

        {
            let _a = StdioGuard::redirect(&outer, Streams::STDERR).unwrap();
            {
                let _b = StdioGuard::redirect(&inner, Streams::STDERR).unwrap();
                io::stderr().write_all(b"inner\n").unwrap();
            }
            io::stderr().write_all(b"outer\n").unwrap();
        }

        assert_eq!(read_all(outer), "outer\n");
        assert_eq!(read_all(inner), "inner\n");
    }

    #[test]
    fn test_threads_do_not_mix_output() {
        let handles: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|name| {
                std::thread::spawn(move || {
                    let file = tempfile::tempfile().unwrap();
                    {
                        let _guard = StdioGuard::redirect(&file, Streams::STDERR).unwrap();
                        for _ in 0..20 {
                            writeln!(io::stderr(), "{}", name).unwrap();
                            std::thread::yield_now();
                        }
                    }
                    (name, read_all(file))
                })
            })
            .collect();

        for handle in handles {
            let (name, content) = handle.join().unwrap();
            assert_eq!(content.lines().count(), 20);
            assert!(content.lines().all(|line| line == name), "{}: {:?}", name, content);
        }
    }

    #[test]
    fn test_streams() {
        assert!(Streams::default().is_empty());
        assert_eq!(Streams::new(true, true), Streams::BOTH);
        assert!(!Streams::STDOUT.stderr);
    }
}
