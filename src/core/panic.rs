//! Panic capture
//!
//! Runs closures under `catch_unwind` and records what the panic hook saw
//! (message, location, backtrace) so wrappers can report it themselves.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

static HOOK: Once = Once::new();

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

/// What a captured panic looked like
#[derive(Debug, Clone)]
pub struct PanicReport {
    /// Panic message
    pub message: String,
    /// `file:line:column` of the panic, when known
    pub location: Option<String>,
    /// Backtrace captured inside the hook
    pub backtrace: Option<String>,
}

impl PanicReport {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: panic_payload_to_string(payload),
            location: None,
            backtrace: None,
        }
    }

    /// Single-line summary, without the backtrace
    pub fn summary(&self) -> String {
        match &self.location {
            Some(location) => format!("panicked at {}: {}", location, self.message),
            None => format!("panicked: {}", self.message),
        }
    }
}

impl fmt::Display for PanicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())?;
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\nstack backtrace:\n{}", backtrace)?;
        }
        Ok(())
    }
}

/// A panic caught by [`catch`]
pub struct CaughtPanic {
    /// Details recorded by the hook
    pub report: PanicReport,
    /// The original payload, for `resume_unwind`
    pub payload: Box<dyn Any + Send>,
}

impl CaughtPanic {
    /// Continue unwinding with the original payload.
    ///
    /// An enclosing [`catch`] on this thread sees the same report, since
    /// `resume_unwind` does not run the panic hook again.
    pub fn resume(self) -> ! {
        if DEPTH.with(Cell::get) > 0 {
            LAST.with(|last| *last.borrow_mut() = Some(self.report));
        }
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for CaughtPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaughtPanic")
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

/// Convert a panic payload into readable text.
pub fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let report = PanicReport {
                message: panic_payload_to_string(info.payload()),
                location: info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
                backtrace: Some(Backtrace::force_capture().to_string()),
            };
            LAST.with(|last| *last.borrow_mut() = Some(report));
        }));
    });
}

struct Scope;

impl Scope {
    fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Run `f`, turning a panic into a [`CaughtPanic`].
///
/// While `f` runs the default panic message is suppressed on this thread;
/// the caller decides how to report it.
///
/// # Errors
///
/// Returns the captured panic when `f` unwinds.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    install_hook();
    LAST.with(|last| last.borrow_mut().take());
    let outcome = {
        let _scope = Scope::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };

    outcome.map_err(|payload| {
        let report = LAST
            .with(|last| last.borrow_mut().take())
            .unwrap_or_else(|| PanicReport::from_payload(payload.as_ref()));
        CaughtPanic { report, payload }
    })
}
