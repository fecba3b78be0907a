use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event scopes, ordered from most detailed to most aggregate.
///
/// A message logged at some scope also propagates to receivers listening at
/// any coarser scope, so a receiver subscribed to `Batch` sees everything a
/// `Target`-level component emits without subscribing to each scope
/// individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogEvent {
    /// Per-point market curve data
    Curve,
    /// Per-target decisions (bid search, policy clamps, sufficiency gates)
    Target,
    /// Placement analysis and traffic allocation steps
    Allocation,
    /// One optimization run over a batch of targets
    Batch,
    /// Validation and safety findings (coordination warnings, unsafe CPC)
    Validation,
}

/// Trait for log receivers that can receive engine messages
pub trait LogReceiver {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    /// Write a string to this receiver
    fn write(&mut self, s: &str) -> io::Result<()>;

    /// Flush this receiver
    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    min_event: LogEvent,
}

impl ConsoleReceiver {
    /// Create a console receiver listening at `min_event` and all coarser scopes.
    /// Returns a boxed receiver ready to be added to a logger
    pub fn new(min_event: LogEvent) -> Box<dyn LogReceiver> {
        Box::new(Self { min_event })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        event >= self.min_event
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        print!("{}", s);
        io::stdout().flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// In-memory log receiver, used by tests and by callers that want to attach
/// the engine's rationale trail to an audit record.
pub struct BufferReceiver {
    min_event: LogEvent,
    buffer: String,
}

impl BufferReceiver {
    pub fn new(min_event: LogEvent) -> Self {
        Self {
            min_event,
            buffer: String::new(),
        }
    }

    /// Contents captured so far
    pub fn contents(&self) -> &str {
        &self.buffer
    }
}

impl LogReceiver for BufferReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        event >= self.min_event
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.buffer.push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unique identifier for a receiver
pub type ReceiverId = usize;

/// Global counter for generating unique receiver IDs
static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Main logger that manages multiple receivers
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    /// Create a new logger with no receivers
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    /// Remove a receiver by its ID
    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// Write a message with a specific log event scope
    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    /// Write a message with newline
    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    fn log_with_prefix(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        self.log(event, &format!("{} {}\n", prefix, message))
    }

    /// Write an error message with newline, prefixed with "ERROR"
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "ERROR", message)
    }

    /// Write a warning message with newline, prefixed with "WARNING"
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "WARNING", message)
    }

    /// Flush all receivers
    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Macro to log a formatted string with newline (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted error string with newline, prefixed with "ERROR"
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted warning string with newline, prefixed with "WARNING"
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}
