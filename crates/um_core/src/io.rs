//! The byte-oriented I/O channel: output (terminal or redirected file) and
//! input (a FIFO queue fed by the terminal, the command interpreter, or an
//! attached [`Driver`]).

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use log::warn;

use crate::driver::Driver;

pub enum OutputSink {
    Terminal {
        writer: Box<dyn Write>,
        last_line: Vec<u8>,
    },
    File(BufWriter<File>),
}

impl OutputSink {
    pub fn terminal(writer: Box<dyn Write>) -> Self {
        OutputSink::Terminal {
            writer,
            last_line: Vec::new(),
        }
    }

    /// The characters emitted since the last newline, used only to
    /// redisplay context after a state reload. Empty while writing to a file.
    pub fn last_line(&self) -> &[u8] {
        match self {
            OutputSink::Terminal { last_line, .. } => last_line,
            OutputSink::File(_) => &[],
        }
    }

    pub fn set_last_line(&mut self, bytes: Vec<u8>) {
        if let OutputSink::Terminal { last_line, .. } = self {
            *last_line = bytes;
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, OutputSink::File(_))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        match self {
            OutputSink::File(w) => w.write_all(&[byte]),
            OutputSink::Terminal { writer, last_line } => {
                writer.write_all(&[byte])?;
                if byte == b'\n' {
                    last_line.clear();
                    writer.flush()?;
                } else {
                    last_line.push(byte);
                }
                Ok(())
            }
        }
    }
}

/// FIFO of bytes waiting to be consumed by the `in` opcode, plus everything
/// that decides what feeds it: an optional attached driver and the
/// accumulator of output produced since the last `in`.
pub struct IoChannel {
    queue: VecDeque<u8>,
    output: OutputSink,
    driver: Option<Box<dyn Driver>>,
    since_last_input: Vec<u8>,
}

impl IoChannel {
    pub fn new(output: OutputSink) -> Self {
        IoChannel {
            queue: VecDeque::new(),
            output,
            driver: None,
            since_last_input: Vec::new(),
        }
    }

    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    pub fn redirect_output_to_file(&mut self, file: File) {
        self.output = OutputSink::File(BufWriter::new(file));
    }

    /// Emit one byte. Mirrors it into the driver accumulator only while a
    /// driver is attached.
    pub fn emit(&mut self, byte: u8) -> io::Result<()> {
        if self.driver.is_some() && !self.output.is_file() {
            self.since_last_input.push(byte);
        }
        self.output.write_byte(byte)
    }

    pub fn last_output_line(&self) -> &[u8] {
        self.output.last_line()
    }

    pub fn set_last_output_line(&mut self, bytes: Vec<u8>) {
        self.output.set_last_line(bytes);
    }

    /// Attach a driver. `bootstrap` is seeded into the output-since-last-input
    /// accumulator so the driver's first `drive()` call sees it as if it were
    /// the first chunk of guest output, per the driver channel's bootstrap
    /// convention.
    pub fn attach_driver(&mut self, driver: Box<dyn Driver>, bootstrap: &[u8]) {
        self.driver = Some(driver);
        self.since_last_input.clear();
        self.since_last_input.extend_from_slice(bootstrap);
    }

    pub fn detach_driver(&mut self) {
        self.driver = None;
        self.since_last_input.clear();
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Consult the driver, if any, feeding it everything emitted since the
    /// last call. `Some(true)` means the driver answered and its reply was
    /// enqueued; `Some(false)` means the driver detached itself (cleanly or
    /// after an error, which is logged via [`log::warn!`]); `None` means no
    /// driver is attached.
    pub fn poll_driver(&mut self) -> Option<bool> {
        let driver = self.driver.as_mut()?;
        let chunk = std::mem::take(&mut self.since_last_input);
        match driver.drive(&chunk) {
            Ok(Some(reply)) => {
                self.enqueue_line(&reply);
                Some(true)
            }
            Ok(None) => {
                self.driver = None;
                Some(false)
            }
            Err(e) => {
                warn!("driver detached after error: {e}");
                self.driver = None;
                Some(false)
            }
        }
    }

    /// Append a line's bytes to the input queue followed by `\n` (0x0A).
    pub fn enqueue_line(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
        self.queue.push_back(b'\n');
    }

    pub fn pop_input(&mut self) -> Option<u8> {
        self.queue.pop_front()
    }

    pub fn input_is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// The host side of the interactive session: reads lines for the `in`
/// opcode's terminal fallback and displays command-interpreter output that
/// is host UX, not guest-visible bytes (so it bypasses the output sink).
///
/// `()` acts as "no terminal attached": every read is immediate
/// end-of-input and every print is discarded, the same default-no-op
/// convention used elsewhere in this crate for optional capabilities.
pub trait Terminal {
    /// `None` signals end-of-input (Ctrl-D / closed stdin).
    fn read_line(&mut self) -> Option<String>;

    fn print_line(&mut self, line: &str);
}

impl Terminal for () {
    fn read_line(&mut self) -> Option<String> {
        None
    }

    fn print_line(&mut self, _line: &str) {}
}
