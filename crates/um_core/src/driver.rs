//! The driver channel: an abstract capability external solvers implement to
//! synthesise guest input from guest output, so an automated explorer can
//! drive a running program as if it were a user at the terminal.

use std::collections::HashMap;
use std::rc::Rc;

use log::info;

use crate::error::DriverError;

/// A callback handed to a driver at construction time so it can surface
/// progress without colliding with guest output, the way the VM hands a
/// logging function to whatever it drives rather than the other way round.
pub type Logger = Rc<dyn Fn(&str)>;

/// Consulted by the `in` opcode before falling back to interactive input.
///
/// `drive` receives every byte the guest has written since the last call and
/// either returns a reply (its bytes are enqueued followed by a newline),
/// `Ok(None)` to detach cleanly, or `Err` if the driver failed; either way
/// the driver is detached and the caller falls back to interactive input.
pub trait Driver {
    fn drive(&mut self, output_since_last_input: &[u8]) -> Result<Option<Vec<u8>>, DriverError>;
}

/// A driver constructor, keyed by name, taking the `.slv name args...`
/// arguments (or the CLI's `--driver-arg`s) as its bootstrap string and a
/// logger to report progress through.
pub type DriverFactory = Box<dyn Fn(&str, Logger) -> Box<dyn Driver>>;

/// Callers construct one and pass it into the machine rather than reaching
/// into global state.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: DriverFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn build(&self, name: &str, bootstrap: &str) -> Option<Box<dyn Driver>> {
        let factory = self.factories.get(name)?;
        let label = name.to_string();
        let logger: Logger = Rc::new(move |message: &str| info!("driver[{label}]: {message}"));
        Some(factory(bootstrap, logger))
    }
}
