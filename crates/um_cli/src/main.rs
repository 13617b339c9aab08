//! Terminal front end for the Universal Machine core.
//!
//! Exposes three subcommands: `run` executes a program file, `asm`
//! disassembles one, and `load` resumes from a snapshot.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{warn, LevelFilter};

use um_core::{
    decode, loader, snapshot, DriverRegistry, LoaderError, Machine, OutputSink, Terminal, VmError,
};

#[derive(Parser)]
#[command(name = "um", about = "Universal Machine interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the program in <file>.
    Run {
        file: PathBuf,
        /// Attach a named driver at startup instead of waiting for `.slv`.
        #[arg(long)]
        driver: Option<String>,
        /// Extra arguments passed to the driver as its bootstrap string.
        #[arg(long = "driver-arg")]
        driver_args: Vec<String>,
    },
    /// Disassemble the program in <file> to standard output.
    Asm { file: PathBuf },
    /// Load state from <file> and resume execution.
    Load { file: PathBuf },
}

/// Reads lines from stdin and prints to stdout; `None` on Ctrl-D.
struct StdioTerminal {
    stdin: io::Lines<io::BufReader<io::Stdin>>,
}

impl StdioTerminal {
    fn new() -> Self {
        StdioTerminal {
            stdin: io::BufReader::new(io::stdin()).lines(),
        }
    }
}

impl Terminal for StdioTerminal {
    fn read_line(&mut self) -> Option<String> {
        match self.stdin.next()? {
            Ok(line) => Some(line),
            Err(_) => None,
        }
    }

    fn print_line(&mut self, line: &str) {
        println!("{line}");
    }
}

fn main() -> ExitCode {
    env_logger::Builder::new()
        .format(|f, record| writeln!(f, "{}: {}", record.level(), record.args()))
        .filter(None, LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            file,
            driver,
            driver_args,
        } => run(&file, driver, driver_args),
        Command::Asm { file } => asm(&file),
        Command::Load { file } => load(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn new_machine() -> Machine {
    Machine::new(OutputSink::terminal(Box::new(io::stdout())), DriverRegistry::new())
}

fn run(file: &PathBuf, driver: Option<String>, driver_args: Vec<String>) -> Result<(), CliError> {
    let words = loader::load_program_file(file)?;
    let mut machine = new_machine();
    machine.load_program(words);

    if let Some(name) = driver {
        let bootstrap = driver_args.join(" ");
        if !machine.attach_driver(&name, &bootstrap) {
            warn!("unknown driver requested at startup: {name}");
        }
    }

    drive_to_halt(&mut machine)
}

fn load(file: &PathBuf) -> Result<(), CliError> {
    let snap = {
        let mut reader = io::BufReader::new(std::fs::File::open(file).map_err(LoaderError::from)?);
        snapshot::read(&mut reader)?
    };
    let mut machine = new_machine();
    machine.restore_snapshot(snap);
    drive_to_halt(&mut machine)
}

fn drive_to_halt(machine: &mut Machine) -> Result<(), CliError> {
    let mut term = StdioTerminal::new();
    machine.run(&mut term)?;
    println!("Machine halted");
    Ok(())
}

fn asm(file: &PathBuf) -> Result<(), CliError> {
    let words = loader::load_program_file(file)?;
    for (index, &word) in words.iter().enumerate() {
        match decode::decode(word) {
            Ok(ins) => {
                let operands = ins
                    .operands()
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{index:08x}: {word:08x}  {} {operands}", ins.name());
            }
            Err(op) => println!("{index:08x}: {word:08x}  <invalid opcode {op}>"),
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Vm(#[from] VmError),
}
