//! Dot-prefixed meta-commands recognised on the interactive input line.
//!
//! A line starting with `.` is never forwarded to the guest; everything
//! else is queued as guest input instead.

use std::fs::File;

use log::warn;

use crate::io::Terminal;
use crate::machine::Machine;
use crate::snapshot;

pub enum CommandOutcome {
    /// The command took effect but the blocked `in` keeps waiting for real
    /// guest input: the caller's loop should keep re-prompting the same
    /// destination register rather than returning.
    Handled,
    /// The command ends the `in` that prompted it (`.halt`, `.load`); the
    /// opcode returns without touching its destination register.
    Consumed,
    /// The line was ordinary guest input; enqueue these bytes + `\n`.
    Forward(Vec<u8>),
}

const DEFAULT_SNAPSHOT_FILE: &str = "state.ums";
const DEFAULT_BIN_FILE: &str = "dump.um";

pub fn handle(machine: &mut Machine, line: &str, term: &mut impl Terminal) -> CommandOutcome {
    let Some(rest) = line.strip_prefix('.') else {
        return CommandOutcome::Forward(line.as_bytes().to_vec());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match name {
        "help" => {
            help(term);
            CommandOutcome::Handled
        }
        "halt" => {
            machine.halt();
            CommandOutcome::Consumed
        }
        "reg" => {
            reg(machine, term);
            CommandOutcome::Handled
        }
        "arr" => {
            arr(machine, term);
            CommandOutcome::Handled
        }
        "save" => {
            save(machine, term, args.first().copied());
            CommandOutcome::Handled
        }
        "load" => {
            load(machine, term, args.first().copied());
            CommandOutcome::Consumed
        }
        "bin" => {
            bin(machine, term, args.first().copied());
            CommandOutcome::Handled
        }
        "slv" => {
            slv(machine, term, &args);
            CommandOutcome::Handled
        }
        _ => {
            term.print_line(&format!("< unknown command: .{name}"));
            help(term);
            CommandOutcome::Handled
        }
    }
}

fn help(term: &mut impl Terminal) {
    term.print_line("< available commands:");
    term.print_line("<   .help              list commands");
    term.print_line("<   .halt              halt the machine");
    term.print_line("<   .reg               show registers and finger");
    term.print_line("<   .arr               show array sizes");
    term.print_line("<   .save [file]       save state (default state.ums)");
    term.print_line("<   .load [file]       load state and resume (default state.ums)");
    term.print_line("<   .bin [file]        redirect output bytes to file (default dump.um)");
    term.print_line("<   .slv [name args…]  attach a driver; no args lists them");
}

fn reg(machine: &Machine, term: &mut impl Terminal) {
    let regs = machine
        .registers()
        .iter()
        .enumerate()
        .map(|(i, r)| format!("r{i}=0x{r:08x}"))
        .collect::<Vec<_>>()
        .join(" ");
    term.print_line(&format!("< finger=0x{:08x} {regs}", machine.finger()));
}

fn arr(machine: &Machine, term: &mut impl Terminal) {
    let sizes = machine.array_store().sizes();
    term.print_line(&format!("< {} allocated arrays", sizes.len()));
    for (id, len) in sizes {
        term.print_line(&format!("< {id:08x}: {len} entries"));
    }
}

fn save(machine: &Machine, term: &mut impl Terminal, file: Option<&str>) {
    let path = file.unwrap_or(DEFAULT_SNAPSHOT_FILE);
    term.print_line(&format!("< saving state to {path}..."));

    let result = File::create(path)
        .map_err(crate::error::LoaderError::from)
        .and_then(|f| snapshot::write(&mut std::io::BufWriter::new(f), &machine.to_snapshot()));

    match result {
        Ok(()) => term.print_line(&format!("< saved state to {path}")),
        Err(e) => term.print_line(&format!("< failed to save state to {path}: {e}")),
    }
}

fn load(machine: &mut Machine, term: &mut impl Terminal, file: Option<&str>) {
    let path = file.unwrap_or(DEFAULT_SNAPSHOT_FILE);
    term.print_line(&format!("< loading state from {path}..."));

    let result = File::open(path)
        .map_err(crate::error::LoaderError::from)
        .and_then(|f| snapshot::read(&mut std::io::BufReader::new(f)));

    match result {
        Ok(snap) => {
            let last_line = snap.last_output_line.clone();
            machine.restore_snapshot(snap);
            term.print_line(&format!("< loaded state from {path}"));
            if !last_line.is_empty() {
                term.print_line(&String::from_utf8_lossy(&last_line));
            }
        }
        Err(e) => term.print_line(&format!("< failed to load state from {path}: {e}")),
    }
}

fn bin(machine: &mut Machine, term: &mut impl Terminal, file: Option<&str>) {
    let path = file.unwrap_or(DEFAULT_BIN_FILE);
    match File::create(path) {
        Ok(f) => {
            machine.io().redirect_output_to_file(f);
            term.print_line(&format!("< now saving machine output to {path}"));
        }
        Err(e) => term.print_line(&format!("< failed to open {path}: {e}")),
    }
}

fn slv(machine: &mut Machine, term: &mut impl Terminal, args: &[&str]) {
    if args.is_empty() {
        term.print_line("< available drivers:");
        for name in machine.drivers().names() {
            term.print_line(&format!("<   {name}"));
        }
        return;
    }

    let name = args[0];
    let bootstrap = args[1..].join(" ");
    if machine.attach_driver(name, &bootstrap) {
        term.print_line(&format!("< attached driver: {name}"));
    } else {
        warn!("unknown driver requested: {name}");
        term.print_line(&format!("< unknown driver: {name}, try '.slv' to list them"));
    }
}
