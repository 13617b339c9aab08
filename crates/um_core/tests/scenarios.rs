//! End-to-end scenarios: literal input programs with expected
//! machine-observable effects.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use um_core::{snapshot, DriverRegistry, Machine, OutputSink, Terminal, VmError};

fn word(op: u32, a: u32, b: u32, c: u32) -> u32 {
    (op << 28) | (a << 6) | (b << 3) | c
}

fn orth(reg: u32, val: u32) -> u32 {
    (13 << 28) | (reg << 25) | val
}

fn in_word(c: u32) -> u32 {
    word(11, 0, 0, c)
}

fn out_word(c: u32) -> u32 {
    word(10, 0, 0, c)
}

fn halt_word() -> u32 {
    word(7, 0, 0, 0)
}

struct Recorder(Rc<RefCell<Vec<u8>>>);

impl Write for Recorder {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capturing_machine() -> (Machine, Rc<RefCell<Vec<u8>>>) {
    let buf = Rc::new(RefCell::new(Vec::new()));
    let sink = OutputSink::terminal(Box::new(Recorder(buf.clone())));
    (Machine::new(sink, DriverRegistry::new()), buf)
}

/// A scripted interactive terminal: feeds back one queued line per
/// `read_line` call and records every printed line (command-interpreter
/// output, never guest output).
struct ScriptedTerminal {
    lines: std::collections::VecDeque<String>,
    printed: Vec<String>,
}

impl ScriptedTerminal {
    fn new(lines: Vec<&str>) -> Self {
        ScriptedTerminal {
            lines: lines.into_iter().map(String::from).collect(),
            printed: Vec::new(),
        }
    }
}

impl Terminal for ScriptedTerminal {
    fn read_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    fn print_line(&mut self, line: &str) {
        self.printed.push(line.to_string());
    }
}

#[test]
fn hello_world_microprogram_emits_exact_bytes_then_halts() {
    let (mut m, out) = capturing_machine();

    let mut program = Vec::new();
    for &byte in b"Hello\n" {
        program.push(orth(0, byte as u32));
        program.push(out_word(0));
    }
    program.push(halt_word());

    m.load_program(program);
    m.run(&mut ()).unwrap();

    assert_eq!(&*out.borrow(), b"Hello\n");
    assert!(m.is_halted());
}

#[test]
fn self_copying_loader_restarts_finger_and_resizes_decode_cache() {
    let (mut m, _out) = capturing_machine();

    // Builds the 32-bit word for a bare `halt` (opcode 7, top nibble only)
    // from two 25-bit-safe orthography immediates, since no single `orth`
    // can place a bit past position 24: 7 * 2^24 * 16 == 7 << 28.
    let program = vec![
        orth(0, 7),               // r0 = 7
        orth(1, 1 << 24),         // r1 = 2^24
        word(4, 2, 0, 1),         // r2 = r0 * r1 = 0x07000000
        orth(3, 16),              // r3 = 16
        word(4, 4, 2, 3),         // r4 = r2 * r3 = 0x70000000 (halt word)
        orth(6, 1),               // r6 = 1 (new array length)
        word(8, 0, 5, 6),         // alloc b=r5, c=r6 -> r5 = new array id, len 1
        orth(7, 0),               // r7 = 0 (index)
        orth(8, 0),               // r8 = 0 (jump target finger)
        word(2, 5, 7, 4),         // amend array(r5)[0] = r4 (the halt word)
        word(12, 0, 5, 8),        // load b=r5, c=r8 -> array0 := array(r5); finger = 0
        halt_word(),              // never reached: overwritten by the load above
    ];

    m.load_program(program);

    for _ in 0..20 {
        if m.is_halted() {
            break;
        }
        m.step(&mut ()).unwrap();
    }

    assert!(m.is_halted());
    assert_eq!(m.array_store().array0().len(), 1);
    assert_eq!(m.finger(), 1);
}

#[test]
fn division_by_zero_reports_operands_and_finger() {
    let (mut m, _out) = capturing_machine();
    m.load_program(vec![orth(1, 0), word(5, 0, 0, 1)]);

    let err = m.run(&mut ()).unwrap_err();
    match err {
        VmError::DivideByZero(f) => {
            assert_eq!(f.name, "div");
            assert_eq!(f.operands, vec![0, 0, 1]);
            assert_eq!(f.finger, 1);
            assert_eq!(f.to_string(), "executing div 0 0 1 at 00000001");
        }
        other => panic!("expected DivideByZero, got {other:?}"),
    }
}

#[test]
fn eof_on_terminal_read_sets_all_ones() {
    let (mut m, _out) = capturing_machine();
    m.load_program(vec![in_word(3), halt_word()]);
    m.run(&mut ()).unwrap();
    assert_eq!(m.registers()[3], 0xFFFF_FFFF);
}

#[test]
fn snapshot_round_trip_resumes_inside_the_in_that_prompted_it() {
    // `in r0`; `out r0`; `halt` — echoes the first input byte back out.
    let (mut m, _out) = capturing_machine();
    m.load_program(vec![in_word(0), out_word(0), halt_word()]);

    let tmp = std::env::temp_dir().join(format!(
        "um_core_snapshot_round_trip_{}.ums",
        std::process::id()
    ));
    let save_line = format!(".save {}", tmp.display());

    // `.save` fires while the first `in` is still blocked waiting for real
    // input: it doesn't end the block, so the very next line ("A") is what
    // the same `in` resolves to, after the snapshot is already on disk with
    // the finger biased back onto the `in` itself.
    let mut first = ScriptedTerminal::new(vec![save_line.as_str(), "A"]);
    m.run(&mut first).unwrap();
    assert!(first.printed.iter().any(|l| l.contains("saved state")));

    let snap = {
        let mut reader = io::BufReader::new(std::fs::File::open(&tmp).unwrap());
        snapshot::read(&mut reader).unwrap()
    };
    let _ = std::fs::remove_file(&tmp);

    let (mut resumed, out) = capturing_machine();
    resumed.restore_snapshot(snap);

    let mut second = ScriptedTerminal::new(vec!["A"]);
    resumed.run(&mut second).unwrap();

    assert_eq!(&*out.borrow(), b"A");
    assert!(resumed.is_halted());
}

#[test]
fn dot_command_interleave_keeps_blocking_the_same_in() {
    let (mut m, _out) = capturing_machine();
    m.load_program(vec![
        in_word(0),
        in_word(1),
        in_word(2),
        in_word(3),
        in_word(4),
        in_word(5),
        halt_word(),
    ]);

    let mut term = ScriptedTerminal::new(vec![".reg", "hello"]);
    m.run(&mut term).unwrap();

    // `.reg` doesn't end the blocked `in`: it keeps re-prompting the
    // terminal, so the very next line ("hello") is what resolves r0.
    assert_eq!(m.registers()[0], b'h' as u32);
    // `hello\n` enqueued h e l l o 0x0A; the first byte went to r0 above,
    // leaving the other five for the remaining `in`s.
    assert_eq!(m.registers()[1], b'e' as u32);
    assert_eq!(m.registers()[2], b'l' as u32);
    assert_eq!(m.registers()[3], b'l' as u32);
    assert_eq!(m.registers()[4], b'o' as u32);
    assert_eq!(m.registers()[5], b'\n' as u32);
    assert!(term.printed.iter().any(|l| l.contains("finger=")));
}
