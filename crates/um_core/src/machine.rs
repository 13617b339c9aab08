//! Fetch-decode-execute loop over pre-decoded array 0.

use std::collections::HashMap;

use log::{debug, trace};

use crate::array::ArrayStore;
use crate::cache::DecodeCache;
use crate::command::{self, CommandOutcome};
use crate::decode::Instruction;
use crate::driver::DriverRegistry;
use crate::error::{FailedInstruction, VmError};
use crate::io::{IoChannel, OutputSink, Terminal};
use crate::snapshot::Snapshot;

pub enum StepOutcome {
    Continue,
    Halted,
}

pub struct Machine {
    registers: [u32; 8],
    finger: u32,
    halted: bool,
    store: ArrayStore,
    cache: DecodeCache,
    io: IoChannel,
    drivers: DriverRegistry,
}

impl Machine {
    /// A fresh, empty, halted machine. Call [`Machine::load_program`] before
    /// running it.
    pub fn new(output: OutputSink, drivers: DriverRegistry) -> Self {
        Machine {
            registers: [0; 8],
            finger: 0,
            halted: true,
            store: ArrayStore::new(Vec::new()),
            cache: DecodeCache::rebuild(&[]),
            io: IoChannel::new(output),
            drivers,
        }
    }

    /// Install `words` as array 0, reset registers/finger/next-id, rebuild
    /// the decode cache, clear the input queue, and mark the VM running.
    pub fn load_program(&mut self, words: Vec<u32>) {
        self.registers = [0; 8];
        self.finger = 0;
        self.cache = DecodeCache::rebuild(&words);
        self.store = ArrayStore::new(words);
        self.halted = false;
        self.io.detach_driver();
        debug!("loaded program of {} words", self.store.array0().len());
    }

    pub fn registers(&self) -> &[u32; 8] {
        &self.registers
    }

    pub fn finger(&self) -> u32 {
        self.finger
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn array_store(&self) -> &ArrayStore {
        &self.store
    }

    pub fn io(&mut self) -> &mut IoChannel {
        &mut self.io
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Run until halted or a runtime error is hit.
    pub fn run(&mut self, term: &mut impl Terminal) -> Result<(), VmError> {
        loop {
            match self.step(term)? {
                StepOutcome::Halted => return Ok(()),
                StepOutcome::Continue => {}
            }
        }
    }

    /// Execute exactly one instruction.
    pub fn step(&mut self, term: &mut impl Terminal) -> Result<StepOutcome, VmError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }

        let finger = self.finger;
        let entry = self
            .cache
            .get(finger as usize)
            .ok_or(VmError::InvalidFinger(finger))?;

        self.finger = finger.wrapping_add(1);

        let ins = entry.map_err(|op| VmError::InvalidOpcode { op, finger })?;
        trace!("{:08x}: {:?}", finger, ins);

        self.execute(ins, finger, term)?;

        if self.halted {
            Ok(StepOutcome::Halted)
        } else {
            Ok(StepOutcome::Continue)
        }
    }

    fn reg(&self, r: crate::decode::Reg) -> u32 {
        self.registers[r as usize]
    }

    fn set_reg(&mut self, r: crate::decode::Reg, v: u32) {
        self.registers[r as usize] = v;
    }

    fn failure(&self, ins: Instruction, finger: u32) -> FailedInstruction {
        FailedInstruction {
            name: ins.name(),
            operands: ins.operands(),
            finger,
        }
    }

    fn execute(
        &mut self,
        ins: Instruction,
        finger: u32,
        term: &mut impl Terminal,
    ) -> Result<(), VmError> {
        match ins {
            Instruction::CMov { a, b, c } => {
                if self.reg(c) != 0 {
                    self.set_reg(a, self.reg(b));
                }
            }
            Instruction::Index { a, b, c } => {
                let array_id = self.reg(b);
                let index = self.reg(c);
                let array = self
                    .store
                    .get(array_id)
                    .ok_or_else(|| VmError::UnknownArray(self.failure(ins, finger)))?;
                let value = *array
                    .get(index as usize)
                    .ok_or_else(|| VmError::IndexOutOfBounds(self.failure(ins, finger)))?;
                self.set_reg(a, value);
            }
            Instruction::Amend { a, b, c } => {
                let array_id = self.reg(a);
                let index = self.reg(b);
                let value = self.reg(c);
                let array = self
                    .store
                    .get_mut(array_id)
                    .ok_or_else(|| VmError::UnknownArray(self.failure(ins, finger)))?;
                let slot = array
                    .get_mut(index as usize)
                    .ok_or_else(|| VmError::IndexOutOfBounds(self.failure(ins, finger)))?;
                *slot = value;
                if array_id == 0 {
                    self.cache.invalidate(index as usize, value);
                }
            }
            Instruction::Add { a, b, c } => {
                self.set_reg(a, self.reg(b).wrapping_add(self.reg(c)));
            }
            Instruction::Mul { a, b, c } => {
                self.set_reg(a, self.reg(b).wrapping_mul(self.reg(c)));
            }
            Instruction::Div { a, b, c } => {
                let divisor = self.reg(c);
                if divisor == 0 {
                    return Err(VmError::DivideByZero(self.failure(ins, finger)));
                }
                self.set_reg(a, self.reg(b) / divisor);
            }
            Instruction::Nand { a, b, c } => {
                self.set_reg(a, !(self.reg(b) & self.reg(c)));
            }
            Instruction::Halt => {
                self.halted = true;
            }
            Instruction::Alloc { b, c } => {
                let id = self.store.alloc(self.reg(c));
                self.set_reg(b, id);
            }
            Instruction::Abandon { c } => {
                if !self.store.free(self.reg(c)) {
                    let failure = self.failure(ins, finger);
                    return Err(if self.reg(c) == 0 {
                        VmError::FreeArrayZero(failure)
                    } else {
                        VmError::UnknownArray(failure)
                    });
                }
            }
            Instruction::Out { c } => {
                let value = self.reg(c);
                if value >= 256 {
                    return Err(VmError::OutOfRange(self.failure(ins, finger)));
                }
                self.io
                    .emit(value as u8)
                    .map_err(|e| VmError::OutputFailed(self.failure(ins, finger), e.to_string()))?;
            }
            Instruction::In { c } => self.op_in(c, term)?,
            Instruction::Load { b, c } => {
                let array_id = self.reg(b);
                if array_id != 0 {
                    let source = self
                        .store
                        .get(array_id)
                        .ok_or_else(|| VmError::UnknownArray(self.failure(ins, finger)))?
                        .clone();
                    self.store.replace_array0(source);
                    self.cache = DecodeCache::rebuild(self.store.array0());
                }
                // `load 0 c` is a pure jump: no copy, no cache rebuild, even
                // though array 0 may be large.
                self.finger = self.reg(c);
            }
            Instruction::Orth { s, v } => self.set_reg(s, v),
        }
        Ok(())
    }

    fn op_in(&mut self, c: crate::decode::Reg, term: &mut impl Terminal) -> Result<(), VmError> {
        loop {
            if !self.io.input_is_empty() {
                break;
            }

            if self.io.has_driver() {
                self.io.poll_driver();
                continue;
            }

            match term.read_line() {
                None => {
                    self.set_reg(c, u32::MAX);
                    return Ok(());
                }
                Some(line) => match command::handle(self, &line, term) {
                    CommandOutcome::Consumed => return Ok(()),
                    CommandOutcome::Handled => continue,
                    CommandOutcome::Forward(bytes) => self.io.enqueue_line(&bytes),
                },
            }
        }

        let byte = self.io.pop_input().expect("queue checked non-empty above");
        self.set_reg(c, byte as u32);
        Ok(())
    }

    /// Attach a driver by name from the machine's registry, with `args` as
    /// its bootstrap string, delivered to the driver as if it were the first
    /// chunk of output-since-last-input. Returns `false` if the name is
    /// unknown.
    pub fn attach_driver(&mut self, name: &str, args: &str) -> bool {
        match self.drivers.build(name, args) {
            Some(driver) => {
                self.io.attach_driver(driver, args.as_bytes());
                true
            }
            None => false,
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let mut arrays = HashMap::with_capacity(self.store.count());
        for (&id, array) in self.store.iter() {
            arrays.insert(id, array.clone());
        }
        Snapshot {
            finger_bias: self.finger.wrapping_sub(1),
            next_id: self.store.next_id(),
            registers: self.registers,
            arrays,
            last_output_line: self.io.last_output_line().to_vec(),
        }
    }

    /// Replace the VM's state wholesale from a loaded snapshot and resume.
    pub fn restore_snapshot(&mut self, snapshot: Snapshot) {
        self.finger = snapshot.finger_bias;
        self.registers = snapshot.registers;
        self.store = ArrayStore::restore(snapshot.arrays, snapshot.next_id);
        self.cache = DecodeCache::rebuild(self.store.array0());
        self.halted = false;
        self.io.detach_driver();
        self.io.set_last_output_line(snapshot.last_output_line);
    }
}
