//! Versioned, optionally gzip-wrapped state snapshots.
//!
//! Save always emits version 3 (gzip-compressed). Load accepts versions 1
//! through 3. The finger is saved biased by -1 so that, after a load, the
//! first instruction executed is the `in` that prompted the save — the
//! snapshot is taken from inside `in`'s handler, after the finger has
//! already advanced past it, so re-executing `in` is what lets the caller
//! resume exactly "where they were".

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::LoaderError;

const MAGIC: &[u8; 3] = b"umS";
const CURRENT_VERSION: u8 = 3;

pub struct Snapshot {
    /// The finger value to restore to, already biased by -1.
    pub finger_bias: u32,
    pub next_id: u32,
    pub registers: [u32; 8],
    pub arrays: HashMap<u32, Vec<u32>>,
    pub last_output_line: Vec<u8>,
}

pub fn write<W: Write>(writer: &mut W, snapshot: &Snapshot) -> Result<(), LoaderError> {
    writer.write_all(MAGIC)?;
    writer.write_u8(CURRENT_VERSION)?;

    let mut gz = GzEncoder::new(writer, Compression::default());
    write_payload(&mut gz, snapshot)?;
    gz.finish()?;
    Ok(())
}

fn write_payload<W: Write>(w: &mut W, snapshot: &Snapshot) -> Result<(), LoaderError> {
    w.write_u32::<BigEndian>(snapshot.finger_bias)?;
    w.write_u32::<BigEndian>(snapshot.next_id)?;
    for &reg in &snapshot.registers {
        w.write_u32::<BigEndian>(reg)?;
    }

    let mut ids: Vec<_> = snapshot.arrays.keys().copied().collect();
    ids.sort_unstable();

    w.write_u32::<BigEndian>(ids.len() as u32)?;
    for id in ids {
        let words = &snapshot.arrays[&id];
        w.write_u32::<BigEndian>(id)?;
        w.write_u32::<BigEndian>(words.len() as u32)?;
        for &word in words {
            w.write_u32::<BigEndian>(word)?;
        }
    }

    w.write_u32::<BigEndian>(snapshot.last_output_line.len() as u32)?;
    w.write_all(&snapshot.last_output_line)?;

    Ok(())
}

pub fn read<R: Read>(reader: &mut R) -> Result<Snapshot, LoaderError> {
    let mut magic = [0u8; 3];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(LoaderError::BadMagic);
    }

    let version = reader.read_u8()?;
    if !(1..=3).contains(&version) {
        return Err(LoaderError::UnsupportedVersion(version));
    }

    if version >= 3 {
        let mut gz = GzDecoder::new(reader);
        read_payload(&mut gz, version)
    } else {
        read_payload(reader, version)
    }
}

fn read_payload<R: Read>(r: &mut R, version: u8) -> Result<Snapshot, LoaderError> {
    let finger_bias = r.read_u32::<BigEndian>()?;
    let next_id = r.read_u32::<BigEndian>()?;

    let mut registers = [0u32; 8];
    for reg in registers.iter_mut() {
        *reg = r.read_u32::<BigEndian>()?;
    }

    let array_count = r.read_u32::<BigEndian>()?;
    let mut arrays = HashMap::with_capacity(array_count as usize);
    for _ in 0..array_count {
        let id = r.read_u32::<BigEndian>()?;
        let len = r.read_u32::<BigEndian>()?;
        let mut words = Vec::with_capacity(len as usize);
        for _ in 0..len {
            words.push(r.read_u32::<BigEndian>()?);
        }
        arrays.insert(id, words);
    }

    let last_output_line = if version >= 2 {
        let len = r.read_u32::<BigEndian>()?;
        let mut bytes = vec![0u8; len as usize];
        r.read_exact(&mut bytes)?;
        bytes
    } else {
        Vec::new()
    };

    Ok(Snapshot {
        finger_bias,
        next_id,
        registers,
        arrays,
        last_output_line,
    })
}

/// The plain (un-gzipped) v2 payload bytes for a snapshot, used only to
/// verify that v3 is exactly the gzip compression of what v2 would emit.
#[cfg(test)]
pub fn v2_payload_bytes(snapshot: &Snapshot) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    write_payload(&mut buf, snapshot).unwrap();
    buf.into_inner()
}
