//! Reads a `.um` program file (big-endian 32-bit words, no header) into the
//! word vector [`Machine::load_program`](crate::machine::Machine::load_program) expects.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::LoaderError;

pub fn load_program_file(path: &Path) -> Result<Vec<u32>, LoaderError> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    words_from_bytes(&bytes)
}

pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, LoaderError> {
    if bytes.len() % 4 != 0 {
        return Err(LoaderError::SizeNotMultipleOfFour(bytes.len()));
    }

    let mut cursor = bytes;
    let mut words = Vec::with_capacity(bytes.len() / 4);
    while !cursor.is_empty() {
        words.push(cursor.read_u32::<BigEndian>()?);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_words() {
        let bytes = [0x00, 0x00, 0x00, 0x01, 0xff, 0xff, 0xff, 0xff];
        let words = words_from_bytes(&bytes).unwrap();
        assert_eq!(words, vec![1, 0xFFFF_FFFF]);
    }

    #[test]
    fn rejects_sizes_not_a_multiple_of_four() {
        let err = words_from_bytes(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, LoaderError::SizeNotMultipleOfFour(3)));
    }
}
