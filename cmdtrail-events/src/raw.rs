//! Raw event format shared between the Rust and BPF parts, and its decoder.
//!
//! The layout is positional and packed, little-endian:
//!
//! | offset | size | content                                   |
//! |--------|------|-------------------------------------------|
//! | 0      | 4    | process id (u32)                          |
//! | 4      | 80   | command buffer, first NULL byte ends it   |
//!
//! Please keep in sync with its BPF counterpart (`readline.bpf.c`).

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::CommandEvent;

/// Offset of the process id field.
pub const PID_OFFSET: usize = 0;
/// Size of the process id field.
pub const PID_SIZE: usize = 4;
/// Offset of the command buffer.
pub const COMMAND_OFFSET: usize = PID_OFFSET + PID_SIZE;
/// Size of the command buffer, including its NULL terminator when present.
pub const COMMAND_SIZE: usize = 80;
/// Total size of a raw event.
pub const RAW_EVENT_SIZE: usize = COMMAND_OFFSET + COMMAND_SIZE;

/// Errors raised while decoding a raw event. Those are per-record: the record
/// is dropped but the caller is expected to continue with the next one.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The raw record does not have the fixed expected size.
    #[error("raw event is {len} bytes long, expected {RAW_EVENT_SIZE}")]
    Size { len: usize },
    /// The process id field could not be read.
    #[error("could not read the process id: {0}")]
    Pid(#[from] io::Error),
}

/// Decodes a raw record coming from the BPF part into a `CommandEvent`.
pub fn decode(data: &[u8]) -> Result<CommandEvent, DecodeError> {
    if data.len() != RAW_EVENT_SIZE {
        return Err(DecodeError::Size { len: data.len() });
    }

    let pid = Cursor::new(&data[PID_OFFSET..COMMAND_OFFSET]).read_u32::<LittleEndian>()?;

    Ok(CommandEvent {
        pid,
        command: c_bytes(&data[COMMAND_OFFSET..RAW_EVENT_SIZE]).to_vec(),
    })
}

/// Returns the bytes of a C string buffer up to (not including) its first
/// NULL byte. A buffer without any NULL byte is returned as a whole.
pub fn c_bytes(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&c| c == 0) {
        Some(end) => &buf[..end],
        None => buf,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn raw(pid: u32, command: &[u8]) -> Vec<u8> {
        let mut data = pid.to_le_bytes().to_vec();
        let mut buf = [0u8; COMMAND_SIZE];
        buf[..command.len()].copy_from_slice(command);
        data.extend_from_slice(&buf);
        data
    }

    #[test]
    fn decode_ls() {
        let event = decode(&raw(1, b"ls -la")).unwrap();
        assert_eq!(event.pid, 1);
        assert_eq!(event.command, b"ls -la");
    }

    #[test]
    fn decode_pid_is_little_endian() {
        let mut data = raw(0, b"true");
        data[..4].copy_from_slice(&[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(decode(&data).unwrap().pid, 0x12345678);
    }

    #[test]
    fn decode_stops_at_first_null() {
        // Garbage after the terminator must not leak into the command.
        let mut data = raw(42, b"echo hi");
        data[COMMAND_OFFSET + 8..COMMAND_OFFSET + 12].copy_from_slice(b"junk");
        assert_eq!(decode(&data).unwrap().command, b"echo hi");
    }

    #[test]
    fn decode_every_terminator_offset() {
        for k in COMMAND_OFFSET..RAW_EVENT_SIZE {
            let mut data = vec![b'a'; RAW_EVENT_SIZE];
            data[..4].copy_from_slice(&7u32.to_le_bytes());
            data[k] = 0;

            let event = decode(&data).unwrap();
            assert_eq!(event.pid, 7);
            assert_eq!(event.command, &data[COMMAND_OFFSET..k]);
        }
    }

    #[test]
    fn decode_without_terminator() {
        let mut data = 3u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[b'x'; COMMAND_SIZE]);

        let event = decode(&data).unwrap();
        assert_eq!(event.pid, 3);
        assert_eq!(event.command.len(), COMMAND_SIZE);
        assert!(event.command.iter().all(|&c| c == b'x'));
    }

    #[test]
    fn decode_keeps_non_text_bytes() {
        let event = decode(&raw(9, &[0xff, 0xfe, b'a'])).unwrap();
        assert_eq!(event.command, vec![0xff, 0xfe, b'a']);
    }

    #[test_case(0 ; "empty")]
    #[test_case(4 ; "pid only")]
    #[test_case(83 ; "one byte short")]
    #[test_case(85 ; "one byte long")]
    #[test_case(1024 ; "way too long")]
    fn decode_wrong_size(len: usize) {
        match decode(&vec![0u8; len]) {
            Err(DecodeError::Size { len: l }) => assert_eq!(l, len),
            _ => panic!("decoding a {len} bytes record should fail"),
        }
    }

    #[test]
    fn c_bytes_empty() {
        assert!(c_bytes(&[0, b'a']).is_empty());
        assert!(c_bytes(&[]).is_empty());
    }
}
