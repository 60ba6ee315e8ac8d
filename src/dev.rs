//! Special device streams matched by path before the filesystem is
//! consulted: `/dev/null`, `/dev/zero`, `/dev/random`, `/dev/urandom`.

use std::io;

use crate::stream::{InStream, OutStream, Resource};

/// `/dev/null`: writes are discarded, reads are at end of input.
pub struct Null;

impl Resource for Null {}

impl OutStream for Null {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
}

impl InStream for Null {
    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

/// `/dev/zero`: reads yield null bytes indefinitely, writes are discarded.
pub struct Zero;

impl Resource for Zero {}

impl OutStream for Zero {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
}

impl InStream for Zero {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }
}

/// `/dev/random` and `/dev/urandom`: reads yield cryptographically strong
/// random bytes from the operating system, writes are discarded.
pub struct Random;

impl Resource for Random {}

impl OutStream for Random {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
}

impl InStream for Random {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        getrandom::getrandom(buf).map_err(io::Error::from)?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reads_eof_and_swallows_writes() {
        let mut buf = [1u8; 4];
        assert_eq!(Null.read(&mut buf).unwrap(), 0);
        assert_eq!(OutStream::write(&Null, b"data").unwrap(), 4);
    }

    #[test]
    fn zero_fills_with_null_bytes() {
        let mut buf = [7u8; 16];
        assert_eq!(Zero.read(&mut buf).unwrap(), 16);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn random_fills_whole_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        Random.read(&mut a).unwrap();
        Random.read(&mut b).unwrap();
        // 1 in 2^256 false failure odds
        assert_ne!(a, b);
    }
}
