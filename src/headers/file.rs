// ecomp: Lossless compression of multiple sequence alignments.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use crate::error::Error;

use std::io::Read;

/// Magic bytes opening every `.ecomp` archive.
pub const MAGIC: &[u8; 8] = b"ECOMP001";

/// Encoded size of the archive header in bytes.
pub const HEADER_SIZE: usize = 20;

// Archive header for encoded data
//
// Always the first 20 bytes at the beginning of a .ecomp v1.x file.
//
// Must always conform to this format: the magic, one byte each for the
// major, minor, and patch version, the payload length as a big-endian
// u64 at bytes 11..19, and a reserved zero byte.
//
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub version: (u8, u8, u8),
    /// Number of payload bytes following the header.
    pub payload_len: u64,
}

impl ArchiveHeader {
    pub fn new(
        payload_len: u64,
    ) -> Self {
        ArchiveHeader { version: crate::FORMAT_VERSION_TUPLE, payload_len }
    }

    pub fn to_bytes(
        &self,
    ) -> [u8; HEADER_SIZE] {
        let mut bytes = [0_u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(MAGIC);
        bytes[8] = self.version.0;
        bytes[9] = self.version.1;
        bytes[10] = self.version.2;
        bytes[11..19].copy_from_slice(&self.payload_len.to_be_bytes());
        // bytes[19] is reserved and stays zero
        bytes
    }

    pub fn from_bytes(
        bytes: &[u8; HEADER_SIZE],
    ) -> Result<Self, Error> {
        if &bytes[0..8] != MAGIC {
            return Err(Error::MalformedArchive(
                "invalid .ecomp magic header".to_string(),
            ));
        }
        let version = (bytes[8], bytes[9], bytes[10]);
        if version.0 != crate::FORMAT_VERSION_TUPLE.0 {
            return Err(Error::MalformedArchive(format!(
                "archive major version {} does not match supported version {}",
                version.0, crate::FORMAT_VERSION_TUPLE.0
            )));
        }
        let payload_len = u64::from_be_bytes(bytes[11..19].try_into().expect("8-byte slice"));
        Ok(ArchiveHeader { version, payload_len })
    }
}

pub fn read_archive_header<R: Read>(
    conn: &mut R,
) -> Result<ArchiveHeader, Error> {
    let mut header_bytes = [0_u8; HEADER_SIZE];
    conn.read_exact(&mut header_bytes).map_err(|err| {
        Error::MalformedArchive(format!("archive header truncated: {}", err))
    })?;
    ArchiveHeader::from_bytes(&header_bytes)
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn header_layout() {
        use super::ArchiveHeader;

        let header = ArchiveHeader { version: (1, 0, 0), payload_len: 258 };

        let got = header.to_bytes();

        let expected: [u8; 20] = [
            b'E', b'C', b'O', b'M', b'P', b'0', b'0', b'1',
            1, 0, 0,
            0, 0, 0, 0, 0, 0, 1, 2,
            0,
        ];

        assert_eq!(got, expected);
    }

    #[test]
    fn header_round_trip() {
        use super::ArchiveHeader;

        let expected = ArchiveHeader::new(987654321);

        let got = ArchiveHeader::from_bytes(&expected.to_bytes()).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn read_archive_header_from_stream() {
        use super::ArchiveHeader;
        use super::read_archive_header;

        use std::io::Cursor;

        let expected = ArchiveHeader::new(42);
        let mut data: Vec<u8> = expected.to_bytes().to_vec();
        data.extend_from_slice(&[0xAB; 42]);
        let mut conn: Cursor<Vec<u8>> = Cursor::new(data);

        let got = read_archive_header(&mut conn).unwrap();

        assert_eq!(got, expected);
        assert_eq!(conn.position(), 20);
    }

    #[test]
    fn bad_magic_is_rejected() {
        use super::ArchiveHeader;

        let mut bytes = ArchiveHeader::new(0).to_bytes();
        bytes[0] = b'X';

        assert!(ArchiveHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn major_version_mismatch_is_rejected() {
        use super::ArchiveHeader;

        let mut bytes = ArchiveHeader::new(0).to_bytes();
        bytes[8] = 2;

        assert!(ArchiveHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn minor_and_patch_are_informational() {
        use super::ArchiveHeader;

        let mut bytes = ArchiveHeader::new(7).to_bytes();
        bytes[9] = 9;
        bytes[10] = 9;

        let got = ArchiveHeader::from_bytes(&bytes).unwrap();

        assert_eq!(got.version, (1, 9, 9));
        assert_eq!(got.payload_len, 7);
    }
}
