//! `EFI_LOAD_OPTION` as stored in `BootXXXX` variables.
//!
//! Layout:
//! - attributes, 4 bytes;
//! - length in bytes of the device path, 2 bytes;
//! - description, NUL-terminated UTF-16;
//! - device path;
//! - optional data, until the end of the variable.
//!
//! All integers are little endian.

use crate::{
    device_path::{locate_hard_drive_media, HardDriveMedia, WalkError, HARD_DRIVE_NODE_LEN},
    partition::HardDriveMediaMut,
    util::{le16, le32, utf16_lossy},
};
use alloc::{string::String, vec::Vec};
use thiserror::Error;

/// The boot manager may try this option.
pub const LOAD_OPTION_ACTIVE: u32 = 0x0000_0001;

const HEADER_LEN: usize = 6;
const PATH_LEN_OFFSET: usize = 4;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformation {
    #[error("got {0} bytes, expected at least {HEADER_LEN} bytes")]
    TooSmall(usize),
    #[error("description is not NUL-terminated")]
    UnterminatedDescription,
    #[error("device path length {declared} exceeds the {available} bytes left")]
    DevicePathOverflow { declared: usize, available: usize },
    #[error("device path is empty")]
    EmptyDevicePath,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed load option: {0}")]
    Malformed(#[from] Malformation),
}

/// A parsed load option.
///
/// The raw buffer is kept as is. Mutation only happens in place through
/// [`LoadOption::hard_drive_media_mut`], so the length never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOption {
    data: Vec<u8>,
    path_start: usize,
    path_end: usize,
}

impl LoadOption {
    pub fn parse(data: Vec<u8>) -> Result<Self, ParseError> {
        if data.len() < HEADER_LEN {
            return Err(Malformation::TooSmall(data.len()).into());
        }

        let path_len = le16(&data, PATH_LEN_OFFSET) as usize;

        let description_len = data[HEADER_LEN..]
            .chunks_exact(2)
            .position(|x| x == b"\0\0")
            .ok_or(Malformation::UnterminatedDescription)?
            * 2;
        let path_start = HEADER_LEN + description_len + 2;

        let available = data.len() - path_start;
        if path_len > available {
            return Err(Malformation::DevicePathOverflow {
                declared: path_len,
                available,
            }
            .into());
        }
        if path_len == 0 {
            return Err(Malformation::EmptyDevicePath.into());
        }

        Ok(LoadOption {
            data,
            path_start,
            path_end: path_start + path_len,
        })
    }

    pub fn attributes(&self) -> u32 {
        le32(&self.data, 0)
    }

    pub fn is_active(&self) -> bool {
        self.attributes() & LOAD_OPTION_ACTIVE != 0
    }

    /// Raw UTF-16LE description, without the terminator.
    pub fn description_utf16(&self) -> &[u8] {
        &self.data[HEADER_LEN..self.path_start - 2]
    }

    /// Description for display; invalid UTF-16 is replaced.
    pub fn description(&self) -> String {
        utf16_lossy(self.description_utf16())
    }

    pub fn device_path(&self) -> &[u8] {
        &self.data[self.path_start..self.path_end]
    }

    pub fn optional_data(&self) -> &[u8] {
        &self.data[self.path_end..]
    }

    pub fn hard_drive_media(&self) -> Result<Option<HardDriveMedia>, WalkError> {
        Ok(locate_hard_drive_media(self.device_path())?.map(|(_, hd)| hd))
    }

    /// Gives exclusive access to the Hard Drive Media node, if there is one.
    pub fn hard_drive_media_mut(&mut self) -> Result<Option<HardDriveMediaMut<'_>>, WalkError> {
        let Some((offset, hd)) = locate_hard_drive_media(self.device_path())? else {
            return Ok(None);
        };
        let start = self.path_start + offset;
        let bytes = &mut self.data[start..start + HARD_DRIVE_NODE_LEN];
        Ok(Some(HardDriveMediaMut::new(hd, bytes)))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole variable contents, as they must be written back.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        device_path::{
            tests::{file_path_node, gpt_path, hard_drive_node, END_NODE},
            PartitionFormat, SignatureType,
        },
        partition::{MutationError, PartitionUuid},
    };
    use alloc::vec;

    /// Offset of the signature in [`endless_option`], as in efivarfs minus the attribute word.
    pub(crate) const SIGNATURE_AT: usize = 52;

    pub(crate) fn load_option(
        attributes: u32,
        description: &str,
        path: &[u8],
        optional: &[u8],
    ) -> Vec<u8> {
        let mut data = attributes.to_le_bytes().to_vec();
        data.extend_from_slice(&(path.len() as u16).to_le_bytes());
        data.extend(description.encode_utf16().flat_map(|x| x.to_le_bytes()));
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(path);
        data.extend_from_slice(optional);
        data
    }

    pub(crate) fn endless_option(signature: [u8; 16]) -> Vec<u8> {
        load_option(LOAD_OPTION_ACTIVE, "Endless OS", &gpt_path(signature), &[])
    }

    #[test]
    fn parse_fields() {
        let path = gpt_path([0x11; 16]);
        let data = load_option(LOAD_OPTION_ACTIVE, "Endless OS", &path, b"opt");
        let option = LoadOption::parse(data.clone()).unwrap();
        assert_eq!(option.attributes(), LOAD_OPTION_ACTIVE);
        assert!(option.is_active());
        assert_eq!(option.description(), "Endless OS");
        assert_eq!(option.description_utf16().len(), 20);
        assert_eq!(option.device_path(), &path[..]);
        assert_eq!(option.optional_data(), b"opt");
        assert_eq!(option.len(), data.len());
    }

    #[test]
    fn inactive_option() {
        let option = LoadOption::parse(load_option(0, "x", &END_NODE, &[])).unwrap();
        assert!(!option.is_active());
        assert_eq!(option.hard_drive_media(), Ok(None));
    }

    #[test]
    fn empty_description() {
        let option = LoadOption::parse(load_option(1, "", &END_NODE, &[])).unwrap();
        assert_eq!(option.description(), "");
        assert_eq!(option.device_path(), &END_NODE[..]);
    }

    #[test]
    fn round_trip_is_identity() {
        for data in [
            endless_option([0x11; 16]),
            load_option(0x109, "Windows Boot Manager", &gpt_path([0x44; 16]), &[1, 2, 3, 4, 5]),
            load_option(1, "UEFI Shell", &file_path_node("\\shell.efi"), &[]),
        ] {
            let option = LoadOption::parse(data.clone()).unwrap();
            assert_eq!(option.as_bytes(), &data[..]);
            assert_eq!(option.into_bytes(), data);
        }
    }

    #[test]
    fn too_small() {
        assert_eq!(
            LoadOption::parse(vec![1, 0, 0, 0, 4]),
            Err(ParseError::Malformed(Malformation::TooSmall(5)))
        );
    }

    #[test]
    fn unterminated_description() {
        let mut data = vec![1, 0, 0, 0, 4, 0];
        data.extend("Endless".encode_utf16().flat_map(|x| x.to_le_bytes()));
        assert_eq!(
            LoadOption::parse(data),
            Err(ParseError::Malformed(Malformation::UnterminatedDescription))
        );
    }

    #[test]
    fn odd_trailing_byte_is_not_a_terminator() {
        let data = vec![1, 0, 0, 0, 4, 0, b'a', 0, 0];
        assert_eq!(
            LoadOption::parse(data),
            Err(ParseError::Malformed(Malformation::UnterminatedDescription))
        );
    }

    #[test]
    fn device_path_overflow() {
        let declared = gpt_path([0x11; 16]).len();
        let mut data = endless_option([0x11; 16]);
        data.truncate(data.len() - 10);
        assert_eq!(
            LoadOption::parse(data),
            Err(ParseError::Malformed(Malformation::DevicePathOverflow {
                declared,
                available: declared - 10,
            }))
        );
    }

    #[test]
    fn empty_device_path() {
        let data = load_option(1, "x", &[], &[]);
        assert_eq!(
            LoadOption::parse(data),
            Err(ParseError::Malformed(Malformation::EmptyDevicePath))
        );
    }

    #[test]
    fn truncated_node_inside_declared_path() {
        // The declared length fits, but the first node claims more than the path holds.
        let mut path = hard_drive_node(0x02, 0x02, [0x11; 16]);
        path[2] = 0x80;
        let option = LoadOption::parse(load_option(1, "x", &path, &[0; 100])).unwrap();
        assert!(matches!(
            option.hard_drive_media(),
            Err(WalkError::Truncated { offset: 0, .. })
        ));
    }

    #[test]
    fn signature_offset() {
        let data = endless_option([0x11; 16]);
        assert_eq!(data[SIGNATURE_AT..SIGNATURE_AT + 16], [0x11; 16]);
        assert_eq!(data[SIGNATURE_AT + 16], 0x02);
    }

    #[test]
    fn rewrite_changes_only_signature() {
        let data = load_option(1, "Endless OS", &gpt_path([0x11; 16]), b"trailing");
        let mut option = LoadOption::parse(data.clone()).unwrap();
        let new = PartitionUuid::from_bytes([0x22; 16]);

        option
            .hard_drive_media_mut()
            .unwrap()
            .unwrap()
            .rewrite(&new)
            .unwrap();

        let out = option.as_bytes();
        assert_eq!(out.len(), data.len());
        assert_eq!(out[..SIGNATURE_AT], data[..SIGNATURE_AT]);
        assert_eq!(out[SIGNATURE_AT..SIGNATURE_AT + 16], [0x22; 16]);
        assert_eq!(out[SIGNATURE_AT + 16..], data[SIGNATURE_AT + 16..]);
        assert_eq!(option.optional_data(), b"trailing");
        assert_eq!(option.hard_drive_media().unwrap().unwrap().signature, [0x22; 16]);
    }

    #[test]
    fn rewrite_with_same_uuid_is_idempotent() {
        let data = endless_option([0x11; 16]);
        let mut option = LoadOption::parse(data.clone()).unwrap();
        let same = PartitionUuid::from_bytes([0x11; 16]);
        for _ in 0..2 {
            let mut hd = option.hard_drive_media_mut().unwrap().unwrap();
            assert!(hd.matches(&same));
            hd.rewrite(&same).unwrap();
            assert_eq!(option.as_bytes(), &data[..]);
        }
    }

    #[test]
    fn rewrite_of_mbr_option_fails() {
        let mut path = hard_drive_node(0x01, 0x01, [0xaa; 16]);
        path.extend_from_slice(&END_NODE);
        let data = load_option(1, "Legacy", &path, &[]);
        let mut option = LoadOption::parse(data.clone()).unwrap();
        let mut hd = option.hard_drive_media_mut().unwrap().unwrap();
        assert_eq!(hd.node().partition_format, PartitionFormat::PcAt);
        assert_eq!(
            hd.rewrite(&PartitionUuid::from_bytes([0x22; 16])),
            Err(MutationError::UnsupportedNode {
                partition_format: PartitionFormat::PcAt,
                signature_type: SignatureType::Mbr,
            })
        );
        assert_eq!(option.as_bytes(), &data[..]);
    }
}
