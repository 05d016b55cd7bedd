//! Walking the device path embedded in a load option.
//!
//! A device path is a packed sequence of nodes. Each node starts with a 4 byte header:
//! - type, 1 byte;
//! - subtype, 1 byte;
//! - length of the whole node including the header, 2 bytes little endian.
//!
//! The sequence ends with an End Entire node (`0x7f`/`0xff`), or when the region is exhausted.

use crate::util::{le16, le32, le64};
use thiserror::Error;

pub const MEDIA_DEVICE_PATH: u8 = 0x04;
pub const MEDIA_HARD_DRIVE: u8 = 0x01;
pub const MEDIA_FILE_PATH: u8 = 0x04;

pub const END_DEVICE_PATH: u8 = 0x7f;
pub const END_INSTANCE: u8 = 0x01;
pub const END_ENTIRE: u8 = 0xff;

pub const NODE_HEADER_LEN: usize = 4;
/// Fixed size of a Hard Drive Media node.
pub const HARD_DRIVE_NODE_LEN: usize = 42;

const PARTITION_NUMBER_OFFSET: usize = 4;
const PARTITION_START_OFFSET: usize = 8;
const PARTITION_SIZE_OFFSET: usize = 16;
pub(crate) const SIGNATURE_OFFSET: usize = 24;
pub(crate) const SIGNATURE_LEN: usize = 16;
const PARTITION_FORMAT_OFFSET: usize = 40;
const SIGNATURE_TYPE_OFFSET: usize = 41;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkError {
    #[error("Device path node at offset {offset} is truncated; needs {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Device path node {type_code:#04x}/{subtype_code:#04x} at offset {offset} has invalid length {len}")]
    InvalidLength {
        offset: usize,
        type_code: u8,
        subtype_code: u8,
        len: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFormat {
    /// Legacy MBR partition table.
    PcAt,
    Gpt,
    Unknown(u8),
}

impl From<u8> for PartitionFormat {
    fn from(value: u8) -> Self {
        match value {
            0x01 => PartitionFormat::PcAt,
            0x02 => PartitionFormat::Gpt,
            x => PartitionFormat::Unknown(x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    None,
    /// 32 bit MBR disk signature, stored in the first 4 bytes of the signature field.
    Mbr,
    /// GPT unique partition GUID.
    Guid,
    Unknown(u8),
}

impl From<u8> for SignatureType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => SignatureType::None,
            0x01 => SignatureType::Mbr,
            0x02 => SignatureType::Guid,
            x => SignatureType::Unknown(x),
        }
    }
}

/// Decoded contents of a Hard Drive Media node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardDriveMedia {
    pub partition_number: u32,
    /// Starting LBA of the partition.
    pub partition_start: u64,
    /// Size of the partition in logical blocks.
    pub partition_size: u64,
    /// Signature bytes as stored by the firmware.
    pub signature: [u8; 16],
    pub signature_type: SignatureType,
    pub partition_format: PartitionFormat,
}

impl HardDriveMedia {
    /// `node` must be a whole node of exactly [`HARD_DRIVE_NODE_LEN`] bytes.
    fn decode(node: &[u8]) -> Self {
        let mut signature = [0; SIGNATURE_LEN];
        signature.copy_from_slice(&node[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN]);
        HardDriveMedia {
            partition_number: le32(node, PARTITION_NUMBER_OFFSET),
            partition_start: le64(node, PARTITION_START_OFFSET),
            partition_size: le64(node, PARTITION_SIZE_OFFSET),
            signature,
            partition_format: node[PARTITION_FORMAT_OFFSET].into(),
            signature_type: node[SIGNATURE_TYPE_OFFSET].into(),
        }
    }
}

/// One node of a device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePathNode<'a> {
    HardDriveMedia(HardDriveMedia),
    /// End of Hardware Device Path, End Entire.
    End,
    /// Any other node; `raw_bytes` is the whole node, header included.
    Other {
        type_code: u8,
        subtype_code: u8,
        raw_bytes: &'a [u8],
    },
}

/// Iterator over the nodes of a device path, yielding each node together with its offset.
///
/// Iteration stops after the End Entire node, when the region is exhausted, or after the first
/// error.
pub struct Nodes<'a> {
    path: &'a [u8],
    offset: usize,
    done: bool,
}

pub fn nodes(path: &[u8]) -> Nodes<'_> {
    Nodes {
        path,
        offset: 0,
        done: false,
    }
}

impl<'a> Nodes<'a> {
    fn next_node(&mut self) -> Result<(usize, DevicePathNode<'a>), WalkError> {
        let offset = self.offset;
        let available = self.path.len() - offset;
        if available < NODE_HEADER_LEN {
            return Err(WalkError::Truncated {
                offset,
                needed: NODE_HEADER_LEN,
                available,
            });
        }

        let type_code = self.path[offset];
        let subtype_code = self.path[offset + 1];
        let len = le16(self.path, offset + 2);
        let invalid_length = WalkError::InvalidLength {
            offset,
            type_code,
            subtype_code,
            len,
        };
        if (len as usize) < NODE_HEADER_LEN {
            return Err(invalid_length);
        }
        if len as usize > available {
            return Err(WalkError::Truncated {
                offset,
                needed: len as usize,
                available,
            });
        }

        let raw_bytes = &self.path[offset..offset + len as usize];
        self.offset += len as usize;

        let node = match (type_code, subtype_code) {
            (MEDIA_DEVICE_PATH, MEDIA_HARD_DRIVE) => {
                if raw_bytes.len() != HARD_DRIVE_NODE_LEN {
                    return Err(invalid_length);
                }
                DevicePathNode::HardDriveMedia(HardDriveMedia::decode(raw_bytes))
            }
            (END_DEVICE_PATH, END_ENTIRE) => {
                self.done = true;
                DevicePathNode::End
            }
            _ => DevicePathNode::Other {
                type_code,
                subtype_code,
                raw_bytes,
            },
        };
        Ok((offset, node))
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Result<(usize, DevicePathNode<'a>), WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.path.len() {
            return None;
        }
        let node = self.next_node();
        if node.is_err() {
            self.done = true;
        }
        Some(node)
    }
}

/// Finds the first Hard Drive Media node and its offset inside `path`.
///
/// The whole path is walked even after a match: a malformed tail is an error.
pub(crate) fn locate_hard_drive_media(
    path: &[u8],
) -> Result<Option<(usize, HardDriveMedia)>, WalkError> {
    let mut found = None;
    for node in nodes(path) {
        if let (offset, DevicePathNode::HardDriveMedia(hd)) = node? {
            found.get_or_insert((offset, hd));
        }
    }
    Ok(found)
}

/// Returns the Hard Drive Media node of `path`, or `None` if there is none.
pub fn find_hard_drive_media(path: &[u8]) -> Result<Option<HardDriveMedia>, WalkError> {
    Ok(locate_hard_drive_media(path)?.map(|(_, hd)| hd))
}
