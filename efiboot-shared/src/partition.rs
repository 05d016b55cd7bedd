//! Matching and rewriting the GPT partition signature of a Hard Drive Media node.

use crate::device_path::{
    HardDriveMedia, PartitionFormat, SignatureType, HARD_DRIVE_NODE_LEN, SIGNATURE_LEN,
    SIGNATURE_OFFSET,
};
use alloc::string::{String, ToString};
use core::{fmt::Display, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Length of the canonical hyphenated form, e.g. `9cf7d938-86c5-4f09-8401-fd0d6e4c646c`.
const CANONICAL_LEN: usize = 36;

/// A GPT unique partition GUID.
///
/// The bytes are kept in the firmware's GUID layout, where the first three fields are little
/// endian. This is the layout found in a Hard Drive Media node, not the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionUuid([u8; 16]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid partition UUID \"{0}\"")]
pub struct InvalidUuid(pub String);

impl PartitionUuid {
    /// Wraps bytes that are already in firmware layout.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        PartitionUuid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for PartitionUuid {
    type Err = InvalidUuid;

    fn from_str(s: &str) -> Result<Self, InvalidUuid> {
        if s.len() != CANONICAL_LEN {
            return Err(InvalidUuid(s.to_string()));
        }
        let uuid = Uuid::parse_str(s).map_err(|_| InvalidUuid(s.to_string()))?;
        Ok(PartitionUuid(uuid.to_bytes_le()))
    }
}

impl Display for PartitionUuid {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "{}", Uuid::from_bytes_le(self.0).hyphenated())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationError {
    #[error("Only GPT formatted hard drives with UUID signatures can be updated; got format {partition_format:?} with signature type {signature_type:?}")]
    UnsupportedNode {
        partition_format: PartitionFormat,
        signature_type: SignatureType,
    },
}

impl HardDriveMedia {
    /// Whether the node identifies a GPT partition by its GUID.
    pub fn is_updatable(&self) -> bool {
        self.partition_format == PartitionFormat::Gpt && self.signature_type == SignatureType::Guid
    }

    pub fn partition_uuid(&self) -> Option<PartitionUuid> {
        self.is_updatable()
            .then_some(PartitionUuid::from_bytes(self.signature))
    }
}

/// Whether `node` is updatable and its signature is `target`.
pub fn matches(node: &HardDriveMedia, target: &PartitionUuid) -> bool {
    node.is_updatable() && node.signature == target.0
}

/// Exclusive access to the bytes of a Hard Drive Media node inside a load option.
#[derive(Debug)]
pub struct HardDriveMediaMut<'a> {
    node: HardDriveMedia,
    bytes: &'a mut [u8],
}

impl<'a> HardDriveMediaMut<'a> {
    /// `bytes` must be the whole node `node` was decoded from.
    pub(crate) fn new(node: HardDriveMedia, bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), HARD_DRIVE_NODE_LEN);
        HardDriveMediaMut { node, bytes }
    }

    pub fn node(&self) -> &HardDriveMedia {
        &self.node
    }

    pub fn matches(&self, target: &PartitionUuid) -> bool {
        matches(&self.node, target)
    }

    /// Overwrites the partition signature with `replacement`.
    ///
    /// Only the 16 signature bytes are written. Nodes that are not updatable are rejected and
    /// left untouched.
    pub fn rewrite(&mut self, replacement: &PartitionUuid) -> Result<(), MutationError> {
        if !self.node.is_updatable() {
            return Err(MutationError::UnsupportedNode {
                partition_format: self.node.partition_format,
                signature_type: self.node.signature_type,
            });
        }
        self.bytes[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN]
            .copy_from_slice(&replacement.0);
        self.node.signature = replacement.0;
        Ok(())
    }
}
