//! Human readable views of a load option, for verbose output.

use crate::{
    device_path::{
        nodes, DevicePathNode, HardDriveMedia, PartitionFormat, SignatureType, END_DEVICE_PATH,
        END_INSTANCE, MEDIA_DEVICE_PATH, MEDIA_FILE_PATH, NODE_HEADER_LEN,
    },
    load_option::LoadOption,
    partition::PartitionUuid,
    util::utf16_lossy,
};
use core::fmt::{Display, Formatter, Result};

/// Hex dump with 16 bytes per line and an extra space after the first 8.
pub struct HexDump<'a>(pub &'a [u8]);

impl Display for HexDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for (offset, byte) in self.0.iter().enumerate() {
            let prefix = if offset % 16 == 0 {
                if offset == 0 {
                    ""
                } else {
                    "\n"
                }
            } else if offset % 8 == 0 {
                "  "
            } else {
                " "
            };
            write!(f, "{prefix}{byte:02x}")?;
        }
        writeln!(f)
    }
}

/// Device path in the notation used by efibootmgr, limited to the nodes this crate knows.
pub struct DevicePathFmt<'a>(pub &'a [u8]);

fn fmt_hard_drive(f: &mut Formatter<'_>, hd: &HardDriveMedia) -> Result {
    let HardDriveMedia {
        partition_number: n,
        partition_start: start,
        partition_size: size,
        ..
    } = *hd;
    match (hd.partition_format, hd.signature_type) {
        (PartitionFormat::Gpt, SignatureType::Guid) => {
            let uuid = PartitionUuid::from_bytes(hd.signature);
            write!(f, "HD({n},GPT,{uuid},{start:#x},{size:#x})")
        }
        (PartitionFormat::PcAt, SignatureType::Mbr) => {
            let sig = u32::from_le_bytes([
                hd.signature[0],
                hd.signature[1],
                hd.signature[2],
                hd.signature[3],
            ]);
            write!(f, "HD({n},MBR,{sig:#010x},{start:#x},{size:#x})")
        }
        (format, signature_type) => write!(
            f,
            "HD({n},{format:?},{signature_type:?},{start:#x},{size:#x})"
        ),
    }
}

impl Display for DevicePathFmt<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut separator = "";
        for node in nodes(self.0) {
            let Ok((_, node)) = node else {
                return write!(f, "{separator}<malformed>");
            };
            match node {
                DevicePathNode::End => break,
                DevicePathNode::HardDriveMedia(hd) => {
                    f.write_str(separator)?;
                    fmt_hard_drive(f, &hd)?;
                }
                DevicePathNode::Other {
                    type_code: END_DEVICE_PATH,
                    subtype_code: END_INSTANCE,
                    ..
                } => {
                    f.write_str(",")?;
                    separator = "";
                    continue;
                }
                DevicePathNode::Other {
                    type_code: MEDIA_DEVICE_PATH,
                    subtype_code: MEDIA_FILE_PATH,
                    raw_bytes,
                } => {
                    let path = utf16_lossy(&raw_bytes[NODE_HEADER_LEN..]);
                    write!(f, "{separator}File({path})")?;
                }
                DevicePathNode::Other {
                    type_code,
                    subtype_code,
                    raw_bytes,
                } => {
                    write!(f, "{separator}Path({type_code},{subtype_code}")?;
                    if raw_bytes.len() > NODE_HEADER_LEN {
                        f.write_str(",")?;
                        for byte in &raw_bytes[NODE_HEADER_LEN..] {
                            write!(f, "{byte:02x}")?;
                        }
                    }
                    f.write_str(")")?;
                }
            }
            separator = "/";
        }
        Ok(())
    }
}

/// Single line summary of a load option, similar to efibootmgr.
pub struct Summary<'a> {
    pub name: &'a str,
    pub option: &'a LoadOption,
}

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{}: {}{} {}",
            self.name,
            if self.option.is_active() { "* " } else { "" },
            self.option.description(),
            DevicePathFmt(self.option.device_path())
        )
    }
}

/// Summary line followed by a hex dump of the whole variable.
pub struct Dump<'a> {
    pub name: &'a str,
    pub option: &'a LoadOption,
}

impl Display for Dump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(
            f,
            "{}",
            Summary {
                name: self.name,
                option: self.option
            }
        )?;
        write!(f, "{}", HexDump(self.option.as_bytes()))
    }
}
