//! Parsing and in place rewriting of UEFI load options.
//!
//! A `BootXXXX` variable holds an `EFI_LOAD_OPTION`, whose device path usually starts with a
//! Hard Drive Media node identifying the boot partition. This crate finds that node and, for
//! GPT partitions identified by GUID, rewrites the partition GUID without changing the length
//! of the variable.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod device_path;
pub mod diagnostics;
pub mod load_option;
pub mod partition;
pub mod util;
pub mod variable;

pub use device_path::{
    find_hard_drive_media, DevicePathNode, HardDriveMedia, PartitionFormat, SignatureType,
    WalkError,
};
pub use load_option::{LoadOption, Malformation, ParseError, LOAD_OPTION_ACTIVE};
pub use partition::{matches, HardDriveMediaMut, InvalidUuid, MutationError, PartitionUuid};
pub use uuid::Uuid;
pub use variable::{boot_option_number, is_load_option, EFI_GLOBAL_VARIABLE};
