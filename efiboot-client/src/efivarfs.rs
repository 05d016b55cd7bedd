//! Variable store backed by efivarfs.
//!
//! Every variable is a file named `<name>-<vendor guid>`, whose contents are the 4 byte
//! attributes followed by the variable data.

use crate::store::{Variable, VariableName, VariableStore};
use anyhow::{ensure, Context, Result};
use efiboot_shared::Uuid;
use std::{
    fs::{self, File, OpenOptions, ReadDir},
    io::{self, Write},
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    path::{Path, PathBuf},
};

pub const EFIVARS_DIR: &str = "/sys/firmware/efi/efivars";

/// Length of `-<vendor guid>` at the end of a file name.
const VENDOR_SUFFIX_LEN: usize = 37;
const ATTRIBUTES_LEN: usize = 4;
const FS_IMMUTABLE_FL: libc::c_int = 0x10;

pub struct Efivarfs {
    dir: PathBuf,
    entries: ReadDir,
}

/// Splits an efivarfs file name into variable name and vendor.
fn parse_file_name(file_name: &str) -> Option<VariableName> {
    let split = file_name.len().checked_sub(VENDOR_SUFFIX_LEN)?;
    if split == 0 || !file_name.is_char_boundary(split) {
        return None;
    }
    let (name, vendor) = file_name.split_at(split);
    let vendor = Uuid::parse_str(vendor.strip_prefix('-')?).ok()?;
    Some(VariableName {
        vendor,
        name: name.to_owned(),
    })
}

fn get_flags(file: &File) -> io::Result<libc::c_int> {
    let mut flags: libc::c_int = 0;
    let r = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            libc::FS_IOC_GETFLAGS,
            &mut flags as *mut libc::c_int,
        )
    };
    if r < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

fn set_flags(file: &File, flags: libc::c_int) -> io::Result<()> {
    let r = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            libc::FS_IOC_SETFLAGS,
            &flags as *const libc::c_int,
        )
    };
    if r < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Clears the immutable flag efivarfs puts on most variables.
///
/// Returns the file and its original flags if they have to be restored.
fn make_mutable(path: &Path) -> Result<Option<(File, libc::c_int)>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };
    let flags = match get_flags(&file) {
        Ok(flags) => flags,
        Err(e) => {
            log::debug!("No inode flags on {}: {e}", path.display());
            return Ok(None);
        }
    };
    if flags & FS_IMMUTABLE_FL == 0 {
        return Ok(None);
    }
    log::debug!("Clearing immutable flag on {}", path.display());
    set_flags(&file, flags & !FS_IMMUTABLE_FL)
        .with_context(|| format!("clear immutable flag on {}", path.display()))?;
    Ok(Some((file, flags)))
}

impl Efivarfs {
    /// Starts listing the variables in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("list variables in {}", dir.display()))?;
        Ok(Efivarfs { dir, entries })
    }

    fn path(&self, var: &VariableName) -> PathBuf {
        self.dir.join(var.to_string())
    }
}

impl VariableStore for Efivarfs {
    fn next_variable(&mut self) -> Result<Option<VariableName>> {
        for entry in self.entries.by_ref() {
            let entry = entry.with_context(|| format!("list variables in {}", self.dir.display()))?;
            let file_name = entry.file_name();
            match file_name.to_str().and_then(parse_file_name) {
                Some(var) => return Ok(Some(var)),
                None => log::info!("{} is not an EFI variable", entry.path().display()),
            }
        }
        Ok(None)
    }

    fn read(&mut self, var: &VariableName) -> Result<Variable> {
        let path = self.path(var);
        let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        ensure!(
            raw.len() >= ATTRIBUTES_LEN,
            "{} is too short: {} bytes",
            path.display(),
            raw.len()
        );
        let (attributes, data) = raw.split_at(ATTRIBUTES_LEN);
        log::debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(Variable {
            attributes: u32::from_le_bytes(attributes.try_into()?),
            data: data.to_vec(),
        })
    }

    fn write(&mut self, var: &VariableName, data: &[u8], attributes: u32, mode: u32) -> Result<()> {
        let path = self.path(var);

        let buf = attributes
            .to_le_bytes()
            .into_iter()
            .chain(data.iter().copied())
            .collect::<Vec<_>>();

        let restore = make_mutable(&path)?;

        // efivarfs needs the whole variable in a single write.
        let written = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(mode)
            .open(&path)
            .and_then(|mut file| file.write(&buf));

        if let Some((file, flags)) = restore {
            if let Err(e) = set_flags(&file, flags) {
                log::warn!("Could not restore flags on {}: {e}", path.display());
            }
        }

        let written = written.with_context(|| format!("write {}", path.display()))?;
        ensure!(
            written == buf.len(),
            "short write to {}: {written} of {} bytes",
            path.display(),
            buf.len()
        );
        log::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}
