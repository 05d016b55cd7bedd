use uuid::Uuid;

/// `EFI_GLOBAL_VARIABLE`, the vendor of the standard UEFI variables.
pub const EFI_GLOBAL_VARIABLE: Uuid = Uuid::from_u128(0x8be4df61_93ca_11d2_aa0d_00e098032b8c);

/// Returns the option number if `name` is `BootXXXX`, with `XXXX` four hex digits.
pub fn boot_option_number(name: &str) -> Option<u16> {
    let digits = name.strip_prefix("Boot")?;
    if digits.len() != 4 || !digits.bytes().all(|x| x.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

/// Whether the variable `vendor`/`name` holds a load option.
pub fn is_load_option(vendor: &Uuid, name: &str) -> bool {
    *vendor == EFI_GLOBAL_VARIABLE && boot_option_number(name).is_some()
}
