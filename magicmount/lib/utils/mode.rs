//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Formats the permission bits of `mode` the way `ls -l` does, including set-id and sticky bits.
///
/// ## Examples
///
/// ```
/// use magicmount::utils::format_mode;
///
/// assert_eq!(format_mode(0o755), "rwxr-xr-x");
/// assert_eq!(format_mode(0o4755), "rwsr-xr-x");
/// assert_eq!(format_mode(0o1777), "rwxrwxrwt");
/// assert_eq!(format_mode(0o2640), "rw-r-S---");
/// ```
pub fn format_mode(mode: u32) -> String {
    let special = [(0o4000, 's', 'S'), (0o2000, 's', 'S'), (0o1000, 't', 'T')];
    let mut out = String::with_capacity(9);

    for (class, (bit, set, unset)) in special.iter().enumerate() {
        let bits = (mode >> (6 - class * 3)) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(match (bits & 0o1 != 0, mode & bit != 0) {
            (true, true) => *set,
            (false, true) => *unset,
            (true, false) => 'x',
            (false, false) => '-',
        });
    }

    out
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
