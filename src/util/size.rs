//! Size and alignment helpers for device memory arithmetic.

/// Convert kilobytes to bytes.
#[inline]
pub const fn kb(n: u64) -> u64 {
    n * 1024
}

/// Convert megabytes to bytes.
#[inline]
pub const fn mb(n: u64) -> u64 {
    n * 1024 * 1024
}

/// Convert gigabytes to bytes.
#[inline]
pub const fn gb(n: u64) -> u64 {
    n * 1024 * 1024 * 1024
}

/// Round `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. An alignment of 0 is treated as 1.
#[inline]
pub const fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    (value + align - 1) & !(align - 1)
}

/// Check whether `value` is a multiple of `align` (power of two).
#[inline]
pub const fn is_aligned(value: u64, align: u64) -> bool {
    align <= 1 || value & (align - 1) == 0
}

/// Format bytes as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_conversions() {
        assert_eq!(kb(1), 1024);
        assert_eq!(mb(64), 64 * 1024 * 1024);
        assert_eq!(gb(1), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1000, 256), 1024);
        assert_eq!(align_up(2048, 256), 2048);
        assert_eq!(align_up(1800, 256), 2048);
        assert_eq!(align_up(17, 0), 17);
        assert_eq!(align_up(17, 1), 17);
    }

    #[test]
    fn test_is_aligned() {
        assert!(is_aligned(0, 4096));
        assert!(is_aligned(8192, 4096));
        assert!(!is_aligned(4100, 4096));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(kb(1)), "1.00 KB");
        assert_eq!(format_bytes(mb(64)), "64.00 MB");
        assert_eq!(format_bytes(gb(1)), "1.00 GB");
    }
}
