//! Human-readable file sizes for listings.

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Format a byte count the way the listing UI shows it.
///
/// Gigabytes and megabytes keep one decimal (dropped when it is zero),
/// kilobytes are rounded to a whole number, smaller sizes are shown in bytes.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{} GB", one_decimal(bytes as f64 / GB as f64))
    } else if bytes >= MB {
        format!("{} MB", one_decimal(bytes as f64 / MB as f64))
    } else if bytes >= KB {
        format!("{} KB", (bytes as f64 / KB as f64).round())
    } else {
        format!("{} b", bytes)
    }
}

fn one_decimal(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as u64)
    } else {
        format!("{:.1}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(format_size(0), "0 b");
        assert_eq!(format_size(512), "512 b");
        assert_eq!(format_size(1023), "1023 b");
    }

    #[test]
    fn test_kilobytes_round_to_whole() {
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "2 KB");
        assert_eq!(format_size(1400), "1 KB");
    }

    #[test]
    fn test_megabytes_keep_one_decimal() {
        assert_eq!(format_size(MB), "1 MB");
        assert_eq!(format_size(MB + MB / 2), "1.5 MB");
        assert_eq!(format_size(100 * MB), "100 MB");
    }

    #[test]
    fn test_gigabytes() {
        assert_eq!(format_size(GB), "1 GB");
        assert_eq!(format_size(GB + GB / 10), "1.1 GB");
    }
}
