//! Rupiah formatting for receipts.
//!
//! All amounts in the system are whole currency units (no decimals), stored
//! as signed 64-bit integers.

/// Format an amount as `Rp {grouped}` with `.` as the thousands separator.
///
/// ```
/// assert_eq!(warung_pos::money::rupiah(40000), "Rp 40.000");
/// ```
pub fn rupiah(amount: i64) -> String {
    format!("Rp {}", grouped(amount))
}

/// Digit-group an integer with `.` separators (Indonesian convention).
pub fn grouped(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    let first = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - first) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_amount_ungrouped() {
        assert_eq!(rupiah(0), "Rp 0");
        assert_eq!(rupiah(999), "Rp 999");
    }

    #[test]
    fn test_thousands_grouping() {
        assert_eq!(rupiah(1000), "Rp 1.000");
        assert_eq!(rupiah(20000), "Rp 20.000");
        assert_eq!(rupiah(40000), "Rp 40.000");
        assert_eq!(rupiah(123456), "Rp 123.456");
    }

    #[test]
    fn test_millions_grouping() {
        assert_eq!(rupiah(1234567), "Rp 1.234.567");
        assert_eq!(rupiah(1000000000), "Rp 1.000.000.000");
    }

    #[test]
    fn test_negative_amount() {
        // Should not occur on receipts, but must not panic or misgroup
        assert_eq!(rupiah(-10500), "Rp -10.500");
    }
}
