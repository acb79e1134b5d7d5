/// Format an integer rupiah amount with Indonesian dot grouping: Rp 1.234.567
pub fn rupiah(val: i64) -> String {
    let negative = val < 0;
    let digits = val.unsigned_abs().to_string();

    let mut grouped = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

/// Short date for chat/report surfaces: `05 Aug '25`.
pub fn short_date(iso: &str) -> String {
    match chrono::NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        Ok(d) => d.format("%d %b '%y").to_string(),
        Err(_) => iso.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rupiah_formatting() {
        assert_eq!(rupiah(35000), "Rp 35.000");
        assert_eq!(rupiah(1234567), "Rp 1.234.567");
        assert_eq!(rupiah(0), "Rp 0");
        assert_eq!(rupiah(-500000), "-Rp 500.000");
        assert_eq!(rupiah(999), "Rp 999");
    }

    #[test]
    fn test_short_date() {
        assert_eq!(short_date("2025-08-05"), "05 Aug '25");
        assert_eq!(short_date("not-a-date"), "not-a-date");
    }
}
