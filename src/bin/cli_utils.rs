use anyhow::{Context, Result};

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// `None` keeps the configured value; "auto" and "0" mean all cores
pub fn parse_threads(threads: Option<&str>) -> Result<Option<usize>> {
    match threads {
        None => Ok(None),
        Some("auto") | Some("0") => Ok(Some(0)),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("Invalid thread count '{}', expected a number or 'auto'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
    }

    #[test]
    fn test_parse_threads() {
        assert_eq!(parse_threads(None).unwrap(), None);
        assert_eq!(parse_threads(Some("auto")).unwrap(), Some(0));
        assert_eq!(parse_threads(Some("4")).unwrap(), Some(4));
        assert!(parse_threads(Some("many")).is_err());
    }
}
