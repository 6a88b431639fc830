// Utility helpers for the dirty parts of the input: numbers typed with either
// thousands convention, CSV exports, and console formatting.
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

// "1.200,50": comma followed by one or two trailing digits.
static TRAILING_DECIMAL_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\d{1,2}$").expect("valid regex"));
// "1,200.50": dot followed by one or two trailing digits.
static TRAILING_DECIMAL_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\d{1,2}$").expect("valid regex"));

/// Parse a free-form number, returning `None` when nothing numeric is found.
///
/// Three conventions are accepted:
/// - `1.200,50`: dot groups thousands, comma is the decimal point,
/// - `1,200.50`: comma groups thousands, dot is the decimal point,
/// - `1200.5`: plain decimal.
///
/// Anything outside `[0-9.-]` is dropped before the final parse, so a value
/// like `"1,5"` with no dot reads as `15`.
pub fn parse_number_checked(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }

    let normalized = if TRAILING_DECIMAL_COMMA.is_match(s) && s.contains('.') {
        s.replace('.', "").replace(',', ".")
    } else if TRAILING_DECIMAL_DOT.is_match(s) && s.contains(',') {
        s.replace(',', "")
    } else {
        s.to_string()
    };

    let cleaned: String = normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    leading_float(&cleaned)
}

/// Same as [`parse_number_checked`] but unparsable input reads as `0`.
pub fn parse_number(s: Option<&str>) -> f64 {
    parse_number_checked(s).unwrap_or(0.0)
}

/// Numbers from the document store may arrive as JSON numbers or as strings.
pub fn number_from_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_number_checked(Some(s)),
        _ => None,
    }
}

// Longest numeric prefix, so "1.2.3" reads as 1.2 instead of failing outright.
fn leading_float(s: &str) -> Option<f64> {
    (1..=s.len())
        .rev()
        .find_map(|end| s[..end].parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

/// Split a CSV export into rows of trimmed cells.
///
/// Works line by line, so a stray quote only damages its own row. A `"`
/// toggles quoted mode and is dropped; commas inside quotes stay in the cell.
/// `""` is not an escape. The header row is kept as `rows[0]`, blank lines are
/// skipped and short rows are returned as-is; callers read missing cells as
/// empty.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_csv_line)
        .collect()
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cur)),
            _ => cur.push(ch),
        }
    }
    cells.push(cur);
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

/// Cell lookup that treats a missing position as an empty string.
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus `1,234,567.89`-style grouping on the integer part.
    let s = format!("{:.*}", decimals, n.abs());
    // Values that round to zero print unsigned.
    let neg = n < 0.0 && s.bytes().any(|b| (b'1'..=b'9').contains(&b));
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s.as_str(), None),
    };
    let mut res = match int_part.parse::<u128>() {
        Ok(v) => v.to_formatted_string(&Locale::en),
        Err(_) => int_part.to_string(),
    };
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dot_thousands_comma_decimal() {
        assert_eq!(parse_number(Some("1.200,50")), 1200.5);
        assert_eq!(parse_number(Some("12.345.678,9")), 12345678.9);
    }

    #[test]
    fn parses_comma_thousands_dot_decimal() {
        assert_eq!(parse_number(Some("1,200.50")), 1200.5);
        assert_eq!(parse_number(Some("3,000,000.25")), 3000000.25);
    }

    #[test]
    fn parses_plain_and_noisy_values() {
        assert_eq!(parse_number(Some("1200.5")), 1200.5);
        assert_eq!(parse_number(Some(" 750 ")), 750.0);
        assert_eq!(parse_number(Some("Rp 1.200,50")), 1200.5);
        assert_eq!(parse_number(Some("-42")), -42.0);
        assert_eq!(parse_number(Some("1.2.3")), 1.2);
    }

    #[test]
    fn bad_input_reads_as_zero() {
        assert_eq!(parse_number(Some("")), 0.0);
        assert_eq!(parse_number(None), 0.0);
        assert_eq!(parse_number(Some("n/a")), 0.0);
        assert_eq!(parse_number(Some("-")), 0.0);
        assert_eq!(parse_number_checked(Some("abc")), None);
        assert_eq!(parse_number_checked(Some("0")), Some(0.0));
    }

    #[test]
    fn reparsing_own_output_is_stable() {
        for raw in ["1.200,50", "1,200.50", "0,25", "987654.321", "-3"] {
            let once = parse_number(Some(raw));
            let twice = parse_number(Some(&once.to_string()));
            assert_eq!(once, twice, "{raw}");
        }
    }

    #[test]
    fn json_numbers_and_strings() {
        assert_eq!(number_from_value(&serde_json::json!(12.5)), Some(12.5));
        assert_eq!(number_from_value(&serde_json::json!("1.000,5")), Some(1000.5));
        assert_eq!(number_from_value(&Value::Null), None);
    }

    #[test]
    fn csv_respects_quotes_and_skips_blank_lines() {
        let text = "a,b,c\r\n\r\n1,\"1.200,50\",x\n   \nshort\n";
        let rows = parse_csv(text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["a", "b", "c"]);
        assert_eq!(rows[1], vec!["1", "1.200,50", "x"]);
        assert_eq!(rows[2], vec!["short"]);
        assert_eq!(cell(&rows[2], 4), "");
    }

    #[test]
    fn csv_quote_damage_stays_in_one_row() {
        let rows = parse_csv("h1,h2\n\"open,never closed\nnext,row\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["open,never closed"]);
        assert_eq!(rows[2], vec!["next", "row"]);
    }

    #[test]
    fn csv_strips_mid_field_quotes() {
        let rows = parse_csv("h\na\"b,c\"d,e\n");
        assert_eq!(rows[1], vec!["ab,cd", "e"]);
        let rows = parse_csv("h\n\"say \"\"hi\"\"\",x\n");
        assert_eq!(rows[1], vec!["say hi", "x"]);
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-400.0, 2), "-400.00");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_int(9855), "9,855");
    }

    #[test]
    fn format_number_edges() {
        assert_eq!(format_number(-0.004, 2), "0.00");
        assert_eq!(format_number(-0.006, 2), "-0.01");
        assert_eq!(format_number(1e20, 0), "100,000,000,000,000,000,000");
    }
}
