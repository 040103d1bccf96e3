//! `upsc` output parser.
//! Converts `key: value` lines into a variable map.

use std::collections::HashMap;

/// Parse upsc output into a variable map.
/// Input:  "battery.charge: 100\nups.status: OL CHRG\n..."
/// Lines without a ':' are ignored; only the first ':' splits key from value.
pub fn parse_upsc_vars(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines() {
        let out = "battery.charge: 87\n\
                   battery.runtime: 1260\n\
                   ups.status: OB DISCHRG\n\
                   Init SSL without certificate database\n\
                   driver.parameter.pollinterval: 2\n";
        let vars = parse_upsc_vars(out);
        assert_eq!(vars.get("battery.charge").map(String::as_str), Some("87"));
        assert_eq!(vars.get("ups.status").map(String::as_str), Some("OB DISCHRG"));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn splits_on_first_colon_only() {
        let vars = parse_upsc_vars("ups.time: 12:30:05\n");
        assert_eq!(vars.get("ups.time").map(String::as_str), Some("12:30:05"));
    }

    #[test]
    fn empty_output_gives_empty_map() {
        assert!(parse_upsc_vars("").is_empty());
    }
}
