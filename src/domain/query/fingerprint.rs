//! Literal substitution of query placeholders

use std::fmt::Write;

use super::statement::QueryParam;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Replaces `?` and `$N` placeholders with literal parameter values
///
/// Placeholders inside quoted sections are left alone, as are placeholders
/// without a matching parameter.
pub(super) fn render_fingerprint(sql: &str, params: &[QueryParam]) -> String {
    let mut rendered = String::with_capacity(sql.len() + params.len() * 8);
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;
    let mut positional = 0;

    while let Some((_, c)) = chars.next() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            rendered.push(c);
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                rendered.push(c);
            }
            '?' => {
                match params.get(positional) {
                    Some(param) => rendered.push_str(&render_literal(param)),
                    None => rendered.push(c),
                }
                positional += 1;
            }
            '$' => {
                let mut digits = String::new();

                while let Some((_, d)) = chars.peek().copied() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }

                let param = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| params.get(index));

                match param {
                    Some(param) => rendered.push_str(&render_literal(param)),
                    None => {
                        rendered.push('$');
                        rendered.push_str(&digits);
                    }
                }
            }
            _ => rendered.push(c),
        }
    }

    rendered
}

fn render_literal(param: &QueryParam) -> String {
    match param {
        QueryParam::Null => "NULL".to_string(),
        QueryParam::Bool(value) => value.to_string(),
        QueryParam::Int(value) => value.to_string(),
        QueryParam::Float(value) => format!("{:?}", value),
        QueryParam::Text(value) => quote(value),
        QueryParam::Timestamp(value) => quote(&value.format(TIMESTAMP_FORMAT).to_string()),
        QueryParam::Bytes(value) => match std::str::from_utf8(value) {
            Ok(text) if !text.chars().any(char::is_control) => quote(text),
            _ => {
                let mut hex = String::with_capacity(value.len() * 2 + 3);
                hex.push_str("0x");
                for byte in value {
                    let _ = write!(hex, "{:02x}", byte);
                }
                quote(&hex)
            }
        },
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_positional_placeholders() {
        let rendered = render_fingerprint(
            "SELECT * FROM users WHERE name = ? AND age > ? LIMIT ?",
            &[
                QueryParam::Text("alice".to_string()),
                QueryParam::Int(30),
                QueryParam::Int(1),
            ],
        );

        assert_eq!(
            rendered,
            r#"SELECT * FROM users WHERE name = "alice" AND age > 30 LIMIT 1"#
        );
    }

    #[test]
    fn test_numbered_placeholders() {
        let rendered = render_fingerprint(
            "SELECT * FROM users WHERE id = $2 OR parent_id = $1 OR id = $2",
            &[QueryParam::Int(7), QueryParam::Int(9)],
        );

        assert_eq!(
            rendered,
            "SELECT * FROM users WHERE id = 9 OR parent_id = 7 OR id = 9"
        );
    }

    #[test]
    fn test_placeholders_inside_literals_are_kept() {
        let rendered = render_fingerprint(
            "SELECT '?' AS mark, \"$1\" FROM t WHERE a = ?",
            &[QueryParam::Bool(false)],
        );

        assert_eq!(rendered, "SELECT '?' AS mark, \"$1\" FROM t WHERE a = false");
    }

    #[test]
    fn test_missing_params_leave_placeholders() {
        let rendered = render_fingerprint("SELECT ? , $3, $", &[QueryParam::Null]);

        assert_eq!(rendered, "SELECT NULL , $3, $");
    }

    #[test]
    fn test_literal_rendering() {
        let timestamp = Utc.with_ymd_and_hms(2022, 7, 2, 8, 9, 52).unwrap();

        assert_eq!(render_literal(&QueryParam::Float(1.5)), "1.5");
        assert_eq!(
            render_literal(&QueryParam::Text("say \"hi\"".to_string())),
            r#""say \"hi\"""#
        );
        assert_eq!(
            render_literal(&QueryParam::Timestamp(timestamp)),
            r#""2022-07-02 08:09:52.000000000""#
        );
        assert_eq!(
            render_literal(&QueryParam::Bytes(b"abc".to_vec())),
            r#""abc""#
        );
        assert_eq!(
            render_literal(&QueryParam::Bytes(vec![0x00, 0xff])),
            r#""0x00ff""#
        );
    }

    #[test]
    fn test_timestamps_keep_sub_millisecond_precision() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(400);
        let sql = "SELECT * FROM events WHERE created_at > ?";

        let first = render_fingerprint(sql, &[QueryParam::Timestamp(earlier)]);
        let second = render_fingerprint(sql, &[QueryParam::Timestamp(later)]);

        assert_ne!(first, second);
        assert_eq!(
            render_literal(&QueryParam::Timestamp(later)),
            r#""2024-01-01 00:00:00.000400000""#
        );
    }

    #[test]
    fn test_float_and_int_render_differently() {
        assert_eq!(render_literal(&QueryParam::Float(1.0)), "1.0");
        assert_eq!(render_literal(&QueryParam::Int(1)), "1");
        assert_ne!(
            render_fingerprint("SELECT ?", &[QueryParam::Float(1.0)]),
            render_fingerprint("SELECT ?", &[QueryParam::Int(1)])
        );
    }
}
