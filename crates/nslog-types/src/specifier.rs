//! printf-style specifier scanning and substitution.
//!
//! A specifier is a `%` immediately followed by one character of
//! [`SPECIFIERS`]. There is no escape sequence: `%%s` contains one specifier,
//! starting at the second `%`.

use crate::value::Value;

/// Recognized specifier characters
pub const SPECIFIERS: &[char] = &['s', 'd', 'i', 'f', 'j', 'o', 'O', 'c'];

/// Count specifiers in `message`, scanning left to right without overlap
pub fn count_specifiers(message: &str) -> usize {
    let mut count = 0;
    let mut chars = message.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' && chars.peek().is_some_and(|n| SPECIFIERS.contains(n)) {
            chars.next();
            count += 1;
        }
    }

    count
}

/// Substitute `args` into the specifiers of `message`, in order.
///
/// Specifiers left over once `args` is exhausted stay in the output as-is.
pub fn interpolate(message: &str, args: &[Value]) -> String {
    if args.is_empty() {
        return message.to_string();
    }

    let mut out = String::with_capacity(message.len());
    let mut args = args.iter();
    let mut chars = message.chars().peekable();

    while let Some(c) = chars.next() {
        let spec = match chars.peek() {
            Some(&n) if c == '%' && SPECIFIERS.contains(&n) => n,
            _ => {
                out.push(c);
                continue;
            }
        };

        match args.next() {
            Some(arg) => {
                chars.next();
                out.push_str(&substitute(spec, arg));
            }
            None => out.push(c),
        }
    }

    out
}

fn substitute(spec: char, arg: &Value) -> String {
    match spec {
        's' => arg.to_string(),
        'd' => to_number(arg).map_or_else(nan, format_number),
        'i' => to_number(arg).map_or_else(nan, |n| format_number(n.trunc())),
        'f' => to_number(arg).map_or_else(nan, format_number),
        'j' => arg.to_json().to_string(),
        'o' => arg.inspect(false),
        'O' => arg.inspect(true),
        // %c consumes its argument and renders nothing
        _ => String::new(),
    }
}

fn to_number(arg: &Value) -> Option<f64> {
    match arg {
        Value::Json(serde_json::Value::Number(n)) => n.as_f64(),
        Value::Json(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Value::Json(serde_json::Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn nan() -> String {
    "NaN".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorValue;
    use serde_json::json;

    #[test]
    fn test_count_specifiers() {
        assert_eq!(count_specifiers("%s has %d items"), 2);
        assert_eq!(count_specifiers("plain"), 0);
        assert_eq!(count_specifiers(""), 0);
        assert_eq!(count_specifiers("100% done"), 0);
        assert_eq!(count_specifiers("%s%d%i%f%j%o%O%c"), 8);
    }

    #[test]
    fn test_no_percent_escape() {
        assert_eq!(count_specifiers("%%s"), 1);
        assert_eq!(interpolate("%%s", &[Value::from("x")]), "%x");
    }

    #[test]
    fn test_interpolate_basic() {
        let args = [Value::from("cart"), Value::from(3)];
        assert_eq!(interpolate("%s has %d items", &args), "cart has 3 items");
    }

    #[test]
    fn test_interpolate_numeric() {
        assert_eq!(interpolate("%i", &[Value::from(4.7)]), "4");
        assert_eq!(interpolate("%f", &[Value::from("2.5")]), "2.5");
        assert_eq!(interpolate("%d", &[Value::from(json!({}))]), "NaN");
    }

    #[test]
    fn test_interpolate_structured() {
        let obj = Value::from(json!({"a": [1, 2]}));
        assert_eq!(interpolate("%j", &[obj.clone()]), r#"{"a":[1,2]}"#);
        assert_eq!(interpolate("%o", &[obj]), r#"{"a":[1,2]}"#);
        assert_eq!(interpolate("%j", &[Value::from("s")]), "\"s\"");
    }

    #[test]
    fn test_interpolate_css_consumed() {
        assert_eq!(
            interpolate("%cstyled %s", &[Value::from("color: red"), Value::from("x")]),
            "styled x"
        );
    }

    #[test]
    fn test_interpolate_error_as_string() {
        let err = Value::from(ErrorValue::new("Error", "boom"));
        assert_eq!(interpolate("failed: %s", &[err]), "failed: Error: boom");
    }

    #[test]
    fn test_missing_args_left_literal() {
        assert_eq!(interpolate("%s and %s", &[Value::from("a")]), "a and %s");
    }
}
