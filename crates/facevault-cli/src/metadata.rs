//! `--meta KEY=VALUE` parsing.

use facevault_core::Metadata;
use serde_json::Value;

/// Parse one `KEY=VALUE` pair. The value is read as JSON when it parses
/// (`30`, `true`, `[1,2]`), otherwise kept as a plain string.
pub fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }

    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Collect parsed pairs into metadata; `None` when no pairs were given.
/// Later duplicates replace earlier ones.
pub fn collect(pairs: Vec<(String, Value)>) -> Option<Metadata> {
    if pairs.is_empty() {
        return None;
    }
    Some(pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_and_strings() {
        assert_eq!(parse_pair("age=30").unwrap(), ("age".into(), json!(30)));
        assert_eq!(
            parse_pair("department=Engineering").unwrap(),
            ("department".into(), json!("Engineering"))
        );
        assert_eq!(parse_pair("active=true").unwrap(), ("active".into(), json!(true)));
    }

    #[test]
    fn test_value_may_contain_equals() {
        assert_eq!(
            parse_pair("note=a=b").unwrap(),
            ("note".into(), json!("a=b"))
        );
    }

    #[test]
    fn test_malformed_pairs() {
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=30").is_err());
    }

    #[test]
    fn test_collect() {
        assert!(collect(vec![]).is_none());

        let meta = collect(vec![("k".into(), json!(1)), ("k".into(), json!(2))]).unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta["k"], json!(2));
    }
}
