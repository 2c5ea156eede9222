use crate::error::IssueCode;

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One structured stderr line per skipped record. Per-record data problems
/// never abort the batch; they surface here and in the report summary.
pub fn emit(code: IssueCode, sheet: &str, key: &str, handle: &str, reason: &str) {
    eprintln!(
        "ARCHIVER_WARN code={} sheet={} key={} handle={} reason={}",
        sanitize_value(code.as_str()),
        sanitize_value(sheet),
        sanitize_value(key),
        sanitize_value(handle),
        sanitize_value(reason),
    );
}

#[cfg(test)]
mod tests {
    use super::sanitize_value;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }
}
