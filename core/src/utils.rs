pub fn strbool(value: &str) -> bool {
    ["true", "True", "t", "T", "1"].contains(&value)
}

/// Byte range of the last maximal run of ASCII digits in `value`
pub fn last_digit_run(value: &str) -> Option<(usize, usize)> {
    let bytes = value.as_bytes();
    let end = bytes.iter().rposition(|byte| byte.is_ascii_digit())? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|byte| !byte.is_ascii_digit())
        .map(|position| position + 1)
        .unwrap_or(0);
    Some((start, end))
}
