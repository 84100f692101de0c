use crate::constants::*;

pub fn validate_message_content(content: &str) -> Result<(), String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Message content is required".into());
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message content must be at most {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

/// Discord ids are unsigned 64-bit integers rendered in decimal.
pub fn validate_snowflake(kind: &str, id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} ID is required", kind));
    }
    if id.len() > MAX_SNOWFLAKE_LENGTH || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("Invalid {} ID: {}", kind.to_lowercase(), id));
    }
    Ok(())
}

/// Formats a member count with comma thousands separators, e.g. `12,345`.
pub fn format_member_count(count: i64) -> String {
    let digits = count.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if count < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
