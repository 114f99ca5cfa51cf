/// Reject empty or oversized prompts before any vendor call.
/// Length is counted in characters, not bytes.
pub fn validate_prompt(prompt: &str, max_chars: usize) -> Result<(), String> {
    if prompt.trim().is_empty() {
        return Err("Valid prompt is required".to_string());
    }
    if prompt.chars().count() > max_chars {
        return Err(format!("Prompt is too long (max {max_chars} characters)"));
    }
    Ok(())
}

/// Identifiers supplied by the caller (user, project, file, share ids).
pub fn validate_id(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}
