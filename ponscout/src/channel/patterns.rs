//! Prompt pattern compilation.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a bytes regex anchored at the end
/// of the buffer.
///
/// A pattern that already ends with `\z` or `$` is left alone; otherwise
/// `\s*\z` is appended so trailing spaces after the prompt still match
/// but prompt-like text earlier in the output does not.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with("\\z") || pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*\\z", pattern)
    };

    Regex::new(&pattern)
}
