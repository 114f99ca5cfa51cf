use std::sync::LazyLock;

use regex::Regex;

use crate::parsers::ParsedFile;
use crate::parsers::extension::extension_for;

pub const DEFAULT_LANGUAGE: &str = "javascript";

pub const FALLBACK_FILENAME: &str = "index.html";
pub const FALLBACK_LANGUAGE: &str = "html";

const FENCE: &str = "```";

/// Opening fence, optional language tag, optional `// filename` (same line
/// or the next one), newline, then the body up to the nearest closing fence.
static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```([0-9A-Za-z_]+)?\s*(?://[ \t]*([^\n]+?))?\n([\s\S]*?)```")
        .expect("code block pattern is valid")
});

/// Split an AI completion into files, in order of appearance.
///
/// Never fails and never returns an empty list: text without any complete
/// fenced block becomes a single `index.html`.
pub fn parse_generated_code(text: &str) -> Vec<ParsedFile> {
    let mut files: Vec<ParsedFile> = CODE_BLOCK
        .captures_iter(text)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string();
            let filename = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("file.{}", extension_for(&language)));
            let content = caps
                .get(3)
                .map(|m| m.as_str().trim())
                .unwrap_or_default()
                .to_string();

            ParsedFile {
                filename,
                content,
                language,
            }
        })
        .collect();

    if files.is_empty() {
        files.push(ParsedFile {
            filename: FALLBACK_FILENAME.to_string(),
            content: text.trim().to_string(),
            language: FALLBACK_LANGUAGE.to_string(),
        });
    }

    files
}

/// Free text before the first fence, trimmed. None when there is no fence
/// or nothing but whitespace precedes it.
pub fn explanation(text: &str) -> Option<String> {
    let idx = text.find(FENCE)?;
    let lead = text[..idx].trim();
    (!lead.is_empty()).then(|| lead.to_string())
}
