/// Default file extension for a fenced-block language tag.
/// Case-insensitive; unknown languages map to `txt`.
pub fn extension_for(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "javascript" => "js",
        "typescript" => "ts",
        "html" => "html",
        "css" => "css",
        "python" => "py",
        "java" => "java",
        "cpp" => "cpp",
        "csharp" => "cs",
        "ruby" => "rb",
        "go" => "go",
        "rust" => "rs",
        "php" => "php",
        _ => "txt",
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_languages() {
        let table = [
            ("javascript", "js"),
            ("typescript", "ts"),
            ("html", "html"),
            ("css", "css"),
            ("python", "py"),
            ("java", "java"),
            ("cpp", "cpp"),
            ("csharp", "cs"),
            ("ruby", "rb"),
            ("go", "go"),
            ("rust", "rs"),
            ("php", "php"),
        ];
        for (language, ext) in table {
            assert_eq!(extension_for(language), ext, "{language}");
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(extension_for("Python"), "py");
        assert_eq!(extension_for("HTML"), "html");
    }

    #[test]
    fn unknown_languages_fall_back_to_txt() {
        assert_eq!(extension_for("brainfuck"), "txt");
        assert_eq!(extension_for(""), "txt");
        // Exact match only: aliases are not recognised
        assert_eq!(extension_for("js"), "txt");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my app/index.html"), "my_app_index.html");
        assert_eq!(sanitize_filename("ok-name.v2.js"), "ok-name.v2.js");
        assert_eq!(sanitize_filename("ünïcode"), "_n_code");
    }
}
