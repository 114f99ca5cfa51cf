use codesmith::parsers::{
    ParsedFile, explanation, extension_for, parse_generated_code, sanitize_filename,
};

fn file(filename: &str, language: &str, content: &str) -> ParsedFile {
    ParsedFile {
        filename: filename.to_string(),
        content: content.to_string(),
        language: language.to_string(),
    }
}

#[test]
fn typical_completion_splits_into_files() {
    let text = "Here is your app:\n```html // index.html\n<html></html>\n```\n```css\nbody{}\n```";

    assert_eq!(
        parse_generated_code(text),
        vec![
            file("index.html", "html", "<html></html>"),
            file("file.css", "css", "body{}"),
        ]
    );
    assert_eq!(explanation(text).as_deref(), Some("Here is your app:"));
}

#[test]
fn blocks_come_back_in_order() {
    let text = "\
```html // index.html
<div id=\"app\"></div>
```
Some words between blocks.
```css // styles.css
#app { color: red; }
```
```js // app.js
console.log('hi');
```";

    let names: Vec<String> = parse_generated_code(text)
        .into_iter()
        .map(|f| f.filename)
        .collect();
    assert_eq!(names, vec!["index.html", "styles.css", "app.js"]);
}

#[test]
fn filename_on_following_line() {
    let text = "```javascript\n// utils.js\nexport const x = 1;\n```";
    assert_eq!(
        parse_generated_code(text),
        vec![file("utils.js", "javascript", "export const x = 1;")]
    );
}

#[test]
fn untagged_block_defaults_to_javascript() {
    let text = "```\nlet a = 1;\n```";
    assert_eq!(
        parse_generated_code(text),
        vec![file("file.js", "javascript", "let a = 1;")]
    );
}

#[test]
fn no_blocks_falls_back_to_single_html_file() {
    let text = "  <!DOCTYPE html><html><body>hi</body></html>\n";
    assert_eq!(
        parse_generated_code(text),
        vec![file(
            "index.html",
            "html",
            "<!DOCTYPE html><html><body>hi</body></html>"
        )]
    );
    assert_eq!(explanation(text), None);
}

#[test]
fn unterminated_block_falls_back() {
    let text = "```html\n<p>never closed";
    let files = parse_generated_code(text);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "index.html");
    assert_eq!(files[0].content, text);
}

#[test]
fn empty_input_still_yields_one_file() {
    assert_eq!(parse_generated_code(""), vec![file("index.html", "html", "")]);
}

#[test]
fn explanation_absent_when_text_starts_with_fence() {
    assert_eq!(explanation("```html\n<p></p>\n```"), None);
    assert_eq!(explanation("\n\n   ```css\na{}\n```"), None);
}

#[test]
fn extension_table_is_total() {
    for (language, ext) in [
        ("html", "html"),
        ("css", "css"),
        ("javascript", "js"),
        ("typescript", "ts"),
        ("python", "py"),
        ("rust", "rs"),
        ("csharp", "cs"),
        ("HTML", "html"),
        ("js", "txt"),
        ("cobol", "txt"),
        ("", "txt"),
    ] {
        assert_eq!(extension_for(language), ext, "language {language:?}");
    }
}

#[test]
fn sanitize_replaces_everything_outside_safe_set() {
    assert_eq!(sanitize_filename("my app (v2).html"), "my_app__v2_.html");
    assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
    assert_eq!(sanitize_filename("index.html"), "index.html");
}
