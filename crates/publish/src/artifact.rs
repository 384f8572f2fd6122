//! The discovery index directory: `index.json` for machines and `index.html`
//! for people browsing through a gateway.

use peerdex_types::{IndexDocumentError, PeerIndexDocument, INDEX_FILE_NAME};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

pub const HTML_FILE_NAME: &str = "index.html";

/// Write both index files for `pointers` (`{display name: pointer}`) into
/// `dir`.
pub fn write_index_artifact(dir: &Path, pointers: &BTreeMap<String, String>) -> io::Result<()> {
    let document = PeerIndexDocument::new(pointers.clone());
    let json = document.to_json_pretty().map_err(|err| match err {
        IndexDocumentError::Malformed(err) => io::Error::from(err),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    })?;
    fs::write(dir.join(INDEX_FILE_NAME), json)?;
    fs::write(dir.join(HTML_FILE_NAME), render_html(pointers))?;
    Ok(())
}

pub fn render_html(pointers: &BTreeMap<String, String>) -> String {
    let mut lines = vec![
        "<!doctype html>".to_string(),
        "<html>".to_string(),
        "<head>".to_string(),
        "  <meta charset=\"utf-8\">".to_string(),
        "  <title>IPNS Index</title>".to_string(),
        "  <style>".to_string(),
        "    body { font-family: sans-serif; padding: 2rem; }".to_string(),
        "    li { margin: 0.5rem 0; }".to_string(),
        "    code { background: #eee; padding: 0.2rem 0.4rem; }".to_string(),
        "  </style>".to_string(),
        "</head>".to_string(),
        "<body>".to_string(),
        "  <h1>IPNS Index</h1>".to_string(),
        "  <ul>".to_string(),
    ];
    for (name, pointer) in pointers {
        let pointer = escape(pointer);
        lines.push(format!(
            "    <li><a href=\"ipns://{pointer}\">{}</a> <code>{pointer}</code></li>",
            escape(name)
        ));
    }
    lines.extend(["  </ul>", "</body>", "</html>"].map(String::from));

    let mut html = lines.join("\n");
    html.push('\n');
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pointers() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("blog".to_string(), "k51blog".to_string()),
            ("docs".to_string(), "k51docs".to_string()),
        ])
    }

    #[test]
    fn html_links_every_pointer() {
        let html = render_html(&pointers());
        assert!(html.starts_with("<!doctype html>\n"));
        assert!(html.contains(
            "<li><a href=\"ipns://k51blog\">blog</a> <code>k51blog</code></li>"
        ));
        assert!(html.contains("<a href=\"ipns://k51docs\">docs</a>"));
        assert_eq!(html.matches("<li>").count(), 2);
    }

    #[test]
    fn html_escapes_names() {
        let html = render_html(&BTreeMap::from([(
            "<script>&\"x\"".to_string(),
            "k51evil".to_string(),
        )]));
        assert!(html.contains(">&lt;script&gt;&amp;&quot;x&quot;</a>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn writes_both_files() {
        let dir = TempDir::new().unwrap();
        write_index_artifact(dir.path(), &pointers()).unwrap();

        let raw = fs::read(dir.path().join(INDEX_FILE_NAME)).unwrap();
        assert_eq!(PeerIndexDocument::parse(&raw).unwrap().ipns, pointers());
        assert!(dir.path().join(HTML_FILE_NAME).is_file());
    }
}
