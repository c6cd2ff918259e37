//! Digest renderer: the daily batch as an HTML email body.
//!
//! Output is deterministic and contains no timestamps, so the same batch
//! always renders to the same document.

use crate::entry::VocabularyEntry;

/// Document title, shared by the HTML and plain-text renditions.
pub const DIGEST_TITLE: &str = "Daily Vocabulary";

/// Render entries as an HTML document, one block per entry in input order.
pub fn render(entries: &[VocabularyEntry]) -> String {
    let mut out = String::new();

    out.push_str("<html>\n");
    out.push_str("<body style=\"font-family: Arial, sans-serif;\">\n");
    out.push_str(&format!(
        "<h1 style=\"color: #333;\">{}</h1>\n",
        DIGEST_TITLE
    ));

    for entry in entries {
        out.push_str("<div class=\"entry\" style=\"margin-bottom: 20px;\">\n");
        out.push_str(&format!(
            "<h2 style=\"color: #444;\">{}</h2>\n",
            escape_html(&entry.term)
        ));
        out.push_str(&format!(
            "<p><strong>Meaning:</strong> {}</p>\n",
            escape_html(&entry.definition)
        ));
        out.push_str("<p><strong>Examples:</strong></p>\n");
        out.push_str("<ul>\n");
        for usage in &entry.usages {
            out.push_str(&format!("<li>{}</li>\n", escape_html(usage)));
        }
        out.push_str("</ul>\n");
        out.push_str("</div>\n");
    }

    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

/// Plain-text rendition, used as the multipart alternative and for
/// printing to a terminal.
pub fn render_text(entries: &[VocabularyEntry]) -> String {
    let mut out = String::new();

    out.push_str(DIGEST_TITLE);
    out.push('\n');
    out.push_str(&"=".repeat(DIGEST_TITLE.len()));
    out.push_str("\n\n");

    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, entry.term));
        out.push_str(&format!("   Meaning: {}\n", entry.definition));
        for usage in &entry.usages {
            out.push_str(&format!("   - {}\n", usage));
        }
        out.push('\n');
    }

    out
}

/// Neutralize characters that would break HTML markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
