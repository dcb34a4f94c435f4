//! Style sheet for the injected copy buttons.

use tracing::debug;

use crate::dom::{Document, NodeId};

pub const STYLE_ELEMENT_ID: &str = "ccc-styles";

const BUTTON_CSS: &str = r#"
.ccc-copy-button-wrapper {
    position: relative;
}
.ccc-copy-button {
    position: absolute;
    top: 4px;
    right: 4px;
    z-index: 1000;
    padding: 4px 8px;
    font-size: 12px;
    font-family: sans-serif;
    background-color: #2a2a2a;
    color: #e0e0e0;
    border: 1px solid #555;
    border-radius: 4px;
    cursor: pointer;
    opacity: 0;
    transition: opacity 0.2s ease-in-out;
}
.ccc-copy-button-wrapper:hover .ccc-copy-button {
    opacity: 1;
}
.ccc-copy-button:hover {
    background-color: #444;
}
"#;

/// Adds the button style sheet to `<head>` unless it is already there.
pub fn inject_styles(doc: &mut Document) -> NodeId {
    let root = doc.root();
    if let Some(existing) = doc
        .descendants(root)
        .into_iter()
        .find(|id| doc.attr(*id, "id") == Some(STYLE_ELEMENT_ID))
    {
        return existing;
    }

    let style = doc.create_element("style");
    doc.set_attr(style, "id", STYLE_ELEMENT_ID);
    doc.set_text(style, BUTTON_CSS);
    let head = doc.head();
    doc.append_child(head, style);
    debug!("Injected button styles");
    style
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn injects_once_into_head() {
        let mut doc = Document::parse_html("<html><head><title>t</title></head><body></body></html>");
        let first = inject_styles(&mut doc);
        let second = inject_styles(&mut doc);
        assert_eq!(first, second);

        let styles = doc.select_all(doc.root(), &Selector::parse("style#ccc-styles").unwrap());
        assert_eq!(styles, vec![first]);
        assert_eq!(doc.parent(first), Some(doc.head()));
        assert!(doc.text_content(first).contains(".ccc-copy-button"));
    }
}
