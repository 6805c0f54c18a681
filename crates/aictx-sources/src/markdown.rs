//! HTML to markdown conversion.
//!
//! The document is cleaned up with scraper first: scripting and
//! presentation-only elements are detached, link and image targets are
//! resolved against the page URL, and image sources go through a
//! caller-supplied rewrite so they can point at local copies. The cleaned
//! markup is then handed to html2md.

use ego_tree::{NodeId, Tree};
use scraper::node::Node;
use scraper::{Html, StrTendril};
use url::Url;

/// Elements whose content never reaches the markdown
const DROPPED: &[&str] = &["script", "style", "noscript", "iframe", "template", "head"];

/// Decides the markdown target of an image. `None` keeps the resolved URL.
pub trait ImageRewrite {
    fn rewrite(&mut self, src: &Url) -> Option<String>;
}

impl<F: FnMut(&Url) -> Option<String>> ImageRewrite for F {
    fn rewrite(&mut self, src: &Url) -> Option<String> {
        self(src)
    }
}

/// Keeps every image pointing at its original location
pub struct KeepImages;

impl ImageRewrite for KeepImages {
    fn rewrite(&mut self, _src: &Url) -> Option<String> {
        None
    }
}

/// Convert a full HTML document. Relative links and image sources are
/// resolved against `base`.
pub fn to_markdown(html: &str, base: Option<&Url>, images: &mut dyn ImageRewrite) -> String {
    let cleaned = prepare(html, base, images);
    let mut markdown = html2md::parse_html(&cleaned).trim().to_string();
    markdown.push('\n');
    markdown
}

pub(crate) fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}

enum Edit {
    /// Replace the element's attributes with these
    Attrs(Vec<(&'static str, String)>),
    /// Keep the children, drop the element
    Unwrap,
    Remove,
}

/// Strip non-content elements and rewrite link and image targets,
/// returning the serialized document.
fn prepare(html: &str, base: Option<&Url>, images: &mut dyn ImageRewrite) -> String {
    let mut document = Html::parse_document(html);

    let dropped: Vec<NodeId> = document
        .tree
        .root()
        .descendants()
        .filter(|node| match node.value() {
            Node::Element(element) => DROPPED.contains(&element.name()),
            _ => false,
        })
        .map(|node| node.id())
        .collect();
    for id in dropped {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    // detached subtrees are no longer reachable from the root, so images
    // inside dropped elements are never fetched
    let mut edits = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Element(element) = node.value() else {
            continue;
        };
        let edit = match element.name() {
            "a" => match element.attr("href").and_then(|h| resolve_url(h, base)) {
                Some(href) => Edit::Attrs(vec![("href", href.to_string())]),
                None => Edit::Unwrap,
            },
            "img" => match element.attr("src").and_then(|s| resolve_url(s, base)) {
                Some(src) => {
                    let target = images.rewrite(&src).unwrap_or_else(|| src.to_string());
                    let alt = element.attr("alt").unwrap_or_default().trim().to_string();
                    Edit::Attrs(vec![("alt", alt), ("src", target)])
                }
                None => Edit::Remove,
            },
            _ => continue,
        };
        edits.push((node.id(), edit));
    }

    for (id, edit) in edits {
        match edit {
            Edit::Attrs(values) => set_attrs(&mut document.tree, id, &values),
            Edit::Unwrap => unwrap_element(&mut document.tree, id),
            Edit::Remove => {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                }
            }
        }
    }

    document.html()
}

/// Keep only the named attributes, with new values. `values` is sorted by
/// name, matching the order scraper keeps attributes in.
fn set_attrs(tree: &mut Tree<Node>, id: NodeId, values: &[(&str, String)]) {
    let Some(mut node) = tree.get_mut(id) else {
        return;
    };
    let Node::Element(element) = node.value() else {
        return;
    };
    element
        .attrs
        .retain(|(name, _)| values.iter().any(|(key, _)| *key == &*name.local));
    for (name, value) in element.attrs.iter_mut() {
        if let Some((_, new)) = values.iter().find(|(key, _)| *key == &*name.local) {
            *value = StrTendril::from(new.as_str());
        }
    }
}

fn unwrap_element(tree: &mut Tree<Node>, id: NodeId) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let children: Vec<NodeId> = node.children().map(|child| child.id()).collect();
    let Some(mut node) = tree.get_mut(id) else {
        return;
    };
    if node.parent().is_none() {
        return;
    }
    for child in children {
        node.insert_id_before(child);
    }
    node.detach();
}
