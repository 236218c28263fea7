use std::collections::BTreeMap;

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// Minimal element tree produced by the server-side renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attrs.insert(name.to_string(), value.to_string());
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_attr("id")
    }

    pub fn text_content(&self) -> String {
        let mut out = self.text.clone().unwrap_or_default();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Depth-first search including `self`.
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&Node) -> bool) -> Vec<&'a Node> {
        let mut found = Vec::new();
        self.collect(pred, &mut found);
        found
    }

    fn collect<'a>(&'a self, pred: &dyn Fn(&Node) -> bool, found: &mut Vec<&'a Node>) {
        if pred(self) {
            found.push(self);
        }
        for child in &self.children {
            child.collect(pred, found);
        }
    }

    pub fn find(&self, pred: &dyn Fn(&Node) -> bool) -> Option<&Node> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(pred))
    }

    /// Applies `f` to every node matching `pred`, returning how many matched.
    pub fn for_each_mut(&mut self, pred: &dyn Fn(&Node) -> bool, f: &mut dyn FnMut(&mut Node)) -> usize {
        let mut count = 0;
        if pred(self) {
            f(self);
            count += 1;
        }
        for child in &mut self.children {
            count += child.for_each_mut(pred, f);
        }
        count
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&tera::escape_html(value));
            out.push('"');
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }
        if let Some(text) = &self.text {
            out.push_str(&tera::escape_html(text));
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_html_escapes_and_orders_attrs() {
        let node = Node::new("div")
            .class("card")
            .attr("data-x", "a\"b")
            .child(Node::new("h3").text("C++ & Rust"))
            .child(Node::new("input").attr("id", "q"));

        assert_eq!(
            node.to_html(),
            "<div class=\"card\" data-x=\"a&quot;b\"><h3>C++ &amp; Rust</h3><input id=\"q\"></div>"
        );
    }

    #[test]
    fn test_has_class_matches_whole_words() {
        let node = Node::new("div").class("course-card featured");
        assert!(node.has_class("course-card"));
        assert!(node.has_class("featured"));
        assert!(!node.has_class("course"));
    }

    #[test]
    fn test_text_content_is_recursive() {
        let node = Node::new("p").text("a").child(Node::new("b").text("c"));
        assert_eq!(node.text_content(), "ac");
    }
}
