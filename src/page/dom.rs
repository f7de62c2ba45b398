//! Minimal element tree and selector matching for host pages.

use std::collections::BTreeMap;

/// One element of a page with the bits extraction strategies look at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: Vec<String>,
    pub text: String,
    pub children: Vec<PageElement>,
}

impl PageElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn class(mut self, name: impl Into<String>) -> Self {
        self.classes.push(name.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn child(mut self, child: PageElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = PageElement>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name)
    }

    /// Own text followed by the text of every descendant, like `textContent`.
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Descendants matching `selector` in document order. Excludes `self`.
    pub fn query_all<'a>(&'a self, selector: &Selector) -> Vec<&'a PageElement> {
        let mut found = Vec::new();
        for child in &self.children {
            child.collect(selector, &mut found);
        }
        found
    }

    pub fn query<'a>(&'a self, selector: &Selector) -> Option<&'a PageElement> {
        self.query_all(selector).into_iter().next()
    }

    fn collect<'a>(&'a self, selector: &Selector, found: &mut Vec<&'a PageElement>) {
        if selector.matches(self) {
            found.push(self);
        }
        for child in &self.children {
            child.collect(selector, found);
        }
    }
}

/// Subset of CSS selectors the extraction strategies need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Any of the listed tag names (`h1, h2, h3`).
    Tags(Vec<String>),
    /// Attribute present (`[data-participant-id]`).
    Attr(String),
    /// Attribute with an exact value (`[role=listitem]`).
    AttrEq(String, String),
    /// Class name (`.muted-icon`).
    Class(String),
    /// Every part must match the same element.
    All(Vec<Selector>),
}

impl Selector {
    pub fn tags<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tags(names.into_iter().map(Into::into).collect())
    }

    pub fn attr(name: impl Into<String>) -> Self {
        Self::Attr(name.into())
    }

    pub fn attr_eq(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttrEq(name.into(), value.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    pub fn matches(&self, element: &PageElement) -> bool {
        match self {
            Self::Tags(names) => names.iter().any(|n| n.eq_ignore_ascii_case(&element.tag)),
            Self::Attr(name) => element.attributes.contains_key(name),
            Self::AttrEq(name, value) => element.attribute(name) == Some(value.as_str()),
            Self::Class(name) => element.has_class(name),
            Self::All(parts) => parts.iter().all(|p| p.matches(element)),
        }
    }
}
