//! Mutable element tree for OOXML parts.
//!
//! Parts are parsed with quick-xml into a small owned tree, edited in place,
//! and written back. Whitespace is kept as-is so that untouched text survives
//! a load/save cycle.

use deck_core::{Error, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

/// An element with its qualified name, attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name, e.g. `a:p`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A parsed XML part.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub declaration: Option<BytesDecl<'static>>,
    pub root: Element,
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &str) -> &str {
    match name.split_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

/// Namespace prefix of a qualified name, empty when unprefixed.
pub fn prefix(name: &str) -> &str {
    match name.split_once(':') {
        Some((prefix, _)) => prefix,
        None => "",
    }
}

/// Qualified name with the same prefix as `sibling`.
pub fn qualify(sibling: &str, local: &str) -> String {
    match prefix(sibling) {
        "" => local.to_string(),
        p => format!("{}:{}", p, local),
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Whether this element has the given local name.
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// A prefixed attribute by local name, whatever the prefix.
    ///
    /// Relationship references such as `r:id` and `r:embed` are matched this
    /// way; unprefixed attributes of the same local name are ignored.
    pub fn prefixed_attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| !prefix(k).is_empty() && local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Child elements, skipping text and other nodes.
    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> + '_ {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(local))
    }

    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(local))
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.elements_mut().filter(move |e| e.is(local))
    }

    /// Follow a chain of first-child local names.
    pub fn path(&self, locals: &[&str]) -> Option<&Element> {
        locals.iter().try_fold(self, |current, local| current.child(local))
    }

    pub fn path_mut(&mut self, locals: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for local in locals {
            current = current.child_mut(local)?;
        }
        Some(current)
    }

    /// All descendant elements (excluding self) in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        while let Some(el) = stack.pop() {
            out.push(el);
            let before = stack.len();
            stack.extend(el.elements());
            stack[before..].reverse();
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Append `child` and return it.
    pub fn push(&mut self, child: Element) -> &mut Element {
        let index = self.children.len();
        self.insert(index, child)
    }

    /// Insert `child` at node index `index` and return it.
    pub fn insert(&mut self, index: usize, child: Element) -> &mut Element {
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
        match &mut self.children[index] {
            Node::Element(e) => e,
            _ => unreachable!("an element was just inserted at this index"),
        }
    }

    /// Node index of the first child element with the given local name.
    pub fn position(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.is(local)))
    }

    /// Keep only the child elements for which `keep` returns true. Non-element
    /// nodes are kept.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&Element) -> bool) {
        self.children.retain(|node| match node {
            Node::Element(e) => keep(e),
            _ => true,
        });
    }

    /// The child with the given local name, created at `index` when missing.
    pub fn ensure_child(&mut self, local: &str, index: usize) -> &mut Element {
        match self.position(local) {
            Some(pos) => match &mut self.children[pos] {
                Node::Element(e) => e,
                _ => unreachable!("position() only returns element nodes"),
            },
            None => {
                let name = qualify(&self.name, local);
                self.insert(index, Element::new(name))
            }
        }
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

fn xml_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::XmlError(format!("{}: {}", context, e))
}

fn element_from_start(e: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error("Invalid attribute", err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    match node {
        Node::Element(el) if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        Node::Element(el) => Err(Error::XmlError(format!(
            "Second root element <{}>",
            el.name
        ))),
        // prolog whitespace, comments and PIs are not kept
        _ => Ok(()),
    }
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self {
            declaration: Some(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
            root,
        }
    }

    /// Parse a part from text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(false);

        let mut declaration = None;
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                xml_error(
                    &format!("Parse error at position {}", reader.buffer_position()),
                    e,
                )
            })?;
            match event {
                Event::Decl(d) => declaration = Some(d.into_owned()),
                Event::Start(ref e) => stack.push(element_from_start(e)?),
                Event::Empty(ref e) => {
                    let el = element_from_start(e)?;
                    attach(&mut stack, &mut root, Node::Element(el))?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| Error::XmlError("Unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, Node::Element(el))?;
                }
                Event::Text(ref t) => {
                    let text = match t.unescape() {
                        Ok(s) => s.into_owned(),
                        Err(_) => String::from_utf8_lossy(t).into_owned(),
                    };
                    attach(&mut stack, &mut root, Node::Text(text))?;
                }
                Event::CData(ref c) => {
                    let text = String::from_utf8_lossy(c).into_owned();
                    attach(&mut stack, &mut root, Node::CData(text))?;
                }
                Event::Comment(ref c) => {
                    let text = String::from_utf8_lossy(c).into_owned();
                    attach(&mut stack, &mut root, Node::Comment(text))?;
                }
                Event::PI(ref p) => {
                    let text = String::from_utf8_lossy(p).into_owned();
                    attach(&mut stack, &mut root, Node::ProcessingInstruction(text))?;
                }
                Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::XmlError(format!("Unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| Error::XmlError("Document has no root element".to_string()))?;
        Ok(Self { declaration, root })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| Error::XmlError(format!("Part is not UTF-8: {}", e)))?;
        Self::parse(content.trim_start_matches('\u{feff}'))
    }

    /// Serialize the document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(decl.clone()))
                .map_err(|e| xml_error("Failed to write declaration", e))?;
            writer
                .write_event(Event::Text(BytesText::from_escaped("\r\n")))
                .map_err(|e| xml_error("Failed to write declaration", e))?;
        }
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }

    pub fn to_string_lossy(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.to_bytes()?).into_owned())
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| xml_error("Failed to write element", e));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| xml_error("Failed to write element", e))?;
    for node in &el.children {
        let result = match node {
            Node::Element(child) => {
                write_element(writer, child)?;
                Ok(())
            }
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t))),
            Node::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str()))),
            Node::Comment(t) => writer.write_event(Event::Comment(BytesText::from_escaped(t.as_str()))),
            Node::ProcessingInstruction(t) => {
                writer.write_event(Event::PI(BytesText::from_escaped(t.as_str())))
            }
        };
        result.map_err(|e| xml_error("Failed to write node", e))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(|e| xml_error("Failed to write element", e))
}
