use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::DocxError;

/// Child-index path from some ancestor element down to a descendant.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Declarations, comments, CDATA and processing instructions, written back verbatim.
    Raw(Event<'static>),
}

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Element children paired with their index in `children`.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children.iter().enumerate().filter_map(|(i, n)| match n {
            Node::Element(e) => Some((i, e)),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().map(|(_, e)| e).find(|e| e.is(name))
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True if this element or any descendant has one of the given names.
    pub fn contains_any(&self, names: &[&str]) -> bool {
        names.contains(&self.name.as_str())
            || self.elements().any(|(_, e)| e.contains_any(names))
    }

    /// First descendant (depth-first, self excluded) with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for (_, e) in self.elements() {
            if e.is(name) {
                return Some(e);
            }
            if let Some(found) = e.find(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn at(&self, path: &[usize]) -> Option<&Element> {
        match path.split_first() {
            None => Some(self),
            Some((&i, rest)) => match self.children.get(i)? {
                Node::Element(e) => e.at(rest),
                _ => None,
            },
        }
    }

    pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        match path.split_first() {
            None => Some(self),
            Some((&i, rest)) => match self.children.get_mut(i)? {
                Node::Element(e) => e.at_mut(rest),
                _ => None,
            },
        }
    }

    /// Detach the node at `path` (must be non-empty) and return it.
    pub fn remove_at(&mut self, path: &[usize]) -> Option<Node> {
        let (&last, parent) = path.split_last()?;
        let parent = self.at_mut(parent)?;
        if last < parent.children.len() {
            Some(parent.children.remove(last))
        } else {
            None
        }
    }

    /// Serialize this subtree on its own, without a declaration.
    pub fn to_xml_string(&self) -> Result<String, DocxError> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

/// A parsed XML part: everything at top level, root element included.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub nodes: Vec<Node>,
}

impl XmlDocument {
    pub fn parse(xml: &str) -> Result<Self, DocxError> {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes = Vec::new();

        loop {
            let node = match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    stack.push(start_element(&e)?);
                    None
                }
                Event::Empty(e) => Some(Node::Element(start_element(&e)?)),
                Event::End(_) => match stack.pop() {
                    Some(el) => Some(Node::Element(el)),
                    None => return Err(DocxError::Malformed("unbalanced end tag".into())),
                },
                Event::Text(e) => Some(Node::Text(
                    e.unescape().map_err(quick_xml::Error::from)?.into_owned(),
                )),
                Event::Eof => break,
                other => Some(Node::Raw(other.into_owned())),
            };

            if let Some(node) = node {
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => nodes.push(node),
                }
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocxError::Malformed(format!(
                "{} unclosed element(s)",
                stack.len()
            )));
        }
        Ok(XmlDocument { nodes })
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn start_element(e: &BytesStart) -> Result<Element, DocxError> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocxError> {
    match node {
        Node::Element(e) => write_element(writer, e)?,
        Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        Node::Raw(ev) => writer.write_event(ev.clone())?,
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), DocxError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (k, v) in &el.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}
