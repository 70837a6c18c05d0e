use crate::parser::primitive_parser::decode_text;
use crate::TranscribeError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document as XmlDocument, ParsingOptions};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Owned MEI document: prolog processing instructions and the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeiDocument {
    /// `(target, content)` of the processing instructions before the root
    pub prolog: Vec<(String, String)>,
    pub root: Element,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// Element with its prefixed name, attributes in document order and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder style child append.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let position = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(position).1)
    }

    /// Whether the element holds text, making it mixed content
    pub fn has_text(&self) -> bool {
        self.children.iter().any(|node| matches!(node, Node::Text(_)))
    }

    pub fn push(&mut self, child: Self) {
        self.children.push(Node::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Self> {
        self.elements().find(|element| element.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.elements().filter(move |element| element.name == name)
    }

    /// Like [`Element::child`] but missing children are reported as malformed input.
    pub fn require_child(&self, name: &str, path: &str) -> Result<&Self, TranscribeError> {
        self.child(name).ok_or_else(|| {
            TranscribeError::malformed(format!("{path}/{name}"), format!("missing <{name}>"))
        })
    }

    /// First descendant (depth first, document order) with the given name.
    pub fn find_descendant(&self, name: &str) -> Option<&Self> {
        self.elements().find_map(|element| {
            if element.name == name {
                Some(element)
            } else {
                element.find_descendant(name)
            }
        })
    }

    /// All descendants with the given name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Self> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Self>) {
        for element in self.elements() {
            if element.name == name {
                found.push(element);
            }
            element.collect_descendants(name, found);
        }
    }
}

/// Parse an MEI file's raw bytes.
pub fn parse_mei(data: &[u8]) -> Result<MeiDocument, TranscribeError> {
    let text = decode_text(data);
    parse_mei_str(&text)
}

pub fn parse_mei_str(text: &str) -> Result<MeiDocument, TranscribeError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = XmlDocument::parse_with_options(text, options)
        .map_err(|e| TranscribeError::XmlError(e.to_string()))?;

    let prolog = doc
        .root()
        .children()
        .take_while(|node| !node.is_element())
        .filter_map(|node| node.pi())
        .map(|pi| (pi.target.to_string(), pi.value.unwrap_or_default().to_string()))
        .collect();

    let root_node = doc.root_element();
    let mut root = convert_element(root_node);
    // namespace declarations are only kept on the root
    let mut declarations: Vec<(String, String)> = root_node
        .namespaces()
        .filter(|ns| ns.uri() != XML_NAMESPACE)
        .map(|ns| match ns.name() {
            Some(prefix) => (format!("xmlns:{prefix}"), ns.uri().to_string()),
            None => ("xmlns".to_string(), ns.uri().to_string()),
        })
        .collect();
    declarations.append(&mut root.attributes);
    root.attributes = declarations;
    log::debug!("Parsed MEI document with root <{}>", root.name);
    Ok(MeiDocument { prolog, root })
}

fn qualified_name(node: roxmltree::Node, namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(XML_NAMESPACE) => format!("xml:{local}"),
        Some(uri) => match node.lookup_prefix(uri) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
            _ => local.to_string(),
        },
        None => local.to_string(),
    }
}

fn convert_element(node: roxmltree::Node) -> Element {
    let tag = node.tag_name();
    let name = qualified_name(node, tag.namespace(), tag.name());
    let attributes = node
        .attributes()
        .map(|attribute| {
            (
                qualified_name(node, attribute.namespace(), attribute.name()),
                attribute.value().to_string(),
            )
        })
        .collect();
    // text is kept as written in mixed content, elsewhere it is only indentation
    let mixed = node
        .children()
        .any(|child| child.is_text() && child.text().is_some_and(|t| !t.trim().is_empty()));
    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(Node::Element(convert_element(child)))
            } else if child.is_comment() {
                child.text().map(|c| Node::Comment(c.to_string()))
            } else if child.is_text() && mixed {
                child.text().map(|t| Node::Text(t.to_string()))
            } else {
                None
            }
        })
        .collect();
    Element {
        name,
        attributes,
        children,
    }
}

/// Serialize a document, indented with tabs.
pub fn write_mei(document: &MeiDocument) -> Result<String, TranscribeError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    for (target, content) in &document.prolog {
        let pi = if content.is_empty() {
            target.clone()
        } else {
            format!("{target} {content}")
        };
        writer
            .write_event(Event::PI(BytesText::from_escaped(pi)))
            .map_err(xml_error)?;
    }
    write_element(&mut writer, &document.root, true)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| TranscribeError::XmlError(e.to_string()))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    indented: bool,
) -> Result<(), TranscribeError> {
    if indented && element.has_text() {
        // indenting mixed content would change its text
        let mut inline = Writer::new(Vec::new());
        write_element(&mut inline, element, false)?;
        writer.write_indent().map_err(xml_error)?;
        writer.get_mut().extend(inline.into_inner());
        return Ok(());
    }
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in &element.children {
        match child {
            Node::Element(inner) => write_element(writer, inner, indented)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?,
            Node::Comment(comment) => writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(xml_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_error)
}

fn xml_error(error: impl std::fmt::Display) -> TranscribeError {
    TranscribeError::XmlError(error.to_string())
}
