use std::collections::HashSet;
use std::mem;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::domain::Treatments;
use crate::error::DredgeError;

const SHAPES: [&str; 6] = ["path", "rect", "circle", "ellipse", "polyline", "polygon"];

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    fn is(&self, local: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(local)
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn remove_attr(&mut self, key: &str) {
        self.attributes.retain(|(k, _)| k != key);
    }

    fn set_attr(&mut self, key: &str, value: &str) {
        self.remove_attr(key);
        self.attributes.push((key.to_string(), value.to_string()));
    }

    fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Other(_) => None,
        })
    }
}

pub fn clean_svg(svg: &str, treatments: &Treatments) -> Result<String, DredgeError> {
    let root = parse_document(svg)?;
    let mut cleaner = Cleaner {
        treatments,
        unmatched: treatments.keys().cloned().collect(),
    };
    let (root, _) = cleaner.clean(root);
    serialize(&root)
}

struct Cleaner<'a> {
    treatments: &'a Treatments,
    unmatched: HashSet<String>,
}

impl Cleaner<'_> {
    fn clean(&mut self, mut el: Element) -> (Element, bool) {
        el.children
            .retain(|child| !matches!(child, Node::Element(c) if c.is("title")));

        let claimed = if SHAPES.iter().any(|shape| el.is(shape)) {
            self.claim(&mut el)
        } else {
            None
        };
        el.remove_attr("id");

        let mut claimed_children = 0;
        for child in mem::take(&mut el.children) {
            match child {
                Node::Element(child) => {
                    let (child, matched) = self.clean(child);
                    if matched {
                        claimed_children += 1;
                    }
                    el.children.push(Node::Element(child));
                }
                other => el.children.push(other),
            }
        }

        if el.is("a") && claimed_children == 1 && el.element_children().count() == 1 {
            if let Some(shape) = el.element_children().next().cloned() {
                return (shape, false);
            }
        }

        let Some(treatment) = claimed else {
            return (el, false);
        };
        let label = self
            .treatments
            .get(&treatment)
            .map(|t| t.display_label(&treatment).to_string())
            .unwrap_or_else(|| treatment.clone());

        el.set_attr("data-treatment", &treatment);
        let mut title = Element::new("title");
        title
            .children
            .push(Node::Other(Event::Text(BytesText::new(&label).into_owned())));
        el.children.push(Node::Element(title));
        (el, true)
    }

    fn claim(&mut self, el: &mut Element) -> Option<String> {
        for key in ["id", "name"] {
            let Some(value) = el.attr(key) else {
                continue;
            };
            if self.unmatched.remove(value) {
                let treatment = value.to_string();
                el.remove_attr(key);
                return Some(treatment);
            }
        }
        None
    }
}

fn parse_document(text: &str) -> Result<Element, DredgeError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| DredgeError::parse_reason(err.to_string()))?;
        match event {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => attach(&mut stack, &mut root, element_from(&start)?)?,
            Event::End(_) => {
                let el = stack.pop().ok_or_else(DredgeError::parse)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Eof => break,
            other => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Other(other.into_owned()));
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(DredgeError::parse_reason("unclosed element"));
    }
    root.ok_or_else(|| DredgeError::parse_reason("no root element"))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), DredgeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => return Err(DredgeError::parse_reason("multiple root elements")),
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, DredgeError> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref())
        .map_err(|err| DredgeError::parse_reason(err.to_string()))?;
    let mut el = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|err| DredgeError::parse_reason(err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| DredgeError::parse_reason(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| DredgeError::parse_reason(err.to_string()))?;
        el.attributes.push((key.to_string(), value.into_owned()));
    }
    Ok(el)
}

fn serialize(root: &Element) -> Result<String, DredgeError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(|err| DredgeError::parse_reason(err.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), DredgeError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return write(writer, Event::Empty(start));
    }

    write(writer, Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(child) => write_element(writer, child)?,
            Node::Other(event) => write(writer, event.clone())?,
        }
    }
    write(writer, Event::End(BytesEnd::new(el.name.as_str())))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DredgeError> {
    writer
        .write_event(event)
        .map_err(|err| DredgeError::parse_reason(err.to_string()))
}
