use super::xml::{Element, Node, NodePath, XmlDocument};
use super::DocxError;

/// Containers walked through when collecting a paragraph's runs.
const RUN_WRAPPERS: &[&str] = &[
    "w:hyperlink",
    "w:ins",
    "w:smartTag",
    "w:sdt",
    "w:sdtContent",
    "w:fldSimple",
    "w:customXml",
    "w:dir",
    "w:bdo",
];

/// Run children that make up its text.
const TEXT_NODES: &[&str] = &[
    "w:t",
    "w:tab",
    "w:ptab",
    "w:br",
    "w:cr",
    "w:noBreakHyphen",
    "w:sym",
];

/// Markup that marks a run as carrying an embedded object.
pub const EMBEDDED_MARKERS: &[&str] = &[
    "w:drawing",
    "w:pict",
    "w:object",
    "a:graphic",
    "pic:pic",
    "a:blip",
];

/// The main document part, parsed.
#[derive(Debug, Clone)]
pub struct Document {
    xml: XmlDocument,
    body: NodePath,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Self, DocxError> {
        Self::from_xml(XmlDocument::parse(xml)?)
    }

    pub fn from_xml(xml: XmlDocument) -> Result<Self, DocxError> {
        let root = xml
            .root()
            .ok_or_else(|| DocxError::Malformed("empty document part".into()))?;
        let body = root
            .elements()
            .find(|(_, e)| e.is("w:body"))
            .map(|(i, _)| vec![i])
            .ok_or(DocxError::MissingBody)?;
        Ok(Document { xml, body })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        self.xml.to_bytes()
    }

    fn body(&self) -> &Element {
        self.xml
            .root()
            .and_then(|r| r.at(&self.body))
            .expect("body path resolved at parse time")
    }

    fn body_mut(&mut self) -> &mut Element {
        let body = self.body.clone();
        self.xml
            .root_mut()
            .and_then(|r| r.at_mut(&body))
            .expect("body path resolved at parse time")
    }

    /// Child indices of body-level paragraphs.
    fn paragraph_slots(&self) -> Vec<usize> {
        self.body()
            .elements()
            .filter(|(_, e)| e.is("w:p"))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn block_count(&self) -> usize {
        self.body().elements().filter(|(_, e)| e.is("w:p")).count()
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> {
        self.body()
            .elements()
            .filter(|(_, e)| e.is("w:p"))
            .enumerate()
            .map(|(index, (_, element))| Block { index, element })
    }

    pub fn block(&self, index: usize) -> Option<Block<'_>> {
        self.blocks().nth(index)
    }

    pub fn block_mut(&mut self, index: usize) -> Option<BlockMut<'_>> {
        let slot = *self.paragraph_slots().get(index)?;
        match self.body_mut().children.get_mut(slot)? {
            Node::Element(element) => Some(BlockMut { index, element }),
            _ => None,
        }
    }
}

/// Read view over one body-level paragraph.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    index: usize,
    element: &'a Element,
}

impl<'a> Block<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// Raw text, untrimmed.
    pub fn text(&self) -> String {
        self.runs().iter().map(|r| r.text()).collect()
    }

    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }

    /// Runs in document order, each with its path from the paragraph.
    pub fn runs(&self) -> Vec<Run<'a>> {
        let mut runs = Vec::new();
        collect_runs(self.element, &mut Vec::new(), &mut runs);
        runs
    }
}

fn collect_runs<'a>(el: &'a Element, path: &mut NodePath, out: &mut Vec<Run<'a>>) {
    for (i, child) in el.elements() {
        path.push(i);
        if child.is("w:r") {
            out.push(Run {
                path: path.clone(),
                element: child,
            });
        } else if RUN_WRAPPERS.contains(&child.name.as_str()) {
            collect_runs(child, path, out);
        }
        path.pop();
    }
}

#[derive(Debug, Clone)]
pub struct Run<'a> {
    pub path: NodePath,
    pub element: &'a Element,
}

impl Run<'_> {
    pub fn text(&self) -> String {
        run_text(self.element)
    }

    pub fn has_embedded_object(&self) -> bool {
        self.element
            .elements()
            .any(|(_, e)| e.contains_any(EMBEDDED_MARKERS))
    }

    /// Carries an embedded object and no text of its own.
    pub fn is_image_only(&self) -> bool {
        self.has_embedded_object() && self.text().is_empty()
    }
}

fn run_text(run: &Element) -> String {
    let mut out = String::new();
    for (_, child) in run.elements() {
        match child.name.as_str() {
            "w:t" => out.push_str(&child.text()),
            "w:tab" | "w:ptab" => out.push('\t'),
            "w:cr" => out.push('\n'),
            // page and column breaks are layout, not text
            "w:br" => {
                if child.attr("w:type").unwrap_or("textWrapping") == "textWrapping" {
                    out.push('\n');
                }
            }
            "w:noBreakHyphen" => out.push('-'),
            _ => {}
        }
    }
    out
}

/// Mutable view over one body-level paragraph.
#[derive(Debug)]
pub struct BlockMut<'a> {
    index: usize,
    element: &'a mut Element,
}

impl BlockMut<'_> {
    pub fn as_block(&self) -> Block<'_> {
        Block {
            index: self.index,
            element: &*self.element,
        }
    }

    /// Strip every text-carrying child of the run, keeping properties and objects.
    /// Returns the index the first removed child occupied.
    pub fn clear_run_text(&mut self, run: &[usize]) -> Option<usize> {
        let el = self.element.at_mut(run)?;
        let first = el.children.iter().position(is_text_node);
        el.children.retain(|n| !is_text_node(n));
        first
    }

    /// Replace the run's text with `text`, in place of the old text nodes.
    pub fn set_run_text(&mut self, run: &[usize], text: &str) -> bool {
        let slot = self.clear_run_text(run);
        let Some(el) = self.element.at_mut(run) else {
            return false;
        };
        let slot = slot.unwrap_or_else(|| {
            el.children
                .iter()
                .position(|n| matches!(n, Node::Element(e) if e.is("w:rPr")))
                .map_or(0, |i| i + 1)
        });
        let t = Element::new("w:t")
            .with_attr("xml:space", "preserve")
            .with_text(text);
        el.children.insert(slot.min(el.children.len()), Node::Element(t));
        true
    }

    pub fn remove_node(&mut self, path: &[usize]) -> Option<Node> {
        self.element.remove_at(path)
    }

    pub fn node(&self, path: &[usize]) -> Option<&Element> {
        self.element.at(path)
    }
}

fn is_text_node(node: &Node) -> bool {
    matches!(node, Node::Element(e) if TEXT_NODES.contains(&e.name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::*;

    #[test]
    fn body_paragraphs_only() {
        let table = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        let doc = document(&[text_paragraph("one"), table.to_string(), text_paragraph("two")]);
        assert_eq!(doc.block_count(), 2);
        let texts: Vec<String> = doc.blocks().map(|b| b.text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(doc.block(1).unwrap().index(), 1);
        assert!(doc.block(2).is_none());
    }

    #[test]
    fn text_walks_hyperlinks_and_controls() {
        let p = r#"<w:p><w:r><w:t>a</w:t><w:tab/></w:r><w:hyperlink r:id="rId1"><w:r><w:t>b</w:t><w:br/></w:r></w:hyperlink><w:del><w:r><w:delText>gone</w:delText></w:r></w:del><w:r><w:br w:type="page"/><w:t xml:space="preserve"> c </w:t></w:r></w:p>"#;
        let doc = document(&[p.to_string()]);
        let block = doc.block(0).unwrap();
        assert_eq!(block.text(), "a\tb\n c ");
        assert_eq!(block.trimmed_text(), "a\tb\n c");
        assert_eq!(block.runs().len(), 3);
    }

    #[test]
    fn image_only_runs() {
        let doc = document(&[paragraph(&[
            image_run(1, "Picture 1", 100, 100),
            text_run("caption"),
            format!("<w:r>{}<w:t>x</w:t></w:r>", drawing(2, "Picture 2", 1, 1)),
        ])]);
        let runs = doc.block(0).unwrap().runs();
        assert!(runs[0].is_image_only());
        assert!(!runs[1].has_embedded_object());
        assert!(runs[2].has_embedded_object());
        assert!(!runs[2].is_image_only());
    }

    #[test]
    fn set_run_text_replaces_in_place() {
        let mut doc = document(&[paragraph(&[text_run("old"), text_run("tail")])]);
        {
            let mut block = doc.block_mut(0).unwrap();
            let paths: Vec<NodePath> = block.as_block().runs().into_iter().map(|r| r.path).collect();
            assert!(block.set_run_text(&paths[0], "new & improved"));
            block.clear_run_text(&paths[1]);
        }
        let block = doc.block(0).unwrap();
        assert_eq!(block.text(), "new & improved");
        // run properties stay ahead of the text
        let first = block.runs()[0].element;
        assert!(first.children.iter().position(|n| matches!(n, Node::Element(e) if e.is("w:rPr")))
            < first.children.iter().position(|n| matches!(n, Node::Element(e) if e.is("w:t"))));
    }

    #[test]
    fn rejects_part_without_body() {
        let err = Document::parse("<w:document/>").unwrap_err();
        assert!(matches!(err, DocxError::MissingBody));
    }
}
