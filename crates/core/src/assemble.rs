//! Worksheet Assembler: builds a combined PDF from selected question
//! regions of previously ingested papers.
//!
//! Source pages are copied at most once each, memoised by (source, page).
//! Selected regions are marked with vector rectangles and optional labels
//! drawn in an appended content stream, so the original page content is
//! never re-typeset. Failed placements are collected as warnings and the
//! rest of the build proceeds.

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::model::BBox;

const PDF_VERSION: &str = "1.5";
const FONT_KEY: &[u8] = b"PmHelv";
const HEADER_FONT_SIZE: f64 = 11.0;
const LABEL_FONT_SIZE: f64 = 9.0;
const RECT_LINE_WIDTH: f64 = 1.2;
const MARGIN: f64 = 40.0;

/// One selected question or part region to place on the worksheet.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Index into the `sources` slice handed to `assemble`.
    pub source: usize,
    pub question_number: u32,
    /// Empty for a whole-question selection.
    pub part_code: String,
    pub marks: u32,
    /// Regions in the source document, top-left origin point units.
    pub bboxes: Vec<BBox>,
    /// Optional text drawn beside the region's rectangle.
    pub label: Option<String>,
}

/// The assembled worksheet plus its build metadata.
#[derive(Debug, Clone)]
pub struct WorksheetBuild {
    pub pdf_bytes: Vec<u8>,
    pub total_pages: usize,
    pub total_marks: u32,
    /// `ceil(total marks × 1.5)` minutes, same heuristic as per-question
    /// feature extraction.
    pub estimated_minutes: u32,
    pub placement_warnings: Vec<String>,
}

/// Builds a worksheet PDF from `selections` over the given source papers.
pub fn assemble(title: &str, sources: &[Vec<u8>], selections: &[Selection]) -> Result<WorksheetBuild> {
    let mut builder = Builder::new(title, sources)?;
    for selection in selections {
        builder.place(selection);
    }
    builder.finish(selections)
}

struct Builder<'a> {
    title: String,
    sources: &'a [Vec<u8>],
    /// Parsed source documents, loaded lazily per source index.
    parsed: Vec<Option<Document>>,
    output: Document,
    font_id: ObjectId,
    /// (source, source page number) → output page id.
    copied: HashMap<(usize, u32), ObjectId>,
    /// Output pages in placement order.
    page_order: Vec<ObjectId>,
    warnings: Vec<String>,
}

impl<'a> Builder<'a> {
    fn new(title: &str, sources: &'a [Vec<u8>]) -> Result<Self> {
        let mut output = Document::with_version(PDF_VERSION);
        let font_id = output.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Ok(Self {
            title: title.to_string(),
            sources,
            parsed: (0..sources.len()).map(|_| None).collect(),
            output,
            font_id,
            copied: HashMap::new(),
            page_order: Vec::new(),
            warnings: Vec::new(),
        })
    }

    fn place(&mut self, selection: &Selection) {
        let name = selection_name(selection);
        if selection.bboxes.is_empty() {
            self.warnings.push(format!("{name}: no regions to place"));
            return;
        }
        for bbox in &selection.bboxes {
            if let Err(e) = self.place_region(selection, bbox) {
                warn!(selection = %name, error = %e, "placement failed");
                self.warnings.push(format!("{name}: {e}"));
            }
        }
    }

    fn place_region(&mut self, selection: &Selection, bbox: &BBox) -> Result<()> {
        let page_id = self.copy_page(selection.source, bbox.page)?;
        let (_, media_height) = self.page_size(page_id);

        let x = bbox.x;
        let y = media_height - (bbox.y + bbox.height);
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "RG",
                vec![Object::Real(0.8), Object::Real(0.1), Object::Real(0.1)],
            ),
            Operation::new("w", vec![Object::Real(RECT_LINE_WIDTH as f32)]),
            Operation::new(
                "re",
                vec![
                    Object::Real(x as f32),
                    Object::Real(y as f32),
                    Object::Real(bbox.width as f32),
                    Object::Real(bbox.height as f32),
                ],
            ),
            Operation::new("S", vec![]),
        ];
        if let Some(label) = &selection.label {
            ops.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_KEY.to_vec()),
                        Object::Real(LABEL_FONT_SIZE as f32),
                    ],
                ),
                Operation::new(
                    "Td",
                    vec![
                        Object::Real(x as f32),
                        Object::Real((y + bbox.height + 3.0) as f32),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(label.as_str())]),
                Operation::new("ET", vec![]),
            ]);
        }
        ops.push(Operation::new("Q", vec![]));
        self.append_content(page_id, ops)?;
        debug!(
            source = selection.source,
            page = bbox.page,
            question = selection.question_number,
            "region placed"
        );
        Ok(())
    }

    /// Copies a source page into the output document, once per page.
    fn copy_page(&mut self, source: usize, page_index: usize) -> Result<ObjectId> {
        let page_number = page_index as u32 + 1;
        if let Some(&id) = self.copied.get(&(source, page_number)) {
            return Ok(id);
        }

        if source >= self.sources.len() {
            return Err(PipelineError::Assembly(format!(
                "source {source} out of range"
            )));
        }
        if self.parsed[source].is_none() {
            let mut doc = Document::load_mem(&self.sources[source])?;
            // Shift the whole source past our current id space so its
            // internal references stay valid after the copy.
            doc.renumber_objects_with(self.output.max_id + 1);
            self.parsed[source] = Some(doc);
        }
        let doc = self.parsed[source]
            .as_ref()
            .ok_or_else(|| PipelineError::Assembly("source not parsed".to_string()))?;

        let pages = doc.get_pages();
        let page_id = *pages.get(&page_number).ok_or_else(|| {
            PipelineError::Assembly(format!("page {page_index} missing from source {source}"))
        })?;

        // Pin inherited attributes onto the page before its ancestors are
        // discarded.
        let mut page_dict = doc.get_dictionary(page_id)?.clone();
        for key in [b"MediaBox".as_slice(), b"Resources".as_slice()] {
            if !page_dict.has(key) {
                if let Some(value) = inherited(doc, &page_dict, key) {
                    page_dict.set(key, value);
                }
            }
        }
        page_dict.remove(b"Parent");
        page_dict.remove(b"Annots");

        // Transplant only what the page transitively references. Parent and
        // Annots are gone, so the walk never reaches the source page tree or
        // its other pages.
        let mut queue = Vec::new();
        collect_refs(&Object::Dictionary(page_dict.clone()), &mut queue);
        let mut visited = HashSet::new();
        while let Some(id) = queue.pop() {
            if id == page_id || !visited.insert(id) {
                continue;
            }
            if let Ok(object) = doc.get_object(id) {
                collect_refs(object, &mut queue);
                self.output.objects.entry(id).or_insert_with(|| object.clone());
            }
        }
        self.output.objects.insert(page_id, Object::Dictionary(page_dict));
        self.output.max_id = self.output.max_id.max(doc.max_id);

        self.copied.insert((source, page_number), page_id);
        self.page_order.push(page_id);
        self.ensure_font(page_id)?;
        Ok(page_id)
    }

    /// Registers the worksheet font in a page's Resources dictionary.
    fn ensure_font(&mut self, page_id: ObjectId) -> Result<()> {
        let font_id = self.font_id;
        let resources = {
            let page = self.output.get_dictionary(page_id)?;
            match page.get(b"Resources") {
                Ok(Object::Reference(r)) => self.output.get_dictionary(*r)?.clone(),
                Ok(Object::Dictionary(d)) => d.clone(),
                _ => Dictionary::new(),
            }
        };
        let mut resources = resources;
        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Dictionary(d)) => d.clone(),
            Ok(Object::Reference(r)) => self.output.get_dictionary(*r).ok().cloned().unwrap_or_default(),
            _ => Dictionary::new(),
        };
        fonts.set(FONT_KEY, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));
        let page = self.output.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Appends a content stream to a page, preserving existing streams.
    fn append_content(&mut self, page_id: ObjectId, ops: Vec<Operation>) -> Result<()> {
        let encoded = Content { operations: ops }.encode()?;
        let stream_id = self
            .output
            .add_object(Object::Stream(Stream::new(dictionary! {}, encoded)));

        let existing = self
            .output
            .get_dictionary(page_id)?
            .get(b"Contents")
            .ok()
            .cloned();
        let contents = match existing {
            Some(Object::Array(mut items)) => {
                items.push(Object::Reference(stream_id));
                Object::Array(items)
            }
            Some(reference @ Object::Reference(_)) => {
                Object::Array(vec![reference, Object::Reference(stream_id)])
            }
            _ => Object::Reference(stream_id),
        };
        let page = self.output.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Contents", contents);
        Ok(())
    }

    fn page_size(&self, page_id: ObjectId) -> (f64, f64) {
        let media = self
            .output
            .get_dictionary(page_id)
            .ok()
            .and_then(|d| d.get(b"MediaBox").ok().cloned())
            .and_then(|o| rect_of(&o));
        match media {
            Some([llx, lly, urx, ury]) => (urx - llx, ury - lly),
            None => (595.0, 842.0),
        }
    }

    fn finish(mut self, selections: &[Selection]) -> Result<WorksheetBuild> {
        if self.page_order.is_empty() {
            return Err(PipelineError::Assembly(
                "no pages could be placed".to_string(),
            ));
        }

        let total_pages = self.page_order.len();
        let title = self.title.clone();
        for (index, &page_id) in self.page_order.clone().iter().enumerate() {
            let (width, height) = self.page_size(page_id);
            let footer = format!("Page {} of {total_pages}", index + 1);
            let ops = vec![
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_KEY.to_vec()),
                        Object::Real(HEADER_FONT_SIZE as f32),
                    ],
                ),
                Operation::new(
                    "Td",
                    vec![
                        Object::Real(MARGIN as f32),
                        Object::Real((height - MARGIN / 2.0) as f32),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(title.as_str())]),
                Operation::new("ET", vec![]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_KEY.to_vec()),
                        Object::Real(LABEL_FONT_SIZE as f32),
                    ],
                ),
                Operation::new(
                    "Td",
                    vec![
                        Object::Real((width / 2.0 - 20.0) as f32),
                        Object::Real((MARGIN / 2.0) as f32),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(footer.as_str())]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ];
            self.append_content(page_id, ops)?;
        }

        let kids: Vec<Object> = self
            .page_order
            .iter()
            .map(|&id| Object::Reference(id))
            .collect();
        let pages_id = self.output.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total_pages as i64,
        });
        for &page_id in &self.page_order {
            let page = self.output.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Parent", Object::Reference(pages_id));
        }
        let catalog_id = self.output.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.output.trailer.set("Root", catalog_id);

        let mut pdf_bytes = Vec::new();
        self.output.save_to(&mut pdf_bytes)?;

        let total_marks: u32 = selections.iter().map(|s| s.marks).sum();
        Ok(WorksheetBuild {
            pdf_bytes,
            total_pages,
            total_marks,
            estimated_minutes: (total_marks as f64 * 1.5).ceil() as u32,
            placement_warnings: self.warnings,
        })
    }
}

fn selection_name(selection: &Selection) -> String {
    if selection.part_code.is_empty() {
        format!("question {}", selection.question_number)
    } else {
        format!("question {}{}", selection.question_number, selection.part_code)
    }
}

/// Gathers every object reference nested anywhere inside `object`.
fn collect_refs(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_refs(value, out);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_refs(value, out);
            }
        }
        _ => {}
    }
}

/// Walks the page tree for an inherited attribute, bounded against cycles.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut dict = page.clone();
    for _ in 0..16 {
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        let parent = match dict.get(b"Parent") {
            Ok(Object::Reference(r)) => *r,
            _ => return None,
        };
        dict = doc.get_dictionary(parent).ok()?.clone();
    }
    None
}

fn rect_of(object: &Object) -> Option<[f64; 4]> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(array) {
        *slot = match item {
            Object::Integer(i) => *i as f64,
            Object::Real(f) => *f as f64,
            _ => return None,
        };
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_pdf(page_count: usize) -> Vec<u8> {
        source_pdf_with_text(&vec![""; page_count])
    }

    /// One page per entry; each non-empty entry becomes that page's text.
    fn source_pdf_with_text(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for text in page_texts {
            let mut operations = vec![Operation::new("BT", vec![])];
            if !text.is_empty() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));
            let content = Content { operations };
            let content_id = doc.add_object(Object::Stream(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            )));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_texts.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn selection(source: usize, number: u32, marks: u32, page: usize) -> Selection {
        Selection {
            source,
            question_number: number,
            part_code: String::new(),
            marks,
            bboxes: vec![BBox::new(page, 40.0, 100.0, 400.0, 120.0)],
            label: Some(format!("Q{number}")),
        }
    }

    #[test]
    fn builds_worksheet_with_metadata() {
        let sources = vec![source_pdf(3)];
        let build = assemble(
            "Revision set",
            &sources,
            &[selection(0, 1, 4, 0), selection(0, 2, 6, 2)],
        )
        .unwrap();
        assert!(build.placement_warnings.is_empty());
        assert_eq!(build.total_pages, 2);
        assert_eq!(build.total_marks, 10);
        assert_eq!(build.estimated_minutes, 15);

        let out = Document::load_mem(&build.pdf_bytes).unwrap();
        assert_eq!(out.get_pages().len(), 2);
    }

    #[test]
    fn same_source_page_is_copied_once() {
        let sources = vec![source_pdf(2)];
        let build = assemble(
            "Sheet",
            &sources,
            &[selection(0, 1, 2, 0), selection(0, 2, 3, 0)],
        )
        .unwrap();
        assert_eq!(build.total_pages, 1);
        assert_eq!(build.total_marks, 5);
    }

    #[test]
    fn failed_placement_is_a_warning_not_an_error() {
        let sources = vec![source_pdf(1)];
        let build = assemble(
            "Sheet",
            &sources,
            &[
                selection(0, 1, 2, 0),
                // Page 7 does not exist in the single-page source.
                selection(0, 2, 3, 7),
                // Source 4 does not exist at all.
                selection(4, 3, 1, 0),
            ],
        )
        .unwrap();
        assert_eq!(build.total_pages, 1);
        assert_eq!(build.placement_warnings.len(), 2);
        // Marks count what was requested, so the caller can see the gap.
        assert_eq!(build.total_marks, 6);
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn unselected_source_pages_are_not_copied() {
        let sources = vec![source_pdf_with_text(&["KeepThisPage", "LeaveThisBehind"])];
        let build = assemble("Sheet", &sources, &[selection(0, 1, 2, 0)]).unwrap();
        assert!(build.placement_warnings.is_empty());
        assert_eq!(build.total_pages, 1);
        assert!(contains(&build.pdf_bytes, b"KeepThisPage"));
        assert!(!contains(&build.pdf_bytes, b"LeaveThisBehind"));
    }

    #[test]
    fn empty_selection_list_fails() {
        let sources = vec![source_pdf(1)];
        assert!(assemble("Sheet", &sources, &[]).is_err());
    }

    #[test]
    fn selections_from_two_sources_interleave() {
        let sources = vec![source_pdf(1), source_pdf(2)];
        let build = assemble(
            "Mixed",
            &sources,
            &[selection(0, 1, 2, 0), selection(1, 4, 3, 1)],
        )
        .unwrap();
        assert_eq!(build.total_pages, 2);
        let out = Document::load_mem(&build.pdf_bytes).unwrap();
        assert_eq!(out.get_pages().len(), 2);
    }
}
