//! Declarative selector schemas.
//!
//! An [`ExtractionSchema`] names a base selector (one record per match, or
//! the whole document when absent) and a list of fields. Each field is found
//! by, in order:
//!
//! 1. its `label`, e.g. `"Address:"`: the tightest element whose text
//!    contains the label, taking the text after it (or the text of the next
//!    sibling element when the label stands alone, as in `<dt>`/`<dd>`)
//! 2. its CSS `selector`: the first match with a non-empty value
//!
//! Records come out as JSON objects so they can be deserialized straight
//! into typed models.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::error::Error;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("regex should be valid"));

/// Elements considered when looking for a field label.
static LABEL_SCOPE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, li, div, span, dt, dd, td, th, strong, b, label, section")
        .expect("label scope selector should be valid")
});

static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector should be valid"));

/// What to read from a matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whitespace-collapsed text content.
    Text,
    /// The named attribute.
    Attribute(&'static str),
}

/// Static description of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub selector: &'static str,
    pub label: Option<&'static str>,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn text(name: &'static str, selector: &'static str) -> Self {
        Self { name, selector, label: None, kind: FieldKind::Text }
    }

    pub const fn attr(name: &'static str, selector: &'static str, attr: &'static str) -> Self {
        Self { name, selector, label: None, kind: FieldKind::Attribute(attr) }
    }

    pub const fn labeled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

#[derive(Debug)]
struct Field {
    name: &'static str,
    selector: Selector,
    label: Option<&'static str>,
    kind: FieldKind,
}

/// A compiled schema.
#[derive(Debug)]
pub struct ExtractionSchema {
    name: &'static str,
    base: Option<Selector>,
    fields: Vec<Field>,
}

impl ExtractionSchema {
    pub fn new(
        name: &'static str,
        base: Option<&'static str>,
        fields: &[FieldDef],
    ) -> Result<Self, Box<dyn Error>> {
        let base = match base {
            Some(sel) => Some(Selector::parse(sel)?),
            None => None,
        };
        let fields = fields
            .iter()
            .map(|def| -> Result<Field, Box<dyn Error>> {
                Ok(Field {
                    name: def.name,
                    selector: Selector::parse(def.selector)?,
                    label: def.label,
                    kind: def.kind,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { name, base, fields })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// One JSON object per base match. Records with no fields found are dropped.
    pub fn extract(&self, html: &str) -> Vec<Map<String, Value>> {
        let document = Html::parse_document(html);
        let roots: Vec<ElementRef<'_>> = match &self.base {
            Some(base) => document.select(base).collect(),
            None => vec![document.root_element()],
        };

        roots
            .into_iter()
            .map(|root| self.extract_record(root))
            .filter(|record| !record.is_empty())
            .collect()
    }

    fn extract_record(&self, root: ElementRef<'_>) -> Map<String, Value> {
        let mut record = Map::new();
        for field in &self.fields {
            let value = field
                .label
                .and_then(|label| labeled_value(root, label, field.kind))
                .or_else(|| selected_value(root, &field.selector, field.kind));
            if let Some(v) = value {
                record.insert(field.name.to_string(), Value::String(v));
            }
        }
        record
    }
}

/// Collapse runs of whitespace in an element's text.
pub fn element_text(element: ElementRef<'_>) -> String {
    let raw = element.text().collect::<Vec<_>>().join(" ");
    WHITESPACE.replace_all(&raw, " ").trim().to_string()
}

fn read(element: ElementRef<'_>, kind: FieldKind) -> Option<String> {
    let value = match kind {
        FieldKind::Text => element_text(element),
        FieldKind::Attribute(attr) => element.value().attr(attr)?.trim().to_string(),
    };
    (!value.is_empty()).then_some(value)
}

fn selected_value(root: ElementRef<'_>, selector: &Selector, kind: FieldKind) -> Option<String> {
    root.select(selector).find_map(|el| read(el, kind))
}

fn labeled_value(root: ElementRef<'_>, label: &str, kind: FieldKind) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for el in root.select(&LABEL_SCOPE) {
        let text = element_text(el);
        let Some((_, after)) = text.split_once(label) else {
            continue;
        };
        let value = match kind {
            FieldKind::Text => {
                let after = after.trim_start_matches(':').trim();
                if after.is_empty() {
                    next_element(el).map(element_text).filter(|t| !t.is_empty())
                } else {
                    Some(after.to_string())
                }
            }
            FieldKind::Attribute(_) => el
                .select(&LINK)
                .next()
                .or_else(|| next_element(el).and_then(|n| n.select(&LINK).next()))
                .and_then(|a| read(a, kind)),
        };
        if let Some(value) = value {
            if best.as_ref().is_none_or(|(len, _)| text.len() < *len) {
                best = Some((text.len(), value));
            }
        }
    }
    best.map(|(_, v)| v)
}

fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}
