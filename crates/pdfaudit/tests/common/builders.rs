//! Builders for checker report JSON.

#![allow(dead_code)]

use serde_json::{json, Map, Value};

/// Builds a report in the checker's `Summary` / `Detailed Report` shape.
#[derive(Default)]
pub struct ReportBuilder {
    sections: Vec<(String, Vec<Value>)>,
    summary: Option<Value>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, section: &str, rule: &str, description: &str, status: &str) -> Self {
        let entry = json!({"Rule": rule, "Status": status, "Description": description});
        match self.sections.iter_mut().find(|(name, _)| name == section) {
            Some((_, rules)) => rules.push(entry),
            None => self.sections.push((section.to_string(), vec![entry])),
        }
        self
    }

    pub fn failed(self, section: &str, rule: &str, description: &str) -> Self {
        self.rule(section, rule, description, "Failed")
    }

    pub fn passed(self, section: &str, rule: &str, description: &str) -> Self {
        self.rule(section, rule, description, "Passed")
    }

    pub fn manual(self, section: &str, rule: &str, description: &str) -> Self {
        self.rule(section, rule, description, "Needs manual check")
    }

    pub fn summary(mut self, passed: u32, failed: u32, manual: u32) -> Self {
        self.summary = Some(json!({
            "Passed": passed,
            "Failed": failed,
            "Needs manual check": manual,
        }));
        self
    }

    pub fn build(self) -> Value {
        let mut detailed = Map::new();
        for (name, rules) in self.sections {
            detailed.insert(name, Value::Array(rules));
        }
        let mut root = Map::new();
        if let Some(summary) = self.summary {
            root.insert("Summary".to_string(), summary);
        }
        root.insert("Detailed Report".to_string(), Value::Object(detailed));
        Value::Object(root)
    }
}

/// The contrast failure shared by every page in the sample documents.
pub fn contrast_failure(builder: ReportBuilder) -> ReportBuilder {
    builder.failed("Text", "Rule-508-1", "Insufficient contrast")
}

pub fn alt_text_failure(builder: ReportBuilder) -> ReportBuilder {
    builder.failed("Image", "Rule-508-7", "Missing alt text")
}

/// Writes a blank PDF with `pages` pages.
pub fn write_blank_pdf(path: &std::path::Path, pages: u32) {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("Failed to save PDF");
}
