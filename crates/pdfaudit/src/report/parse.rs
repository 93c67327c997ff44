use serde_json::{json, Map, Value};

use super::{ReportSummary, RuleEvaluation, RuleStatus, Section};

pub const SUMMARY_KEY: &str = "Summary";
pub const DETAILED_REPORT_KEY: &str = "Detailed Report";

const RULE_ID_KEYS: &[&str] = &["Rule", "RuleId", "CheckId"];

/// Maps the checker's status wording onto [`RuleStatus`].
/// Returns `None` for statuses that carry no finding (e.g. "Skipped").
pub fn parse_status(s: &str) -> Option<RuleStatus> {
    match s.trim() {
        "Passed" | "Passed manually" => Some(RuleStatus::Passed),
        "Failed" | "Failed manually" => Some(RuleStatus::Failed),
        "Needs manual check" => Some(RuleStatus::NeedsManualCheck),
        _ => None,
    }
}

pub(super) fn sections(value: &Value) -> Vec<Section> {
    let Some(detailed) = value.get(DETAILED_REPORT_KEY).and_then(Value::as_object) else {
        return Vec::new();
    };

    detailed
        .iter()
        .filter_map(|(name, entries)| {
            let entries = entries.as_array()?;
            let evaluations: Vec<RuleEvaluation> = entries
                .iter()
                .filter_map(|entry| evaluation(name, entry))
                .collect();
            Some(Section {
                name: name.clone(),
                evaluations,
            })
        })
        .collect()
}

fn evaluation(section: &str, entry: &Value) -> Option<RuleEvaluation> {
    let entry = entry.as_object()?;
    let rule_id = RULE_ID_KEYS
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))?;
    let raw_status = entry.get("Status").and_then(Value::as_str)?;
    let Some(status) = parse_status(raw_status) else {
        tracing::trace!(section, rule_id, raw_status, "Ignoring rule without a finding status");
        return None;
    };
    let description = entry
        .get("Description")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(RuleEvaluation {
        section: section.to_string(),
        rule_id: rule_id.to_string(),
        description: description.to_string(),
        status,
    })
}

pub(super) fn summary(value: &Value) -> Option<ReportSummary> {
    let summary = value.get(SUMMARY_KEY)?.as_object()?;
    let count = |key: &str| {
        summary
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Some(ReportSummary {
        passed: count("Passed"),
        failed: count("Failed"),
        needs_manual_check: count("Needs manual check"),
    })
}

pub(super) fn to_wire(sections: &[Section]) -> Value {
    let mut detailed = Map::new();
    for section in sections {
        let entries: Vec<Value> = section
            .evaluations
            .iter()
            .map(|e| {
                json!({
                    "Rule": e.rule_id,
                    "Status": e.status.to_string(),
                    "Description": e.description,
                })
            })
            .collect();
        detailed.insert(section.name.clone(), Value::Array(entries));
    }
    let mut root = Map::new();
    root.insert(DETAILED_REPORT_KEY.to_string(), Value::Object(detailed));
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_variants() {
        assert_eq!(parse_status("Passed"), Some(RuleStatus::Passed));
        assert_eq!(parse_status("Passed manually"), Some(RuleStatus::Passed));
        assert_eq!(parse_status("Failed manually"), Some(RuleStatus::Failed));
        assert_eq!(
            parse_status(" Needs manual check "),
            Some(RuleStatus::NeedsManualCheck)
        );
        assert_eq!(parse_status("Skipped"), None);
        assert_eq!(parse_status(""), None);
    }

    #[test]
    fn test_missing_description_defaults_to_empty() {
        let value = json!({"Detailed Report": {"Tables": [{"Rule": "Headers", "Status": "Failed"}]}});
        let sections = sections(&value);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].evaluations[0].description, "");
    }

    #[test]
    fn test_non_array_section_is_skipped() {
        let value = json!({"Detailed Report": {"Tables": {"Rule": "Headers"}, "Forms": []}});
        let sections = sections(&value);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "Forms");
    }
}
