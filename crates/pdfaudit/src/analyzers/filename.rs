use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tempfile::NamedTempFile;

use crate::pipeline::{
    Analyzer, AnalyzerError, IdentifyFinding, IdentifyResult, PipelineContext, ResolveResult,
};
use crate::report::RuleStatus;

use super::DOCUMENT_SECTION;

pub const FILENAME_MISMATCH_CODE: &str = "document.filename_mismatch";

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "for", "in", "on", "to", "with",
];
const SUGGESTION_STOP_WORDS: &[&str] = &["the", "and", "for", "with"];
const SUGGESTION_MAX_WORDS: usize = 4;

/// Verdict of comparing a filename with a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilenameCheck {
    pub valid: bool,
    pub reason: &'static str,
}

fn words(text: &str) -> Vec<String> {
    RE_WORD
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A filename mirrors its heading when it is hyphen-separated and shares
/// at least two significant words with it.
pub fn validate_filename(filename: &str, heading: &str) -> FilenameCheck {
    let filename_words: HashSet<String> = words(filename).into_iter().collect();
    let heading_words: HashSet<String> = words(heading)
        .into_iter()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect();

    let matches = filename_words.intersection(&heading_words).count();
    let hyphenated = filename.contains('-');

    if matches >= 2 && hyphenated {
        FilenameCheck {
            valid: true,
            reason: "Filename matches H1 heading pattern",
        }
    } else if !hyphenated {
        FilenameCheck {
            valid: false,
            reason: "Filename should use hyphen separation",
        }
    } else {
        FilenameCheck {
            valid: false,
            reason: "Filename doesn't contain enough words from the H1 heading",
        }
    }
}

/// Lowercase, hyphen-separated name built from the heading's first
/// significant words. `None` when the heading has none.
pub fn suggest_filename(heading: &str) -> Option<String> {
    let picked: Vec<String> = words(heading)
        .into_iter()
        .filter(|w| w.chars().count() > 2 && !SUGGESTION_STOP_WORDS.contains(&w.as_str()))
        .take(SUGGESTION_MAX_WORDS)
        .collect();
    (!picked.is_empty()).then(|| picked.join("-"))
}

fn current_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Checks that the filename reflects the H1 heading and, on resolve,
/// stages a renamed copy of the PDF.
pub struct FilenameFromHeading;

impl FilenameFromHeading {
    fn stage_copy(&self, ctx: &PipelineContext, file_name: &str) -> Result<std::path::PathBuf, AnalyzerError> {
        let target_dir = ctx.output_dir.join(self.name());
        std::fs::create_dir_all(&target_dir).map_err(|e| AnalyzerError::io(&target_dir, e))?;
        let target = target_dir.join(file_name);

        let mut source = File::open(&ctx.pdf_path).map_err(|e| AnalyzerError::io(&ctx.pdf_path, e))?;
        let mut staged = NamedTempFile::new_in(&target_dir).map_err(|e| AnalyzerError::io(&target_dir, e))?;
        std::io::copy(&mut source, staged.as_file_mut()).map_err(|e| AnalyzerError::io(staged.path(), e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| AnalyzerError::io(staged.path(), e))?;
        staged
            .persist(&target)
            .map_err(|e| AnalyzerError::io(&target, e.error))?;
        Ok(target)
    }
}

impl Analyzer for FilenameFromHeading {
    fn name(&self) -> &str {
        "filename-from-h1"
    }

    fn title(&self) -> &str {
        "Filename Mirrors H1"
    }

    fn description(&self) -> &str {
        "Flags PDFs whose filenames do not align with the detected H1 heading and proposes fixes."
    }

    fn identify(&self, ctx: &PipelineContext) -> Result<IdentifyResult, AnalyzerError> {
        let Some(heading) = ctx.heading_text() else {
            return Ok(IdentifyResult::clean(
                "Skipped filename validation because the document has no detectable H1 heading.",
            ));
        };

        let current = current_stem(&ctx.pdf_path);
        let check = validate_filename(&current, heading);
        if check.valid {
            return Ok(IdentifyResult::clean(
                "Filename already reflects the detected H1 heading.",
            ));
        }

        let pages = ctx.available_pages();
        if pages.is_empty() {
            return Ok(IdentifyResult::clean(
                "Filename does not reflect the H1 heading, but no page was checked to attribute it to.",
            ));
        }

        let mut detail = format!(
            "The filename '{}' should use hyphen-separated keywords taken from the H1 heading. Reason: {}.",
            current, check.reason
        );
        if let Some(suggestion) = suggest_filename(heading) {
            detail.push_str(&format!(" Suggested: {}.pdf", suggestion));
        }

        let finding = IdentifyFinding::new(
            DOCUMENT_SECTION,
            FILENAME_MISMATCH_CODE,
            "Filename does not incorporate terms from the H1 heading",
            RuleStatus::Failed,
        )
        .with_detail(detail)
        .on_pages(pages);

        Ok(IdentifyResult::with_findings(
            vec![finding],
            "Filename is missing H1-derived keywords and hyphenation.",
        ))
    }

    fn supports_resolve(&self) -> bool {
        true
    }

    fn resolve(
        &self,
        ctx: &PipelineContext,
        _identified: &IdentifyResult,
    ) -> Result<ResolveResult, AnalyzerError> {
        let heading = ctx.heading_text().ok_or_else(|| {
            AnalyzerError::Failed("Cannot resolve filename without an H1 heading".to_string())
        })?;

        if validate_filename(&current_stem(&ctx.pdf_path), heading).valid {
            return Ok(ResolveResult::not_applied(
                "Filename already reflects the H1 heading",
            ));
        }

        let suggestion = suggest_filename(heading).ok_or_else(|| {
            AnalyzerError::Failed("H1 heading has no words usable in a filename".to_string())
        })?;
        let file_name = format!("{}.pdf", suggestion);
        let target = self.stage_copy(ctx, &file_name)?;

        tracing::info!(target = %target.display(), "Staged renamed copy");
        Ok(ResolveResult::applied(
            target,
            format!("Suggested renaming file to {}", file_name),
        ))
    }
}
