//! Progressive degradation of a single piece of evidence under token
//! budget pressure: each level trades fidelity for size, in a fixed,
//! monotonically-decreasing order.

use codeintel_core::tokenizer::estimate_tokens;

/// How much a capsule's content has been reduced from its original form.
/// `0` is untouched; `4` means the item was skipped entirely.
pub const MAX_DEGRADE_LEVEL: u8 = 4;

/// Quality multiplier assigned at each degrade level, matching
/// [`MAX_DEGRADE_LEVEL`] + 1 entries.
const QUALITY_BY_LEVEL: [f32; 5] = [1.0, 0.8, 0.5, 0.25, 0.0];

pub fn quality_at_level(level: u8) -> f32 {
    QUALITY_BY_LEVEL[level.min(MAX_DEGRADE_LEVEL) as usize]
}

/// One piece of content that can be progressively degraded: full body
/// text plus the metadata that survives at deeper degrade levels.
#[derive(Debug, Clone)]
pub struct Capsule {
    pub full_content: String,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub name: Option<String>,
    pub path: String,
}

/// The outcome of degrading a capsule to a specific level: its rendered
/// text (empty at level 4), the quality score, and the estimated token
/// cost of that rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedItem {
    pub level: u8,
    pub content: String,
    pub quality_score: f32,
    pub tokens: i64,
}

/// A line that reads as a comment in most of the languages this engine
/// indexes; used only for the blunt level-1 strip, not language-aware
/// parsing.
fn looks_like_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with('*')
}

/// Render a capsule at a specific degrade level:
/// - 0: full content, untouched.
/// - 1: comment lines and blank lines stripped.
/// - 2: a capsule of signature + doc, dropping the body entirely.
/// - 3: an outline: path, name, and line count only.
/// - 4: empty.
fn render_at_level(capsule: &Capsule, level: u8) -> String {
    match level {
        0 => capsule.full_content.clone(),
        1 => capsule
            .full_content
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty() && !looks_like_comment(line))
            .collect::<Vec<_>>()
            .join("\n"),
        2 => {
            let mut parts = Vec::new();
            if let Some(sig) = &capsule.signature {
                parts.push(sig.clone());
            }
            if let Some(doc) = &capsule.doc {
                parts.push(doc.clone());
            }
            if parts.is_empty() {
                capsule.full_content.clone()
            } else {
                parts.join("\n")
            }
        }
        3 => {
            let line_count = capsule.full_content.lines().count();
            let name = capsule.name.as_deref().unwrap_or("<unnamed>");
            format!("{}: {} ({} lines)", capsule.path, name, line_count)
        }
        _ => String::new(),
    }
}

/// Render a capsule at `level` and compute its estimated token cost for
/// `model_id`.
pub fn degrade(capsule: &Capsule, level: u8, model_id: &str) -> DegradedItem {
    let level = level.min(MAX_DEGRADE_LEVEL);
    let content = render_at_level(capsule, level);
    let tokens = estimate_tokens(&content, model_id) as i64;
    DegradedItem {
        level,
        content,
        quality_score: quality_at_level(level),
        tokens,
    }
}

/// Find the least-degraded level (the one with the highest quality) of
/// `capsule` whose token cost fits within `remaining_budget`. Always
/// returns a result since level 4 costs zero tokens.
pub fn degrade_to_fit(capsule: &Capsule, remaining_budget: i64, model_id: &str) -> DegradedItem {
    for level in 0..=MAX_DEGRADE_LEVEL {
        let candidate = degrade(capsule, level, model_id);
        if candidate.tokens <= remaining_budget {
            return candidate;
        }
    }
    degrade(capsule, MAX_DEGRADE_LEVEL, model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Capsule {
        Capsule {
            full_content:
                "// dispatches the request\nfn handle(req: Request) -> Response {\n\n    do_work(req)\n}\n"
                    .to_string(),
            signature: Some("fn handle(req: Request) -> Response".to_string()),
            doc: Some("Dispatches an inbound request to its handler.".to_string()),
            name: Some("handle".to_string()),
            path: "src/handler.rs".to_string(),
        }
    }

    #[test]
    fn level_one_strips_comments_and_blank_lines() {
        let capsule = sample();
        let out = degrade(&capsule, 1, "claude");
        assert!(!out.content.contains("// dispatches"));
        assert!(out.content.contains("fn handle"));
    }

    #[test]
    fn level_three_is_a_path_name_line_count_outline() {
        let capsule = sample();
        let out = degrade(&capsule, 3, "claude");
        assert!(out.content.contains("src/handler.rs"));
        assert!(out.content.contains("handle"));
    }

    #[test]
    fn level_zero_is_untouched() {
        let capsule = sample();
        let out = degrade(&capsule, 0, "claude");
        assert_eq!(out.content, capsule.full_content);
        assert_eq!(out.quality_score, 1.0);
    }

    #[test]
    fn level_four_is_empty_and_zero_quality() {
        let capsule = sample();
        let out = degrade(&capsule, 4, "claude");
        assert!(out.content.is_empty());
        assert_eq!(out.quality_score, 0.0);
        assert_eq!(out.tokens, 0);
    }

    #[test]
    fn quality_strictly_decreases_with_level() {
        let mut prev = f32::INFINITY;
        for level in 0..=MAX_DEGRADE_LEVEL {
            let q = quality_at_level(level);
            assert!(q <= prev);
            prev = q;
        }
    }

    #[test]
    fn degrade_to_fit_picks_first_level_within_budget() {
        let capsule = sample();
        let full = degrade(&capsule, 0, "claude");
        let fit = degrade_to_fit(&capsule, full.tokens, "claude");
        assert_eq!(fit.level, 0);
    }

    #[test]
    fn degrade_to_fit_falls_all_the_way_to_skip_under_zero_budget() {
        let capsule = sample();
        let fit = degrade_to_fit(&capsule, 0, "claude");
        assert_eq!(fit.level, MAX_DEGRADE_LEVEL);
        assert_eq!(fit.tokens, 0);
    }

    #[test]
    fn out_of_range_level_clamps_to_max() {
        let capsule = sample();
        let out = degrade(&capsule, 9, "claude");
        assert_eq!(out.level, MAX_DEGRADE_LEVEL);
    }
}
