//! Heuristic structured-field extraction for discount documents.
//!
//! A pure text-to-record function with no I/O: scans for recognizable
//! markers (discount percentage, category label, redemption code, usage
//! instructions, bonus terms) and falls back to a whole-document record when
//! none are present, so every document yields at least one searchable
//! record.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{DiscountRecord, DocumentDescriptor, ExtractedDocument};

const HOW_TO_MAX_LEN: usize = 150;

static DISCOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\d{1,3})\s*%\s*(?:off|discount)",
        r"(?i)(?:save|get)\s*(\d{1,3})\s*%",
        r"(\d{1,3})\s*%",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hard-coded pattern compiles"))
    .collect()
});

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:code|id|enter|use)\b[\s:]*([A-Z0-9][A-Z0-9-]{2,})")
        .expect("hard-coded pattern compiles")
});

static BONUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:bonus|extra|additional)\b[\s:]+([^.\n]+)",
        r"(?i)\bplus\b[\s:]+([^.\n]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hard-coded pattern compiles"))
    .collect()
});

static CATEGORY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*category\s*:\s*(.+)$").expect("hard-coded pattern compiles")
});

/// Keyword table for category inference, checked in order against the
/// normalized text.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Travel",
        &[
            "hotel",
            "flight",
            "airline",
            "travel",
            "hertz",
            "expedia",
            "delta",
            "southwest",
        ],
    ),
    (
        "Dining",
        &[
            "restaurant",
            "food",
            "cafe",
            "dining",
            "starbucks",
            "olive",
            "chipotle",
        ],
    ),
    (
        "Retail",
        &[
            "store",
            "shop",
            "retail",
            "target",
            "best buy",
            "home depot",
            "amazon",
        ],
    ),
    ("Tech", &["software", "tech", "apple", "microsoft", "adobe"]),
    ("Entertainment", &["movie", "netflix", "disney", "amc"]),
    (
        "Health & Wellness",
        &["gym", "wellness", "fitness", "spa", "cvs"],
    ),
    ("Finance", &["bank", "insurance", "schwab", "state farm"]),
];

pub const FALLBACK_CATEGORY: &str = "Other";

/// Build the discount record for one extracted document.
pub fn build_record(descriptor: &DocumentDescriptor, doc: &ExtractedDocument) -> DiscountRecord {
    let discount_value = extract_discount(&doc.display_text);
    let code = extract_code(&doc.display_text);
    let bonus = extract_bonus(&doc.display_text);
    let how_to = extract_how_to_use(&doc.display_text);
    let category_marker = extract_category_marker(&doc.display_text);

    let structured = discount_value.is_some()
        || code.is_some()
        || bonus.is_some()
        || how_to.is_some()
        || category_marker.is_some();

    let category = category_marker
        .or_else(|| infer_category(&doc.normalized_text).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());

    let name = if structured {
        first_nonempty_line(&doc.display_text).unwrap_or_else(|| document_title(descriptor))
    } else {
        document_title(descriptor)
    };

    let how_to_use = how_to.unwrap_or_else(|| default_how_to_use(&category).to_string());

    DiscountRecord {
        id: format!("{}#0", descriptor.id),
        name,
        discount_value,
        category,
        code,
        how_to_use,
        bonus,
        source_document_id: descriptor.id.clone(),
        raw_text: doc.normalized_text.clone(),
    }
}

fn extract_discount(text: &str) -> Option<String> {
    DISCOUNT_PATTERNS
        .iter()
        .find_map(|p| p.captures(text))
        .map(|c| format!("{}%", &c[1]))
}

fn extract_code(text: &str) -> Option<String> {
    CODE_PATTERN.captures(text).map(|c| c[1].to_string())
}

fn extract_bonus(text: &str) -> Option<String> {
    BONUS_PATTERNS
        .iter()
        .find_map(|p| p.captures(text))
        .map(|c| c[1].trim().to_string())
        .filter(|b| !b.is_empty())
}

fn extract_category_marker(text: &str) -> Option<String> {
    CATEGORY_MARKER
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|c| !c.is_empty())
}

/// The "how to" line and its successor, truncated.
fn extract_how_to_use(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let index = lines
        .iter()
        .position(|line| line.to_lowercase().contains("how to"))?;

    let mut joined = lines[index].trim().to_string();
    if let Some(next) = lines.get(index + 1) {
        if !next.trim().is_empty() {
            joined.push(' ');
            joined.push_str(next.trim());
        }
    }
    Some(joined.chars().take(HOW_TO_MAX_LEN).collect())
}

/// First category whose keyword appears in the normalized text.
fn infer_category(normalized_text: &str) -> Option<&'static str> {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| normalized_text.contains(kw)))
        .map(|(category, _)| *category)
}

fn default_how_to_use(category: &str) -> &'static str {
    match category {
        "Travel" => "Visit the provider's website or call to book with your discount code",
        "Dining" => "Present the offer at the restaurant or book online",
        "Retail" => "Shop online or in-store with the code",
        _ => "Contact the provider for discount details",
    }
}

fn first_nonempty_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Record name for the whole-document fallback: the file stem with
/// separators spaced out.
fn document_title(descriptor: &DocumentDescriptor) -> String {
    let stem = std::path::Path::new(&descriptor.name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| descriptor.name.clone());
    stem.replace(['_', '-'], " ")
}
