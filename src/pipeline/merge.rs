//! Multi-page merging: combine per-page extraction records into one
//! document-level record.
//!
//! The merge is deterministic for a fixed page ordering and never loses
//! entity data: every entity present in at least one page record appears in
//! the merged record, deduplicated by an explicit keyed set built
//! incrementally (linear time, first occurrence wins). Error placeholder
//! pages participate like any other page — their zero confidence drags the
//! average down and their `"Error"` document type competes in the vote like
//! every other type.

use crate::output::{Entity, MergedRecord, PageRecord};
use std::collections::HashSet;

/// How many per-page summaries the synthesised document summary quotes.
const SUMMARY_QUOTED_PAGES: usize = 3;

/// Merge analysis results from all pages into a single document record.
///
/// * 0 pages → a document-level error record (`document_type = "Error"`,
///   zero confidence, empty collections).
/// * 1 page → that record unchanged, plus `total_pages = 1` and a
///   singleton page list.
/// * N pages → document type by confidence-weighted majority vote, mean
///   confidence, first non-null title, synthesised summary, deduplicated
///   entity unions, OR-ed signature flag.
pub fn merge_page_records(pages: Vec<PageRecord>) -> MergedRecord {
    if pages.is_empty() {
        return MergedRecord {
            document_type: "Error".to_string(),
            confidence: 0.0,
            title: None,
            summary: Some("No content available".to_string()),
            people: Vec::new(),
            organizations: Vec::new(),
            locations: Vec::new(),
            dates: Vec::new(),
            numbers: Vec::new(),
            signature_detected: false,
            total_pages: 0,
            pages: Vec::new(),
            error: Some("No pages analyzed".to_string()),
        };
    }

    if pages.len() == 1 {
        let page = &pages[0];
        return MergedRecord {
            document_type: page.document_type.clone(),
            confidence: page.confidence,
            title: page.title.clone(),
            summary: page.summary.clone(),
            people: page.people.clone(),
            organizations: page.organizations.clone(),
            locations: page.locations.clone(),
            dates: page.dates.clone(),
            numbers: page.numbers.clone(),
            signature_detected: page.signature_detected,
            total_pages: 1,
            error: page.error.clone(),
            pages,
        };
    }

    let document_type = vote_document_type(&pages);
    let confidence = round2(
        pages.iter().map(|p| p.confidence).sum::<f64>() / pages.len() as f64,
    );
    let title = pages.iter().find_map(|p| p.title.clone());
    let summary = synthesise_summary(&pages);

    MergedRecord {
        document_type,
        confidence,
        title,
        summary: Some(summary),
        people: dedup_union(&pages, |p| &p.people),
        organizations: dedup_union(&pages, |p| &p.organizations),
        locations: dedup_union(&pages, |p| &p.locations),
        dates: dedup_union(&pages, |p| &p.dates),
        numbers: dedup_union(&pages, |p| &p.numbers),
        signature_detected: pages.iter().any(|p| p.signature_detected),
        total_pages: pages.len(),
        error: None,
        pages,
    }
}

/// Confidence-weighted majority vote over the per-page document types.
///
/// Each type group scores `count × average(confidence)`; the highest score
/// wins, with ties broken by whichever group was encountered first in page
/// order (strict `>` on a first-encounter-ordered scan).
fn vote_document_type(pages: &[PageRecord]) -> String {
    // (type, count, summed confidence), in first-encounter order.
    let mut groups: Vec<(&str, usize, f64)> = Vec::new();
    for page in pages {
        match groups.iter_mut().find(|(t, _, _)| *t == page.document_type) {
            Some((_, count, total)) => {
                *count += 1;
                *total += page.confidence;
            }
            None => groups.push((&page.document_type, 1, page.confidence)),
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for &(doc_type, count, total) in &groups {
        let average = total / count as f64;
        let score = count as f64 * average;
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((doc_type, score)),
        }
    }
    best.map(|(t, _)| t.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Document summary: page count plus the first few per-page summaries.
fn synthesise_summary(pages: &[PageRecord]) -> String {
    let page_summaries: Vec<String> = pages
        .iter()
        .filter_map(|p| {
            p.summary
                .as_ref()
                .map(|s| format!("Page {}: {}", p.page_number, s))
        })
        .collect();

    let mut summary = format!("Multi-page document with {} pages. ", pages.len());
    summary.push_str(
        &page_summaries
            .iter()
            .take(SUMMARY_QUOTED_PAGES)
            .cloned()
            .collect::<Vec<_>>()
            .join(" | "),
    );
    if page_summaries.len() > SUMMARY_QUOTED_PAGES {
        summary.push_str(&format!(
            " ... and {} more pages",
            page_summaries.len() - SUMMARY_QUOTED_PAGES
        ));
    }
    summary
}

/// Union one entity collection across all pages, deduplicated by key.
///
/// First occurrence (in page order) wins; entities without a usable key are
/// carried through untouched — they cannot be deduplicated, but they are
/// never dropped.
fn dedup_union<'a, F>(pages: &'a [PageRecord], select: F) -> Vec<Entity>
where
    F: Fn(&'a PageRecord) -> &'a [Entity],
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for page in pages {
        for entity in select(page) {
            match entity.dedup_key() {
                Some(key) => {
                    if seen.insert(key) {
                        out.push(entity.clone());
                    }
                }
                None => out.push(entity.clone()),
            }
        }
    }
    out
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
