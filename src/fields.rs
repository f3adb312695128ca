//! Detail table label mapping.
//!
//! Each row of the detail table is a label cell and a value cell. The label
//! selects a [`FieldRule`]; labels without a rule are ignored.

use crate::record::PublicationRecord;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid digits regex"));
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid link selector"));

/// Setter for one output field. Returns `false` when the value could not be
/// transformed; the field is then left unset.
pub type Apply = fn(&mut PublicationRecord, ElementRef<'_>) -> bool;

/// Maps one detail-table label onto an output field.
pub struct FieldRule {
    /// Label text exactly as shown in the table
    pub label: &'static str,
    /// Output field written by `apply`
    pub field: &'static str,
    pub apply: Apply,
}

/// All recognized labels. "Journal" and "Conference" share a target, so the
/// later row in the document wins.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule { label: "Authors", field: "authors", apply: set_authors },
    FieldRule { label: "Publication date", field: "date", apply: set_date },
    FieldRule { label: "Journal", field: "journal", apply: set_journal },
    FieldRule { label: "Conference", field: "journal", apply: set_journal },
    FieldRule { label: "Volume", field: "volume", apply: set_volume },
    FieldRule { label: "Pages", field: "pages", apply: set_pages },
    FieldRule { label: "Publisher", field: "publisher", apply: set_publisher },
    FieldRule { label: "Description", field: "description", apply: set_description },
    FieldRule { label: "Total citations", field: "citations", apply: set_citations },
];

/// Rule for an exact label match.
pub fn rule_for(label: &str) -> Option<&'static FieldRule> {
    FIELD_RULES.iter().find(|rule| rule.label == label)
}

fn set_authors(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.authors = Some(split_authors(&cell_text(value)));
    true
}

fn set_date(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.date = parse_date(&cell_text(value));
    record.date.is_some()
}

fn set_journal(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.journal = Some(cell_text(value));
    true
}

fn set_volume(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.volume = Some(cell_text(value));
    true
}

fn set_pages(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.pages = Some(cell_text(value));
    true
}

fn set_publisher(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.publisher = Some(cell_text(value));
    true
}

fn set_description(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    record.description = Some(strip_tags(&value.inner_html()));
    true
}

fn set_citations(record: &mut PublicationRecord, value: ElementRef<'_>) -> bool {
    // The cell holds a "Cited by N" link followed by a per-year chart.
    let label = value
        .select(&LINK_SEL)
        .next()
        .map(|a| a.text().collect::<String>())
        .unwrap_or_else(|| cell_text(value));
    record.citations = first_number(&label);
    record.citations.is_some()
}

/// Text content of a table cell.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// "A Author, B Author" -> ["A Author", "B Author"]
pub fn split_authors(text: &str) -> Vec<String> {
    text.split(", ").map(str::to_string).collect()
}

/// "2019/4/12" -> [2019, 4, 12]; `None` if any part is not a number.
pub fn parse_date(text: &str) -> Option<Vec<i32>> {
    text.split('/').map(|part| part.trim().parse().ok()).collect()
}

/// Remove markup, keeping the text between tags.
pub fn strip_tags(html: &str) -> String {
    decode_entities(&TAG_RE.replace_all(html, "")).trim().to_string()
}

/// First run of digits in `text`.
pub fn first_number(text: &str) -> Option<u64> {
    DIGITS_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn apply_label(record: &mut PublicationRecord, label: &str, value_html: &str) -> Option<bool> {
        let html = Html::parse_fragment(&format!(r#"<div class="gsc_oci_value">{}</div>"#, value_html));
        let selector = Selector::parse("div.gsc_oci_value").expect("selector");
        let cell = html.select(&selector).next().expect("value cell");
        rule_for(label).map(|rule| (rule.apply)(record, cell))
    }

    #[test]
    fn test_every_label_is_unique() {
        for (i, rule) in FIELD_RULES.iter().enumerate() {
            assert!(
                FIELD_RULES[i + 1..].iter().all(|other| other.label != rule.label),
                "duplicate label {}",
                rule.label
            );
        }
    }

    #[test]
    fn test_unknown_label_has_no_rule() {
        assert!(rule_for("Scholar articles").is_none());
        assert!(rule_for("authors").is_none());
        assert_eq!(rule_for("Conference").map(|r| r.field), Some("journal"));
    }

    #[test]
    fn test_split_authors_keeps_order() {
        assert_eq!(
            split_authors("Ada Lovelace, Charles Babbage, Alan Turing"),
            vec!["Ada Lovelace", "Charles Babbage", "Alan Turing"]
        );
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2019/4/12"), Some(vec![2019, 4, 12]));
        assert_eq!(parse_date("2021"), Some(vec![2021]));
        assert_eq!(parse_date("2021/spring"), None);
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Abstract: <b>foo</b> bar</p>"), "Abstract: foo bar");
        assert_eq!(strip_tags("No tags"), "No tags");
        assert_eq!(strip_tags("<i>A</i> &amp; B"), "A & B");
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("Cited by 42"), Some(42));
        assert_eq!(first_number("Cited by 7 and 2019"), Some(7));
        assert_eq!(first_number("Cited by"), None);
    }

    #[test]
    fn test_citations_from_nested_link() {
        let mut record = PublicationRecord::default();
        let applied = apply_label(
            &mut record,
            "Total citations",
            r#"<div style="margin-bottom:1em"><a href="/scholar?cites=1">Cited by 42</a></div><div id="gsc_oci_graph_bars"><span class="gsc_oci_g_t">2019</span><a class="gsc_oci_g_a"><span class="gsc_oci_g_al">5</span></a></div>"#,
        );
        assert_eq!(applied, Some(true));
        assert_eq!(record.citations, Some(42));
    }

    #[test]
    fn test_citations_shared_selector_across_rows() {
        for n in [3_u64, 17, 256] {
            let mut record = PublicationRecord::default();
            let cell = format!(r#"<a href="/scholar?cites={n}">Cited by {n}</a>"#);
            assert_eq!(apply_label(&mut record, "Total citations", &cell), Some(true));
            assert_eq!(record.citations, Some(n));
        }

        let mut record = PublicationRecord::default();
        assert_eq!(apply_label(&mut record, "Total citations", "Cited by 9"), Some(true));
        assert_eq!(record.citations, Some(9));
    }

    #[test]
    fn test_citations_without_digits_leaves_field_unset() {
        let mut record = PublicationRecord::default();
        let applied = apply_label(&mut record, "Total citations", r##"<div><a href="#">Cited by</a></div>"##);
        assert_eq!(applied, Some(false));
        assert_eq!(record.citations, None);
    }

    #[test]
    fn test_description_is_stripped() {
        let mut record = PublicationRecord::default();
        apply_label(
            &mut record,
            "Description",
            r#"<div class="gsh_small"><div class="gsh_csp">Abstract: <b>foo</b> bar</div></div>"#,
        );
        assert_eq!(record.description.as_deref(), Some("Abstract: foo bar"));
    }

    #[test]
    fn test_conference_and_journal_share_field() {
        let mut record = PublicationRecord::default();
        apply_label(&mut record, "Journal", "Journal of Tests");
        apply_label(&mut record, "Conference", "Conference on Tests");
        assert_eq!(record.journal.as_deref(), Some("Conference on Tests"));
    }
}
