//! Ticket references in commit messages

use regex::Regex;
use std::sync::OnceLock;

/// Footer marker for lines that may name tickets besides the subject line
pub const DEFAULT_FOOTER_MARKER: &str = "Ext-ref:";

static TICKET_RE: OnceLock<Regex> = OnceLock::new();

fn ticket_re() -> &'static Regex {
    TICKET_RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Z0-9_]+-[0-9]+\b").expect("valid ticket regex"))
}

/// Lines of a commit message that are allowed to name tickets: the subject
/// line, plus any line starting with the footer marker
pub fn scanned_lines<'a>(message: &'a str, footer_marker: &'a str) -> impl Iterator<Item = &'a str> {
    message
        .split('\n')
        .enumerate()
        .filter(move |(i, line)| *i == 0 || line.starts_with(footer_marker))
        .map(|(_, line)| line)
}

/// Extract ticket ids from free text, deduplicated in first-seen order
pub fn find_tickets(text: &str) -> Vec<String> {
    let mut tickets: Vec<String> = Vec::new();
    for m in ticket_re().find_iter(text) {
        if !tickets.iter().any(|t| t == m.as_str()) {
            tickets.push(m.as_str().to_string());
        }
    }
    tickets
}

/// Ticket ids named by a commit message
pub fn commit_tickets(message: &str, footer_marker: &str) -> Vec<String> {
    let mut tickets: Vec<String> = Vec::new();
    for line in scanned_lines(message, footer_marker) {
        for ticket in find_tickets(line) {
            if !tickets.contains(&ticket) {
                tickets.push(ticket);
            }
        }
    }
    tickets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_line_ticket() {
        assert_eq!(commit_tickets("CBD-1: fix\n", DEFAULT_FOOTER_MARKER), vec!["CBD-1"]);
    }

    #[test]
    fn test_ext_ref_footer_tickets() {
        let msg = "Fix the frobnicator\n\nLonger description.\n\nExt-ref: MB-123\nExt-ref: CBD-9 MB-123\n";
        assert_eq!(commit_tickets(msg, DEFAULT_FOOTER_MARKER), vec!["MB-123", "CBD-9"]);
    }

    #[test]
    fn test_body_tickets_are_ignored() {
        let msg = "Unrelated change\n\nThis mentions MB-55 in the body\nChange-Id: I1234\n";
        assert!(commit_tickets(msg, DEFAULT_FOOTER_MARKER).is_empty());
    }

    #[test]
    fn test_indented_footer_is_ignored() {
        let msg = "Subject\n  Ext-ref: MB-1\n";
        assert!(commit_tickets(msg, DEFAULT_FOOTER_MARKER).is_empty());
    }

    #[test]
    fn test_custom_footer_marker() {
        let msg = "Subject\nIssue: MB-7\nExt-ref: MB-8\n";
        assert_eq!(commit_tickets(msg, "Issue:"), vec!["MB-7"]);
    }

    #[test]
    fn test_find_tickets_patterns() {
        assert_eq!(
            find_tickets("MB-12345 [K8S-22] cbd-1 A-1 CBD-7a JCBC_X-3"),
            vec!["MB-12345", "K8S-22", "JCBC_X-3"]
        );
    }
}
