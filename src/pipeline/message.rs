use crate::feed::Entry;

/// One message listing every new entry under a header line.
///
/// ```text
/// <header>
///
/// • [<title>](<link>) (<publish date>)
/// ```
pub fn summary_message(header: &str, entries: &[Entry]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .map(|e| format!("• [{}]({}) ({})", e.title, e.link, e.publish_date))
        .collect();
    format!("{}\n\n{}", header, lines.join("\n"))
}

/// Message sent when a run fails before it can report new entries.
///
/// `failure` names what went wrong in a few words, `cause` carries the error.
pub fn failure_message(source_name: &str, failure: &str, cause: &str) -> String {
    format!("⚠️ {}: {}\n{}", source_name, failure, cause)
}
