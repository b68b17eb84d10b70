/// Normalizes visible page text into a single line of words.
///
/// This function:
/// - Trims whitespace from each line
/// - Drops empty lines
/// - Collapses all remaining whitespace into single spaces
pub fn parse(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    split_into_paragraphs(text)
        .iter()
        .map(|lines| normalize_whitespace_in_segment(&lines.join(" ")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits text into paragraphs based on empty lines
pub fn split_into_paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(trimmed);
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

pub fn normalize_whitespace_in_segment(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
