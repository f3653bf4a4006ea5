/// Pull a JSON object candidate out of free text: everything from the first
/// `{` to the last `}`, inclusive.
///
/// This is a deliberately greedy heuristic for model replies that wrap the
/// payload in prose or code fences. It is not a tolerant parser: stray braces
/// before or after the real payload end up inside the candidate and the
/// decode that follows will fail.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
