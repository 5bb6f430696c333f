/// Product-name similarity gate.
///
/// Passes when either lower-cased name contains the other, or when at least
/// `threshold` of the criterion's words overlap some offer word (a word
/// overlaps when either contains the other). A criterion without words never
/// passes. Offer names are never blank here: the mapper and the API reject
/// them before matching.
pub fn names_match(offer_name: &str, criterion_name: &str, threshold: f64) -> bool {
    let offer_lower = offer_name.to_lowercase();
    let criterion_lower = criterion_name.to_lowercase();

    let criterion_words: Vec<&str> = criterion_lower.split_whitespace().collect();
    if criterion_words.is_empty() {
        return false;
    }

    if offer_lower.contains(criterion_lower.as_str()) || criterion_lower.contains(offer_lower.as_str()) {
        return true;
    }

    let offer_words: Vec<&str> = offer_lower.split_whitespace().collect();
    let matched = criterion_words
        .iter()
        .filter(|cw| offer_words.iter().any(|ow| ow.contains(*cw) || cw.contains(ow)))
        .count();

    matched as f64 / criterion_words.len() as f64 >= threshold
}
