// String similarity helpers shared by the free-text extractor and the
// MRZ/free-text arbitration.

/// Classic Levenshtein edit distance over chars.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    if s1 == s2 {
        return 0;
    }

    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    // Two rolling rows are enough
    let mut prev: Vec<usize> = (0..=len2).collect();
    let mut curr = vec![0; len2 + 1];

    for i in 1..=len1 {
        curr[0] = i;
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[len2]
}

/// Two OCR readings of the same word are "similar" when their edit distance
/// is at most 40% of the longer one, or when at least 3 of their first 4
/// characters agree position by position.
pub fn is_similar(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let longest = a.chars().count().max(b.chars().count());
    let distance = levenshtein_distance(a, b);
    if distance as f64 <= longest as f64 * 0.4 {
        return true;
    }

    let prefix_matches = a
        .chars()
        .take(4)
        .zip(b.chars().take(4))
        .filter(|(x, y)| x == y)
        .count();

    prefix_matches >= 3
}
