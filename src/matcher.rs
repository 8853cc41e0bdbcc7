/// Similarity a candidate must reach for the "View My Record" lookup.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// Lowercase and drop spaces and periods, so `"A Smith"`, `"a.smith"` and
/// `"A. Smith"` all compare as `"asmith"`. Tabs and other whitespace are kept
/// as ordinary characters.
pub fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| *c != ' ' && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized local-part of an email: everything before the first `@`, run
/// through [`normalize_name`]. An address without `@` is used whole.
pub fn email_local_part(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    normalize_name(local)
}

/// Length of the longest common subsequence of `a` and `b`, compared
/// character by character.
///
/// Classic dynamic-programming table of `(len(a)+1) x (len(b)+1)` cells, so
/// time and memory are both `O(len(a) * len(b))`. Fine for person names and
/// email handles; do not feed it long text.
pub fn lcs_length(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    dp[a.len()][b.len()]
}

/// `lcs_length(a, b) / max(len(a), len(b))`, in `[0, 1]`.
///
/// `None` when both inputs are empty: there is nothing to compare, and the
/// caller must treat it as "no match" rather than a perfect score.
pub fn similarity(a: &str, b: &str) -> Option<f64> {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return None;
    }
    Some(lcs_length(a, b) as f64 / max_len as f64)
}
