//! ASCII case-insensitive byte replacement with `str_ireplace` semantics.

/// Position of the first case-insensitive match of `needle` at or after
/// `from`. An empty needle never matches.
pub fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let last = haystack.len() - needle.len();
    let first = needle[0].to_ascii_lowercase();
    (from..=last).find(|&i| {
        haystack[i].to_ascii_lowercase() == first
            && haystack[i..i + needle.len()].eq_ignore_ascii_case(needle)
    })
}

pub fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    find_ignore_ascii_case(haystack, needle, 0).is_some()
}

/// Replaces every non-overlapping match, scanning left to right. Returns the
/// new bytes and the number of replacements.
pub fn ireplace(subject: &[u8], search: &[u8], replace: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(subject.len());
    let mut count = 0;
    let mut pos = 0;
    while let Some(i) = find_ignore_ascii_case(subject, search, pos) {
        out.extend_from_slice(&subject[pos..i]);
        out.extend_from_slice(replace);
        pos = i + search.len();
        count += 1;
    }
    out.extend_from_slice(&subject[pos..]);
    (out, count)
}

/// Applies each pair in order over the output of the previous one.
pub fn ireplace_pairs<'a, I>(subject: &[u8], pairs: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let mut current = subject.to_vec();
    for (search, replace) in pairs {
        if contains_ignore_ascii_case(&current, search) {
            current = ireplace(&current, search, replace).0;
        }
    }
    current
}
