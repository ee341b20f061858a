/// Shell-style matching over bytes.
///
/// `?` matches exactly one byte and `*` any run of bytes, including none.
/// Every other byte matches itself. Matching is anchored at both ends.
///
/// # Example
///
/// ```
/// # use kiln::resource::wildcard::matches;
/// assert!(matches(b"/te?p", b"/temp"));
/// assert!(!matches(b"/te?p", b"/tep"));
/// assert!(matches(b"/img/*.png", b"/img/a/b.png"));
/// ```
pub fn matches(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position after the last `*` and the text offset it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    backtrack = Some((star_p, t));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
