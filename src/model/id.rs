/// Parent ID derived by dropping the trailing segment. `None` for top-level IDs.
pub fn parent_id(id: &str) -> Option<&str> {
    id.rfind('.').map(|pos| &id[..pos])
}

/// All ancestor IDs, nearest first: `2.3.1` → `["2.3", "2"]`
pub fn ancestors(id: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = id;
    while let Some(parent) = parent_id(current) {
        out.push(parent);
        current = parent;
    }
    out
}

/// Nesting depth: number of dots in the ID
pub fn depth(id: &str) -> usize {
    id.matches('.').count()
}

/// True when `candidate` is `ancestor` itself or lies beneath it
pub fn is_self_or_descendant(candidate: &str, ancestor: &str) -> bool {
    candidate == ancestor
        || (candidate.len() > ancestor.len()
            && candidate.starts_with(ancestor)
            && candidate.as_bytes()[ancestor.len()] == b'.')
}

/// Numeric value of the last segment, if it is a number
pub fn last_number(id: &str) -> Option<u64> {
    id.rsplit('.').next()?.parse().ok()
}

/// Compare two IDs segment by segment, numerically where possible.
/// `2` < `10`, `2.9` < `2.10`.
pub fn compare(a: &str, b: &str) -> std::cmp::Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => l.cmp(r),
                };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn parent_of_nested_id() {
        assert_eq!(parent_id("2.3.1"), Some("2.3"));
        assert_eq!(parent_id("2.3"), Some("2"));
        assert_eq!(parent_id("2"), None);
    }

    #[test]
    fn ancestors_nearest_first() {
        assert_eq!(ancestors("2.3.1"), vec!["2.3", "2"]);
        assert!(ancestors("7").is_empty());
    }

    #[test]
    fn descendant_check_respects_segment_boundaries() {
        assert!(is_self_or_descendant("1.2", "1"));
        assert!(is_self_or_descendant("1", "1"));
        assert!(!is_self_or_descendant("10", "1"));
        assert!(!is_self_or_descendant("1", "1.2"));
    }

    #[test]
    fn numeric_compare() {
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("2.10", "2.9"), Ordering::Greater);
        assert_eq!(compare("3", "3.1"), Ordering::Less);
        assert_eq!(compare("4.1", "4.1"), Ordering::Equal);
    }

    #[test]
    fn depth_counts_dots() {
        assert_eq!(depth("1"), 0);
        assert_eq!(depth("1.2.3"), 2);
        assert_eq!(last_number("1.12"), Some(12));
    }
}
