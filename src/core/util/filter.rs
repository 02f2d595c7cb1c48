use regex::RegexBuilder;

/// Items that expose a name for fuzzy matching.
pub trait HasName {
    fn name(&self) -> &str;
}

fn build_regex(keyword: &str) -> Option<regex::Regex> {
    RegexBuilder::new(keyword)
        .case_insensitive(true)
        .ignore_whitespace(true)
        .build()
        .ok()
}

/// Case-insensitive regex match of `keyword` against `name`.
/// An invalid pattern matches nothing.
pub fn matches_fuzzy(name: &str, keyword: &str) -> bool {
    match build_regex(keyword) {
        Some(re) => re.is_match(name),
        None => false,
    }
}

/// Keep the items whose name matches `keyword`. An empty keyword keeps everything.
pub fn filter_by_fuzzy_name<T: HasName>(items: Vec<T>, keyword: &str) -> Vec<T> {
    let Some(re) = build_regex(keyword) else {
        return Vec::new();
    };
    items.into_iter().filter(|item| re.is_match(item.name())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl HasName for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_case_insensitive_match() {
        let items = vec![Named("GPU-Node-1"), Named("cpu-node"), Named("gpu-node-2")];
        let out = filter_by_fuzzy_name(items, "gpu");
        let names: Vec<&str> = out.iter().map(|n| n.0).collect();
        assert_eq!(names, vec!["GPU-Node-1", "gpu-node-2"]);
    }

    #[test]
    fn test_empty_keyword_keeps_all() {
        let items = vec![Named("a"), Named("b")];
        assert_eq!(filter_by_fuzzy_name(items, "").len(), 2);
    }

    #[test]
    fn test_regex_keyword() {
        assert!(matches_fuzzy("worker-12", "^worker-\\d+$"));
        assert!(!matches_fuzzy("master-1", "^worker"));
    }

    #[test]
    fn test_invalid_regex_matches_nothing() {
        let items = vec![Named("a(b")];
        assert!(filter_by_fuzzy_name(items, "a(").is_empty());
        assert!(!matches_fuzzy("a(b", "a("));
    }
}
