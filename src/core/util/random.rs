use rand::distr::Alphanumeric;
use rand::Rng;

/// Random `[A-Za-z0-9]` string, used for plugin passwords and tokens.
pub fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string() {
        let a = random_string(64);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, random_string(64));
        assert!(random_string(0).is_empty());
    }
}
