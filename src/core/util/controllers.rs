/// Whether `name` is enabled by an allow/deny list such as `["*", "-hami"]`.
///
/// The first token naming the controller wins (`name` enables, `-name` disables);
/// otherwise `*` enables everything not listed.
// Shared with the controller-manager flag grammar; this binary has no controllers to gate.
#[allow(dead_code)]
pub fn is_controller_enabled(name: &str, controllers: &[String]) -> bool {
    let mut has_star = false;
    for ctrl in controllers {
        if ctrl == name {
            return true;
        }
        if ctrl.strip_prefix('-') == Some(name) {
            return false;
        }
        if ctrl == "*" {
            has_star = true;
        }
    }
    has_star
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_star_enables_all() {
        assert!(is_controller_enabled("cluster", &list(&["*"])));
        assert!(!is_controller_enabled("cluster", &list(&[])));
    }

    #[test]
    fn test_first_match_wins() {
        assert!(!is_controller_enabled("hami", &list(&["*", "-hami"])));
        assert!(is_controller_enabled("hami", &list(&["hami", "-hami"])));
        assert!(!is_controller_enabled("hami", &list(&["-hami", "hami", "*"])));
        assert!(is_controller_enabled("cluster", &list(&["-hami", "*"])));
    }
}
