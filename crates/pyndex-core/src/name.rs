//! Package name normalization

/// Normalize a package name into its index directory name.
///
/// Lowercases and collapses every run of `-`, `_` and `.` into one `-`.
pub fn normalize_package_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator_run = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator_run {
                out.push('-');
                in_separator_run = true;
            }
        } else {
            out.extend(c.to_lowercase());
            in_separator_run = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(normalize_package_name("company.test"), "company-test");
        assert_eq!(normalize_package_name("company---test.1"), "company-test-1");
        assert_eq!(normalize_package_name("company___test.2"), "company-test-2");
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(normalize_package_name("Company___Test.1"), "company-test-1");
        assert_eq!(
            normalize_package_name("Company___Test.1"),
            normalize_package_name("company-test-1")
        );
    }

    #[test]
    fn idempotent() {
        let once = normalize_package_name("Hello_World..Pkg");
        assert_eq!(normalize_package_name(&once), once);
    }

    #[test]
    fn mixed_separator_run() {
        assert_eq!(normalize_package_name("a-_.b"), "a-b");
    }
}
