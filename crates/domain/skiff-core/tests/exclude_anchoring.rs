use skiff_core::ExclusionMatcher;

fn excluded(patterns: &[&str], path: &str) -> bool {
    ExclusionMatcher::new(patterns).unwrap().is_excluded(path)
}

#[test]
fn directory_pattern_excludes_exactly_its_subtree() {
    // Everything under the named directory is excluded...
    assert!(excluded(&["a/"], "a/b"));
    assert!(excluded(&["a/"], "a/b/c"));
    assert!(excluded(&["storage/"], "storage/logs/app.log"));

    // ...wherever the directory sits when the pattern is unanchored...
    assert!(excluded(&["a/"], "x/a/b"));

    // ...but a sibling whose name merely shares a prefix is not.
    assert!(!excluded(&["a/"], "ab/c"));
    assert!(!excluded(&["a/"], "b/ab/c"));
}

#[test]
fn anchoring_distinguishes_root_from_any_depth() {
    assert!(excluded(&["/upload/"], "upload/img.png"));
    assert!(!excluded(&["/upload/"], "public/upload/img.png"));

    assert!(excluded(&["upload/"], "public/upload/img.png"));
}

#[test]
fn pattern_list_is_a_disjunction() {
    let patterns = ["*.swp", "/deploy.ini", "tests/"];
    assert!(excluded(&patterns, "src/.main.php.swp"));
    assert!(excluded(&patterns, "deploy.ini"));
    assert!(excluded(&patterns, "module/tests/unit.php"));
    assert!(!excluded(&patterns, "src/main.php"));
    assert!(!excluded(&patterns, "module/deploy.ini"));
}
