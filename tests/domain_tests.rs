use subscan_rs::domain::{parse_wordlist_str, validate_domain};

#[test]
fn parse_prefixes_with_comments_and_duplicates() {
    let input = r#"
        # common prefixes
        www
        api   # public api
        mail
        api   # duplicate
        # blank line follows

    "#;

    let prefixes = parse_wordlist_str(input).expect("parse ok");
    // Dedup, preserve order of first appearance
    assert_eq!(prefixes, vec!["www", "api", "mail"]);
}

#[test]
fn invalid_prefix_rejected() {
    let input = "www\n-bad\n";
    assert!(parse_wordlist_str(input).is_err());
}

#[test]
fn scan_targets_must_be_domains() {
    assert!(validate_domain("example.com"));
    assert!(!validate_domain("192.168.1.1"));
    assert!(!validate_domain("example.com/path"));
}
