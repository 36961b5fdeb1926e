use punte::admission::HostAdmission;

#[test]
fn test_empty_allow_list_admits_everything() {
    let admission = HostAdmission::new(Vec::new());
    for host in ["10.0.0.2", "::1", "host.example.com", ""] {
        assert!(admission.admit(host), "{host} should be admitted");
    }
}

#[test]
fn test_allow_list_is_exact_match() {
    let admission = HostAdmission::new(vec!["10.0.0.2".to_string()]);
    assert!(admission.admit("10.0.0.2"));
    assert!(!admission.admit("10.0.0.9"));
    assert!(!admission.admit("10.0.0.20"));
    assert!(!admission.admit(" 10.0.0.2"));
}

#[test]
fn test_allow_list_no_dns_no_wildcards() {
    // The safeguard never resolves names: an allow-listed hostname does
    // not admit the address it points to, and patterns are literals.
    let admission = HostAdmission::new(vec!["localhost".to_string(), "*".to_string()]);
    assert!(admission.admit("localhost"));
    assert!(!admission.admit("127.0.0.1"));
    assert!(!admission.admit("anything"));
    assert!(admission.admit("*"));
}
