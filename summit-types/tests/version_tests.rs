use proptest::prelude::*;
use summit_types::Version;

#[test]
fn zero_is_default() {
    assert_eq!(Version::default(), Version::ZERO);
    assert_eq!(Version::ZERO.get(), 0);
}

#[test]
fn next_increments_by_one() {
    assert_eq!(Version::new(4).next(), Version::new(5));
}

#[test]
fn next_saturates() {
    assert_eq!(Version::new(u64::MAX).next(), Version::new(u64::MAX));
}

#[test]
fn equal_version_does_not_supersede() {
    assert!(!Version::new(3).supersedes(Version::new(3)));
    assert!(!Version::new(2).supersedes(Version::new(3)));
    assert!(Version::new(4).supersedes(Version::new(3)));
}

#[test]
fn display_has_prefix() {
    assert_eq!(Version::new(7).to_string(), "v7");
}

proptest! {
    #[test]
    fn next_always_supersedes(raw in 0u64..u64::MAX) {
        let v = Version::new(raw);
        prop_assert!(v.next().supersedes(v));
    }
}
