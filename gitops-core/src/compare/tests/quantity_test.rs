use super::*;

#[rstest]
#[case::millicores("500m", "0.5")]
#[case::whole_cpu("1", "1000m")]
#[case::binary_vs_binary("1Gi", "1024Mi")]
#[case::binary_vs_plain("1Ki", "1024")]
#[case::decimal_vs_exponent("1k", "1e3")]
#[case::fraction_vs_suffix("1.5G", "1500M")]
#[case::nano("1n", "0.000000001")]
fn test_quantity_eq(#[case] a: &str, #[case] b: &str) {
    assert!(quantity_eq(&Quantity(a.into()), &Quantity(b.into())));
}

#[rstest]
#[case::cpu("500m", "501m")]
#[case::binary_vs_decimal("1Gi", "1G")]
#[case::memory("128Mi", "256Mi")]
fn test_quantity_ne(#[case] a: &str, #[case] b: &str) {
    assert!(!quantity_eq(&Quantity(a.into()), &Quantity(b.into())));
}

#[rstest]
fn test_parse_quantity() {
    assert_eq!(parse_quantity("250m"), Some(250_000_000));
    assert_eq!(parse_quantity("2"), Some(2_000_000_000));
    assert_eq!(parse_quantity("-1"), Some(-1_000_000_000));
    assert_eq!(parse_quantity("1Ki"), Some(1_024_000_000_000));
}

#[rstest]
#[case::empty("")]
#[case::bad_suffix("12Qi")]
#[case::garbage("abc")]
#[case::just_dot(".")]
fn test_parse_quantity_invalid(#[case] q: &str) {
    assert_none!(parse_quantity(q));
}

#[rstest]
fn test_quantity_eq_unparseable_falls_back_to_string() {
    assert!(quantity_eq(&Quantity("foo".into()), &Quantity("foo".into())));
    assert!(!quantity_eq(&Quantity("foo".into()), &Quantity("bar".into())));
}
