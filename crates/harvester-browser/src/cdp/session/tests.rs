use super::core::PageSession;

#[test]
fn test_centroid_of_square() {
    let quad = [0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];
    assert_eq!(PageSession::centroid(&quad), (50.0, 50.0));
}

#[test]
fn test_centroid_of_offset_quad() {
    let quad = [10.0, 20.0, 30.0, 20.0, 30.0, 60.0, 10.0, 60.0];
    assert_eq!(PageSession::centroid(&quad), (20.0, 40.0));
}

#[test]
fn test_centroid_short_quad() {
    assert_eq!(PageSession::centroid(&[1.0, 2.0]), (0.0, 0.0));
}

#[test]
fn test_get_modifiers() {
    let modifiers = ["Control", "Shift"];
    let flags = PageSession::get_modifiers(&modifiers);
    assert_eq!(flags, 10); // 2 + 8
}

#[test]
fn test_get_modifiers_mac() {
    let flags = PageSession::get_modifiers(&["Meta"]);
    assert_eq!(flags, 4);
}

#[test]
fn test_enter_produces_carriage_return() {
    assert_eq!(PageSession::key_definition("Enter"), (13, Some("\r")));
}

#[test]
fn test_single_character_key_code() {
    assert_eq!(PageSession::key_definition("a"), (65, None));
    assert_eq!(PageSession::key_definition("Unknown"), (0, None));
}
