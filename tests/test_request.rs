use kiln::http::mime::MimeType;
use kiln::http::query::{parameter_count, parameter_matches, parameter_value};
use kiln::http::request::{Method, RequestState};
use kiln::HttpServerError;

#[test]
fn test_method_from_request_line() {
    assert_eq!(Method::from_request_line(b"GET / HTTP/1.1"), Some((Method::GET, 4)));
    assert_eq!(Method::from_request_line(b"POST / HTTP/1.1"), Some((Method::POST, 5)));
    assert_eq!(Method::from_request_line(b"PUT / HTTP/1.1"), Some((Method::PUT, 4)));
    assert_eq!(Method::from_request_line(b"GETX / HTTP/1.1"), None);
    assert_eq!(Method::from_request_line(b"HEAD / HTTP/1.1"), None);
}

#[test]
fn test_request_state_reset() {
    let mut state = RequestState::new(8192);
    state.page_found = Some(3);
    state.path.push_str("/upload");
    state.data_remaining = 12;
    state.mime_type = MimeType::Json;
    state.request_type = Method::POST;
    state.close_requested = true;
    assert!(state.expects_body());

    state.reset();

    assert_eq!(state.page_found, None);
    assert!(state.path.is_empty());
    assert_eq!(state.data_remaining, 0);
    assert_eq!(state.mime_type, MimeType::All);
    assert_eq!(state.request_type, Method::UNDEFINED);
    assert!(!state.close_requested);
    assert!(!state.expects_body());
}

#[test]
fn test_query_parameter_count() {
    assert_eq!(parameter_count("a=1"), 1);
    assert_eq!(parameter_count("a=1&b=2&c"), 3);
    assert_eq!(parameter_count(""), 1);
}

#[test]
fn test_query_parameter_value() {
    let query = "name=world&flag&mode=fast";

    assert_eq!(parameter_value(query, "name").unwrap(), Some("world"));
    assert_eq!(parameter_value(query, "mode").unwrap(), Some("fast"));
    assert_eq!(parameter_value(query, "flag").unwrap(), None);
    assert!(matches!(parameter_value(query, "missing"), Err(HttpServerError::NotFound)));
}

#[test]
fn test_query_parameter_value_wildcard_key() {
    let query = "led1=on&led2=off";

    assert_eq!(parameter_value(query, "led?").unwrap(), Some("on"));
    assert_eq!(parameter_value(query, "*2").unwrap(), Some("off"));
}

#[test]
fn test_query_values_are_not_keys() {
    assert!(parameter_value("a=name", "name").is_err());
}

#[test]
fn test_query_parameter_matches() {
    let query = "mode=fast&level=10";

    assert!(parameter_matches(query, "mode", "fast"));
    assert!(!parameter_matches(query, "mode", "fa"));
    assert!(!parameter_matches(query, "level", "100"));
    assert!(!parameter_matches(query, "missing", "x"));
}
