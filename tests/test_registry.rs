use bytes::Bytes;
use kiln::HttpServerError;
use kiln::http::mime::MimeType;
use kiln::resource::registry::{
    Continuation, ResourceContent, ResourceKind, ResourceRegistry, ResourceSource,
};
use kiln::resource::wildcard::matches;

#[test]
fn test_wildcard_literal() {
    assert!(matches(b"/index.html", b"/index.html"));
    assert!(!matches(b"/index.html", b"/index.htm"));
    assert!(!matches(b"/index.htm", b"/index.html"));
}

#[test]
fn test_wildcard_question_mark_matches_exactly_one() {
    assert!(matches(b"/te?p", b"/temp"));
    assert!(!matches(b"/te?p", b"/tep"));
    assert!(!matches(b"/te?p", b"/teemp"));
}

#[test]
fn test_wildcard_star() {
    assert!(matches(b"*", b""));
    assert!(matches(b"*", b"/anything/at/all"));
    assert!(matches(b"/api/*", b"/api/"));
    assert!(matches(b"/api/*", b"/api/v1/items"));
    assert!(!matches(b"/api/*", b"/apix"));
    assert!(matches(b"/*.png", b"/a.b.png"));
    assert!(!matches(b"/*.png", b"/a.png.bak"));
}

#[test]
fn test_wildcard_backtracks() {
    assert!(matches(b"/*a*b", b"/xaxxab"));
    assert!(matches(b"*?*", b"x"));
    assert!(!matches(b"*?*", b""));
    assert!(matches(b"/a**b", b"/ab"));
}

fn page(body: &'static str) -> ResourceContent {
    ResourceContent::static_bytes(body.as_bytes())
}

#[test]
fn test_registry_first_match_wins() {
    let mut registry = ResourceRegistry::with_capacity(4);
    registry.register("/a*", "text/html", page("first")).unwrap();
    registry.register("/abc", "text/html", page("second")).unwrap();

    let (index, entry) = registry.find(b"/abc", MimeType::All).unwrap();
    assert_eq!(index, 0);
    assert_eq!(entry.pattern, "/a*");
}

#[test]
fn test_registry_capacity_is_enforced() {
    let mut registry = ResourceRegistry::with_capacity(2);
    registry.register("/one", "text/html", page("1")).unwrap();
    registry.register("/two", "text/html", page("2")).unwrap();

    let result = registry.register("/three", "text/html", page("3"));
    assert!(matches!(result, Err(HttpServerError::RegistryFull { capacity: 2 })));
    assert_eq!(registry.len(), 2);
    assert!(registry.find(b"/three", MimeType::All).is_none());
}

#[test]
fn test_registry_default_capacity() {
    let registry = ResourceRegistry::default();
    assert_eq!(registry.capacity(), 10);
    assert!(registry.is_empty());
}

#[test]
fn test_registry_rejects_empty_pattern() {
    let mut registry = ResourceRegistry::with_capacity(1);
    let result = registry.register("", "text/html", page("x"));
    assert!(matches!(result, Err(HttpServerError::BadArgument(_))));
}

#[test]
fn test_registry_mime_filter() {
    let mut registry = ResourceRegistry::with_capacity(4);
    registry.register("/data", "text/html", page("html")).unwrap();
    registry.register("/data", "application/json", page("json")).unwrap();

    assert_eq!(registry.find(b"/data", MimeType::Json).unwrap().0, 1);
    assert_eq!(registry.find(b"/data", MimeType::TextHtml).unwrap().0, 0);
    assert_eq!(registry.find(b"/data", MimeType::All).unwrap().0, 0);
    assert!(registry.find(b"/data", MimeType::ImagePng).is_none());
}

#[test]
fn test_registry_unknown_mime_is_served_as_any() {
    let mut registry = ResourceRegistry::with_capacity(1);
    registry.register("/x", "video/mp4", page("x")).unwrap();
    assert_eq!(registry.get(0).unwrap().mime_type, MimeType::All);
}

#[test]
fn test_resource_kinds() {
    assert_eq!(page("x").kind(), ResourceKind::Static);
    assert_eq!(ResourceContent::raw_static(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]).kind(), ResourceKind::RawStatic);
    assert_eq!(ResourceContent::redirect("/").kind(), ResourceKind::RawStatic);
    assert_eq!(
        ResourceContent::dynamic(|_, _, _, _| Ok(Continuation::Done)).kind(),
        ResourceKind::Dynamic
    );
    assert_eq!(
        ResourceContent::raw_dynamic(|_, _, _, _| Ok(Continuation::Done)).kind(),
        ResourceKind::RawDynamic
    );
    assert_eq!(ResourceContent::resource(Bytes::from_static(b"abc")).kind(), ResourceKind::Resource);
}

#[test]
fn test_bytes_resource_source_reads_windows() {
    let source = Bytes::from_static(b"0123456789");
    assert_eq!(source.size(), 10);
    assert_eq!(&source.read_at(0, 4).unwrap()[..], b"0123");
    assert_eq!(&source.read_at(8, 4).unwrap()[..], b"89");
    assert!(source.read_at(10, 4).unwrap().is_empty());
}
