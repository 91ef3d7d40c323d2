//! HttpBackend against a canned local service.
//!
//! The service answers one request per connection and records every request
//! line it sees, so tests can assert on what went over the wire.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use squirrelapp::attributes::SearchTerm;
use squirrelapp::error::SquirrelError;
use squirrelapp::model::{Entry, EntryKind, Snapshot};
use squirrelapp::store::remote::HttpBackend;
use squirrelapp::store::{Backend, NewPv};
use squirrelapp::tags::{TagDef, TagGroup, TagSet};
use uuid::Uuid;

const PV_A: &str = "5f0c6c52-2b9e-4d0a-9a8e-2a3c1b7c0001";
const PV_AB: &str = "5f0c6c52-2b9e-4d0a-9a8e-2a3c1b7c0002";

struct MockService {
    address: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockService {
    fn start<F>(route: F) -> Self
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                let _ = reader.read_line(&mut request_line);
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let target = parts.next().unwrap_or_default().to_string();

                let mut content_length = 0;
                loop {
                    let mut header = String::new();
                    let _ = reader.read_line(&mut header);
                    if header == "\r\n" || header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }
                let mut body = vec![0; content_length];
                let _ = reader.read_exact(&mut body);
                let body = String::from_utf8_lossy(&body).to_string();

                seen.lock().unwrap().push(format!("{} {}", method, target));
                let (status, text) = route(&method, &target, &body);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    text.len(),
                    text
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            address: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    fn backend(&self) -> HttpBackend {
        HttpBackend::with_timeout(&self.address, Duration::from_secs(5))
    }

    fn count(&self, request: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.as_str() == request)
            .count()
    }

    fn saw_prefix(&self, prefix: &str) -> bool {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.starts_with(prefix))
    }
}

fn ok(payload: &str) -> (u16, String) {
    (200, format!(r#"{{"payload":{}}}"#, payload))
}

const REGION_GROUP: &str = r#"[{"id":0,"name":"Region","description":"Area",
    "tags":[{"id":0,"name":"A"},{"id":1,"name":"B"}]}]"#;

fn pv_a() -> String {
    format!(
        r#"{{"id":"{}","setpointAddress":"PV:A","description":"only A","tags":[0],
            "createdDate":"2024-05-01T12:00:00"}}"#,
        PV_A
    )
}

fn region_service(method: &str, target: &str, _body: &str) -> (u16, String) {
    let path = target.split('?').next().unwrap_or_default();
    let pv_a_path = format!("/v1/pvs/{}", PV_A);
    match (method, path) {
        ("GET", "/v1/tags") => ok(r#"[{"id":0,"name":"Region"}]"#),
        ("GET", "/v1/tags/0") => ok(REGION_GROUP),
        ("POST", "/v1/tags") => (
            400,
            r#"{"errorMessage":"Tag group Region already exists"}"#.into(),
        ),
        ("PUT" | "DELETE", p) if p.starts_with("/v1/tags/0/tags/") => ok("null"),
        ("GET", "/v1/pvs") => ok(&format!(
            r#"[
                {},
                {{"id":"{}","setpointAddress":"PV:AB","description":"A and B",
                  "tags":[{{"id":0}},{{"id":1}}]}}
            ]"#,
            pv_a(),
            PV_AB
        )),
        ("GET", p) if p == pv_a_path => ok(&pv_a()),
        ("DELETE", p) if p == pv_a_path => ok("null"),
        ("POST", "/v1/pvs") => ok(&format!(
            r#"{{"id":"{}","setpointAddress":"PV:NEW","tags":[1]}}"#,
            Uuid::nil()
        )),
        ("GET", "/v1/snapshots") => ok("[]"),
        _ => (404, r#"{"message":"Not found"}"#.into()),
    }
}

fn tags(pairs: &[(u32, &[u32])]) -> TagSet {
    pairs
        .iter()
        .map(|(group, ids)| (*group, ids.iter().copied().collect()))
        .collect()
}

#[test]
fn test_get_tags_assembles_groups() {
    let service = MockService::start(region_service);
    let backend = service.backend();

    let def = backend.get_tags().unwrap();
    let region = def.get(0).unwrap();
    assert_eq!(region.name, "Region");
    assert_eq!(region.description, "Area");
    assert_eq!(region.tags.get(&1).map(String::as_str), Some("B"));
}

#[test]
fn test_tag_cache_serves_repeat_reads() {
    let service = MockService::start(region_service);
    let backend = service.backend();

    backend.get_tags().unwrap();
    backend.get_tags().unwrap();
    backend.get_all_pvs().unwrap();
    assert_eq!(service.count("GET /v1/tags"), 1);
    assert_eq!(service.count("GET /v1/tags/0"), 1);
}

#[test]
fn test_expired_tag_cache_refetches() {
    let service = MockService::start(region_service);
    let backend = service.backend().with_tag_ttl(Duration::ZERO);

    backend.get_tags().unwrap();
    backend.get_tags().unwrap();
    assert_eq!(service.count("GET /v1/tags"), 2);
}

#[test]
fn test_pvs_unpack_tags_through_definition() {
    let service = MockService::start(region_service);
    let backend = service.backend();

    let pvs = backend.get_all_pvs().unwrap();
    assert_eq!(pvs.len(), 2);
    assert_eq!(pvs[0].tags, tags(&[(0, &[0])]));
    assert_eq!(pvs[1].tags, tags(&[(0, &[0, 1])]));
}

#[test]
fn test_tags_gt_search_over_the_wire() {
    let service = MockService::start(region_service);
    let backend = service.backend();
    let pv_only = SearchTerm::entry_type(EntryKind::Pv);

    let both = backend
        .search(&[pv_only.clone(), SearchTerm::gt("tags", tags(&[(0, &[0])]))])
        .unwrap();
    assert_eq!(both.len(), 2);

    let narrow = backend
        .search(&[pv_only.clone(), SearchTerm::gt("tags", tags(&[(0, &[0, 1])]))])
        .unwrap();
    assert_eq!(narrow.len(), 1);
    assert_eq!(narrow[0].uuid().to_string(), PV_AB);

    let within = backend
        .search(&[pv_only, SearchTerm::lt("tags", tags(&[(0, &[0])]))])
        .unwrap();
    assert_eq!(within.len(), 1);
    assert_eq!(within[0].uuid().to_string(), PV_A);

    assert!(!service.saw_prefix("GET /v1/snapshots"));
}

#[test]
fn test_missing_entry_is_not_found() {
    let service = MockService::start(region_service);
    let backend = service.backend();
    let id = Uuid::new_v4();

    let result = backend.get_entry(&id);
    assert!(matches!(result, Err(SquirrelError::EntryNotFound(missing)) if missing == id));
    assert!(service.saw_prefix(&format!("GET /v1/pvs/{}", id)));
    assert!(service.saw_prefix(&format!("GET /v1/snapshots/{}", id)));
}

#[test]
fn test_service_error_message_surfaces() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();

    match backend.add_tag_group("Region", "") {
        Err(SquirrelError::Backend(message)) => {
            assert_eq!(message, "Tag group Region already exists")
        }
        other => panic!("expected a backend error, got {:?}", other),
    }
}

#[test]
fn test_add_pv_returns_service_copy() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();

    let pv = backend
        .add_pv(NewPv::new(Some("PV:NEW"), None, "").with_tags(tags(&[(0, &[1])])))
        .unwrap();
    assert_eq!(pv.uuid, Uuid::nil());
    assert_eq!(pv.tags, tags(&[(0, &[1])]));
}

#[test]
fn test_archive_missing_pv() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();
    let id = Uuid::new_v4();

    assert!(matches!(
        backend.archive_pv(&id),
        Err(SquirrelError::EntryNotFound(_))
    ));
    assert_eq!(service.count(&format!("DELETE /v1/pvs/{}", id)), 1);
}

#[test]
fn test_tag_mutation_drops_cache() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();

    backend.get_tags().unwrap();
    backend.get_tags().unwrap();
    assert_eq!(service.count("GET /v1/tags"), 1);

    backend.update_tag_in_group(0, 1, Some("Beta")).unwrap();
    backend.get_tags().unwrap();
    assert_eq!(service.count("GET /v1/tags"), 2);

    backend.delete_tag_from_group(0, 0).unwrap();
    backend.get_tags().unwrap();
    assert_eq!(service.count("GET /v1/tags"), 3);
}

#[test]
fn test_update_tag_without_name_checks_ids() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();

    backend.update_tag_in_group(0, 1, None).unwrap();
    assert!(matches!(
        backend.update_tag_in_group(9, 1, None),
        Err(SquirrelError::UnknownTagGroup(9))
    ));
    assert!(matches!(
        backend.update_tag_in_group(0, 7, None),
        Err(SquirrelError::UnknownTag { group: 0, tag: 7 })
    ));
    assert!(!service.saw_prefix("PUT"));
}

#[test]
fn test_set_tags_reconciles_with_service() {
    // Group 0 "Region" (A, B) and group 1 "Old" exist; POST creates group 7.
    let created = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&created);
    let service = MockService::start(move |method, target, _body| {
        let path = target.split('?').next().unwrap_or_default();
        match (method, path) {
            ("GET", "/v1/tags") if flag.load(Ordering::SeqCst) => ok(
                r#"[{"id":0,"name":"Region"},{"id":1,"name":"Old"},{"id":7,"name":"Sector"}]"#,
            ),
            ("GET", "/v1/tags") => ok(r#"[{"id":0,"name":"Region"},{"id":1,"name":"Old"}]"#),
            ("GET", "/v1/tags/0") => ok(REGION_GROUP),
            ("GET", "/v1/tags/1") => ok(r#"[{"id":1,"name":"Old","description":"","tags":[]}]"#),
            ("GET", "/v1/tags/7") => ok(
                r#"[{"id":7,"name":"Sector","description":"","tags":[{"id":0,"name":"S1"}]}]"#,
            ),
            ("POST", "/v1/tags") => {
                flag.store(true, Ordering::SeqCst);
                ok(r#"{"id":7,"name":"Sector"}"#)
            }
            ("PUT" | "DELETE", p) if p.starts_with("/v1/tags/") => ok("null"),
            _ => (404, r#"{"message":"Not found"}"#.into()),
        }
    });
    let mut backend = service.backend();

    let wanted = TagDef::from_iter([
        (0, TagGroup::new("Region", "Area").with_tag(1, "Beta")),
        (5, TagGroup::new("Sector", "").with_tag(0, "S1")),
    ]);
    backend.set_tags(&wanted).unwrap();

    assert!(service.saw_prefix("DELETE /v1/tags/1?"));
    assert!(service.saw_prefix("DELETE /v1/tags/0/tags/0"));
    assert!(service.saw_prefix("PUT /v1/tags/0/tags/1"));
    assert_eq!(service.count("POST /v1/tags"), 1);
    assert!(service.saw_prefix("PUT /v1/tags/7/tags"));
    // Region kept its name and description, so the group itself is untouched.
    assert_eq!(service.count("PUT /v1/tags/0"), 0);
    assert!(!service.saw_prefix("DELETE /v1/tags/0?"));
    assert!(created.load(Ordering::SeqCst));
}

#[test]
fn test_delete_refuses_stale_pv() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();
    let id = Uuid::parse_str(PV_A).unwrap();
    let archive = format!("DELETE /v1/pvs/{}", PV_A);

    let Entry::Pv(mut stale) = backend.get_entry(&id).unwrap() else {
        panic!("expected a PV");
    };
    stale.description = "edited elsewhere".into();
    assert!(matches!(
        backend.delete_entry(&Entry::Pv(stale)),
        Err(SquirrelError::Backend(_))
    ));
    assert_eq!(service.count(&archive), 0);

    let fresh = backend.get_entry(&id).unwrap();
    backend.delete_entry(&fresh).unwrap();
    assert_eq!(service.count(&archive), 1);
}

#[test]
fn test_remote_snapshots_are_immutable() {
    let service = MockService::start(region_service);
    let mut backend = service.backend();

    let snapshot = Snapshot::new("baseline", "");
    assert!(matches!(
        backend.update_entry(&Entry::Snapshot(snapshot)),
        Err(SquirrelError::Backend(_))
    ));
    assert!(service.requests.lock().unwrap().is_empty());
}
