//! REST contract of the HTTP-backed store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::NaiveDate;
use liebe::config::ServerConfig;
use liebe::directive::DateKey;
use liebe::notes::{NewNote, NoteId, NoteKind};
use liebe::scheduler::alarm::{AlarmId, AlarmKind, AlarmTime, NewAlarm, Trigger};
use liebe::store::{HttpStore, Store};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> HttpStore {
    HttpStore::new(&ServerConfig {
        base_url: server.uri(),
        ..ServerConfig::default()
    })
}

fn day() -> DateKey {
    DateKey::new(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap())
}

#[tokio::test]
async fn lists_alarms_of_both_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alarms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "type": "alarm", "time_value": "07:00", "display": null, "prepared": false},
            {"id": 2, "type": "timer", "time_value": "1773471600000", "display": "10m", "prepared": false},
            {"id": 3, "type": "alarm", "time_value": "not a time", "display": null, "prepared": false}
        ])))
        .mount(&server)
        .await;

    let alarms = store(&server).list_alarms().await.unwrap();
    assert_eq!(alarms.len(), 2);
    assert_eq!(alarms[0].trigger, Trigger::Clock(AlarmTime::new(7, 0).unwrap()));
    assert_eq!(alarms[1].kind(), AlarmKind::Timer);
    assert_eq!(alarms[1].trigger, Trigger::Instant(1_773_471_600_000));
    assert_eq!(alarms[1].label, "10m");
}

#[tokio::test]
async fn creates_timer_with_display_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/alarms"))
        .and(body_json(json!({
            "type": "timer",
            "time_value": "1773471600000",
            "display": "10m",
            "prepared": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9, "type": "timer", "time_value": "1773471600000", "display": "10m", "prepared": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let alarm = store(&server)
        .create_alarm(NewAlarm::timer(1_773_471_600_000, "10m"))
        .await
        .unwrap();
    assert_eq!(alarm.id, AlarmId(9));
}

#[tokio::test]
async fn deletes_alarm_and_reports_missing() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/alarms/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/alarms/5"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not found"})))
        .mount(&server)
        .await;

    let store = store(&server);
    store.delete_alarm(AlarmId(4)).await.unwrap();
    let err = store.delete_alarm(AlarmId(5)).await.unwrap_err();
    assert_eq!(err.code(), "PERSISTENCE_FAILED");
    assert!(err.message().contains("Not found"));
}

#[tokio::test]
async fn lists_notes_for_one_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .and(query_param("date", "Sat Mar 14 2026"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "date_str": "Sat Mar 14 2026", "content": "Buy milk", "type": "regular", "timestamp": 1773446400.0},
            {"id": 2, "date_str": "Sat Mar 14 2026", "content": "Good morning.", "type": "briefing", "timestamp": 1773446500.0}
        ])))
        .mount(&server)
        .await;

    let notes = store(&server).list_notes(Some(day())).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].kind, NoteKind::Briefing);
}

#[tokio::test]
async fn note_with_unreadable_date_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "date_str": "Sat Mar 14 2026", "content": "Buy milk", "type": "regular", "timestamp": 0.0},
            {"id": 2, "date_str": "next tuesday", "content": "Dentist", "type": "regular", "timestamp": 0.0}
        ])))
        .mount(&server)
        .await;

    let notes = store(&server).list_notes(None).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, NoteId(1));
    assert_eq!(notes[0].date_key, day());
}

#[tokio::test]
async fn put_briefing_replaces_existing_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .and(query_param("date", "Sat Mar 14 2026"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "date_str": "Sat Mar 14 2026", "content": "Buy milk", "type": "regular", "timestamp": 0.0},
            {"id": 2, "date_str": "Sat Mar 14 2026", "content": "old", "type": "briefing", "timestamp": 0.0}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/notes/2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/notes/1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notes"))
        .and(body_json(json!({
            "date_str": "Sat Mar 14 2026",
            "content": "new",
            "timestamp": 10.5,
            "type": "briefing"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 3, "date_str": "Sat Mar 14 2026", "content": "new", "type": "briefing", "timestamp": 10.5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let note = store(&server)
        .put_note(NewNote::briefing(day(), "new", 10.5))
        .await
        .unwrap();
    assert_eq!(note.id, NoteId(3));
}

#[tokio::test]
async fn unreachable_backend_is_persistence_error() {
    let store = HttpStore::new(&ServerConfig {
        base_url: "http://127.0.0.1:1".into(),
        request_timeout_secs: 2,
    });
    let err = store.list_alarms().await.unwrap_err();
    assert_eq!(err.code(), "PERSISTENCE_FAILED");
}
