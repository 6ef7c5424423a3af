use chrono::NaiveDate;
use intervals_icu_client::http_client::ReqwestIntervalsClient;
use intervals_icu_client::{DateRange, IntervalsClient, IntervalsError};
use secrecy::SecretString;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn client(server: &MockServer) -> ReqwestIntervalsClient {
    ReqwestIntervalsClient::new(&server.uri(), "ath", SecretString::new("tok".into())).unwrap()
}

#[tokio::test]
async fn get_activities_sends_range_and_basic_auth() {
    let server = MockServer::start().await;
    let body = serde_json::json!([
        {"id": "a1", "name": "Ride 1", "type": "Ride"},
        {"id": "a2", "name": "Run", "type": "Run"}
    ]);
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .and(query_param("oldest", "2025-03-04"))
        .and(query_param("newest", "2025-03-10"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let range = DateRange::last_days(7, date("2025-03-10"));
    let acts = client(&server).get_activities(&range).await.expect("acts");
    assert_eq!(acts.len(), 2);
    assert_eq!(acts[0].str_field("id").unwrap(), "a1");

    let received = server.received_requests().await.unwrap();
    let auth = received[0].headers.get("authorization").unwrap();
    // base64("API_KEY:tok")
    assert_eq!(auth.to_str().unwrap(), "Basic QVBJX0tFWTp0b2s=");
}

#[tokio::test]
async fn empty_range_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/wellness"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let range = DateRange::single(date("2025-03-10"));
    let days = client(&server).get_wellness(&range).await.expect("wellness");
    assert!(days.is_empty());
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = client(&server).get_athlete().await.unwrap_err();
    match err {
        IntervalsError::Auth(body) => assert_eq!(body, "bad key"),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/events"))
        .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(1000)))
        .mount(&server)
        .await;

    let range = DateRange::ahead(date("2025-03-10"), 21);
    let err = client(&server).get_events(&range).await.unwrap_err();
    match err {
        IntervalsError::Api { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body.len(), 256);
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let range = DateRange::single(date("2025-03-10"));
    let err = client(&server).get_activities(&range).await.unwrap_err();
    assert!(matches!(err, IntervalsError::Decode(_)));
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client =
        ReqwestIntervalsClient::new(&uri, "ath", SecretString::new("tok".into())).unwrap();
    let err = client.get_athlete().await.unwrap_err();
    assert!(matches!(err, IntervalsError::Network(_)));
}

#[tokio::test]
async fn requests_carry_the_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ath"})))
        .mount(&server)
        .await;

    client(&server).get_athlete().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0]
        .headers
        .get("user-agent")
        .expect("user agent")
        .to_str()
        .unwrap();
    assert!(agent.starts_with("intervals-export/"), "{agent}");
}

#[tokio::test]
async fn latest_activity_accepts_list_or_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .and(query_param("limit", "1"))
        .and(query_param("order", "desc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"id": "i9", "type": "Run"}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "i10"})),
        )
        .mount(&server)
        .await;

    let c = client(&server);
    let first = c.get_latest_activity().await.expect("latest").expect("some");
    assert_eq!(first.str_field("id").unwrap(), "i9");
    let second = c.get_latest_activity().await.expect("latest").expect("some");
    assert_eq!(second.str_field("id").unwrap(), "i10");
}

#[tokio::test]
async fn latest_activity_empty_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    assert!(client(&server).get_latest_activity().await.unwrap().is_none());
}

#[tokio::test]
async fn fetch_range_collects_every_category() {
    let server = MockServer::start().await;
    let today = date("2025-03-10");

    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ath", "name": "A"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a1"}, {"id": "a2"}, {"id": "a3"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/wellness"))
        .and(query_param("oldest", "2025-03-09"))
        .and(query_param("newest", "2025-03-09"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"id": "2025-03-09", "ctl": 50.0}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/wellness"))
        .and(query_param("oldest", "2025-03-04"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "2025-03-09"}, {"id": "2025-03-10"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/events"))
        .and(query_param("oldest", "2025-03-10"))
        .and(query_param("newest", "2025-03-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let range = DateRange::last_days(7, today);
    let snap = client(&server).fetch_range(&range, today).await.expect("snapshot");
    assert_eq!(snap.athlete.str_field("name").unwrap(), "A");
    assert_eq!(snap.activities.len(), 3);
    assert_eq!(snap.wellness.len(), 2);
    assert_eq!(
        snap.yesterday_wellness.unwrap().f64_field("ctl"),
        Some(50.0)
    );
    assert!(snap.events.is_empty());
}

#[tokio::test]
async fn fetch_range_tolerates_missing_yesterday_wellness() {
    let server = MockServer::start().await;
    let today = date("2025-03-10");

    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/wellness"))
        .and(query_param("oldest", "2025-03-09"))
        .and(query_param("newest", "2025-03-09"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/wellness"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/athlete/ath/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let range = DateRange::last_days(7, today);
    let snap = client(&server).fetch_range(&range, today).await.expect("snapshot");
    assert!(snap.yesterday_wellness.is_none());
    assert!(snap.activities.is_empty());
}
