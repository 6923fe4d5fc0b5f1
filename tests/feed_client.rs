// Integration tests for the HTTP feed client and webhook automation.
use mockito::{Matcher, Server};
use staysync::client::FeedClient;
use staysync::clock::ManualClock;
use staysync::error::FetchError;
use staysync::fetcher::FeedFetcher;
use staysync::trigger::{MissionAutomation, WebhookAutomation};
use std::sync::Arc;
use std::time::Duration;

const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Airbnb Inc//Hosting Calendar 0.8.8//EN\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20240605\r\n\
DTEND;VALUE=DATE:20240610\r\n\
UID:1418fb94e984-7bd1a86b5a9e0cdd4c2e1bd3@airbnb.com\r\n\
SUMMARY:Reserved\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

fn client() -> FeedClient {
    FeedClient::new("staysync-test/1.0", 5).unwrap()
}

#[tokio::test]
async fn test_get_feed_sends_user_agent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/ical/1.ics")
        .match_header("user-agent", "staysync-test/1.0")
        .with_status(200)
        .with_header("content-type", "text/calendar")
        .with_body(FEED)
        .create_async()
        .await;

    let body = client()
        .get_text(&format!("{}/ical/1.ics", server.url()))
        .await
        .unwrap();

    assert!(body.contains("BEGIN:VEVENT"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/gone.ics")
        .with_status(404)
        .create_async()
        .await;

    let err = client()
        .get_text(&format!("{}/gone.ics", server.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 404));
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let mut server = Server::new_async().await;
    let _moved = server
        .mock("GET", "/short/abc")
        .with_status(302)
        .with_header("location", "/ical/abc.ics")
        .create_async()
        .await;
    let target = server
        .mock("GET", "/ical/abc.ics")
        .with_status(200)
        .with_body(FEED)
        .create_async()
        .await;

    let body = client()
        .get_text(&format!("{}/short/abc", server.url()))
        .await
        .unwrap();
    assert!(body.contains("airbnb.com"));
    target.assert_async().await;
}

#[tokio::test]
async fn test_fetcher_parses_http_feed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/ical/1.ics")
        .with_status(200)
        .with_body(FEED)
        .create_async()
        .await;

    let fetcher = FeedFetcher::new(Arc::new(client()), 5, Duration::from_secs(30));
    let events = fetcher
        .fetch_events(&format!("{}/ical/1.ics", server.url()))
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].uid.as_deref(),
        Some("1418fb94e984-7bd1a86b5a9e0cdd4c2e1bd3@airbnb.com")
    );
    assert!(events[0].start.is_some() && events[0].end.is_some());
}

#[tokio::test]
async fn test_fetcher_rejects_html_error_page() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/ical/1.ics")
        .with_status(200)
        .with_body("<html><body>Please log in</body></html>")
        .create_async()
        .await;

    let fetcher = FeedFetcher::new(Arc::new(client()), 5, Duration::from_secs(30));
    let err = fetcher
        .fetch_events(&format!("{}/ical/1.ics", server.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
}

#[tokio::test]
async fn test_webhook_automation_posts_json() {
    let mut server = Server::new_async().await;
    let ended = server
        .mock("POST", "/hooks/ended")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJsonString(
            r#"{"event":"recently_ended_bookings"}"#.to_string(),
        ))
        .with_status(204)
        .create_async()
        .await;

    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let automation = WebhookAutomation::new(
        client(),
        clock,
        None,
        Some(format!("{}/hooks/ended", server.url())),
    );

    // No upcoming URL: nothing is sent and nothing fails.
    automation.process_upcoming_bookings().await.unwrap();
    automation.process_recently_ended_bookings().await.unwrap();
    ended.assert_async().await;
}

#[tokio::test]
async fn test_webhook_failure_is_reported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/hooks/upcoming")
        .with_status(500)
        .create_async()
        .await;

    let automation = WebhookAutomation::new(
        client(),
        Arc::new(ManualClock::new(chrono::Utc::now())),
        Some(format!("{}/hooks/upcoming", server.url())),
        None,
    );
    let err = automation.process_upcoming_bookings().await.unwrap_err();
    assert!(format!("{:#}", err).contains("500"));
}
