#![allow(clippy::unwrap_used)]
// Integration tests for `GatewayClient` using wiremock.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hubsync_api::{Error, GatewayClient, GatewaySession, RawLight, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(token: Option<&str>) -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let session = GatewaySession::with_base_url(
        &Url::parse(&server.uri()).unwrap(),
        token.map(|t| SecretString::from(t.to_string())),
        TransportConfig::default(),
    )
    .unwrap();
    (server, GatewayClient::new(Arc::new(session)))
}

fn carousel(level: u8) -> String {
    format!(
        "<gwrcmds><gwrcmd><gcmd>RoomGetCarousel</gcmd><gdata><gip><version>1</version><rc>200</rc>\
         <room><rid>1</rid><name>Den</name>\
         <device><did>A1</did><known>1</known><name>Den Lamp</name><state>1</state><level>{level}</level></device>\
         </room></gip></gdata></gwrcmd></gwrcmds>"
    )
}

// ── Pairing tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_pair_stores_issued_token() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .and(header("Content-Type", "application/xml"))
        .and(body_string_contains("cmd=GWRLogin"))
        .and(body_string_contains("<email>seed-1</email><password>seed-1</password>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<gip><version>1</version><rc>200</rc><token>tok-123</token></gip>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let token = client.pair_and_issue_token("seed-1").await.unwrap();

    assert_eq!(token.expose_secret(), "tok-123");
    assert!(client.session().is_paired());
}

#[tokio::test]
async fn test_pair_refused_until_sync_button_pressed() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<gip><version>1</version><rc>404</rc></gip>"),
        )
        .mount(&server)
        .await;

    let result = client.pair_and_issue_token("seed-1").await;
    assert!(matches!(result, Err(Error::Protocol { .. })));
    assert!(!client.session().is_paired());
}

// ── Listing tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_list_lights() {
    let (server, client) = setup(Some("tok")).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .and(body_string_contains("cmd=GWRBatch"))
        .and(body_string_contains("<token>tok</token>"))
        .and(body_string_contains("&fmt=xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(carousel(40)))
        .mount(&server)
        .await;

    let lights = client.list_lights().await.unwrap();

    assert_eq!(
        lights,
        vec![RawLight {
            did: "A1".into(),
            name: "Den Lamp".into(),
            on: true,
            level: 40,
            known: true,
            offline: false,
        }]
    );
}

#[tokio::test]
async fn test_unpaired_gateway_fails_without_request() {
    let (server, client) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(carousel(40)))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.list_lights().await;
    assert!(matches!(result, Err(Error::NotPaired)));
}

#[tokio::test]
async fn test_http_error_is_status() {
    let (server, client) = setup(Some("tok")).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.list_lights().await;
    assert!(matches!(result, Err(Error::Status { status: 500, .. })));
}

// ── Command tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_set_level_sends_level_type() {
    let (server, client) = setup(Some("tok")).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .and(body_string_contains(
            "<did>A1</did><value>45</value><type>level</type>",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<gip><version>1</version><rc>200</rc></gip>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    tokio_test::assert_ok!(client.set_level("A1", 45).await);
}

#[tokio::test]
async fn test_set_power_off() {
    let (server, client) = setup(Some("tok")).await;

    Mock::given(method("POST"))
        .and(path("/gwr/gop.php"))
        .and(body_string_contains("<did>A1</did><value>0</value></gip>"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<gip><version>1</version><rc>200</rc></gip>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    tokio_test::assert_ok!(client.set_power("A1", false).await);
}
