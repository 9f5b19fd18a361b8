mod common;

use core_logic::testing::{login_response, timeout_error, ScriptedEntropy, ScriptedTransport};
use core_logic::{HttpResponse, NetworkError};
use humanity_runner::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn manager(transport: &Arc<ScriptedTransport>) -> SessionManager {
    SessionManager::new(
        transport.clone(),
        common::activity(),
        "https://testnet.humanity.org/login".to_string(),
        Duration::from_secs(10),
    )
}

#[tokio::test(start_paused = true)]
async fn test_three_failures_give_up_with_growing_timeouts() {
    let transport = Arc::new(ScriptedTransport::new());
    let account = common::account("token-aaaaaa", None);
    let start = Instant::now();

    let result = manager(&transport)
        .acquire(&account.proxy, &account.identity, &mut ScriptedEntropy::quiet())
        .await;

    assert!(result.is_err());
    let calls = transport.calls_to("/login");
    assert_eq!(calls.len(), 3);
    let timeouts: Vec<Duration> = calls.iter().map(|c| c.request.timeout).collect();
    assert_eq!(
        timeouts,
        vec![
            Duration::from_secs(10),
            Duration::from_secs(20),
            Duration::from_secs(30)
        ]
    );
    // (0+1)*2s + (1+1)*2s of backoff with zero jitter
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_cookies_are_joined_name_value_pairs() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push("/login", timeout_error("/login"));
    transport.push("/login", login_response(&["sid=abc", "cf_clearance=xyz"]));
    let account = common::account("token-aaaaaa", None);

    let cookie = manager(&transport)
        .acquire(&account.proxy, &account.identity, &mut ScriptedEntropy::quiet())
        .await
        .unwrap();

    assert_eq!(cookie, "sid=abc; cf_clearance=xyz");
    let calls = transport.calls_to("/login");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].proxy, common::PROXY);
    assert_eq!(
        calls[1].request.header_value("user-agent"),
        Some(account.identity.user_agent.as_str())
    );
    assert_eq!(
        calls[1].request.header_value("accept-language"),
        Some(account.identity.locale.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_login_without_cookie_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push("/login", Ok(HttpResponse::new(200, "<html></html>")));
    let account = common::account("token-aaaaaa", None);

    let result = manager(&transport)
        .acquire(&account.proxy, &account.identity, &mut ScriptedEntropy::quiet())
        .await;

    assert!(result.is_err());
    assert_eq!(transport.calls_to("/login").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_http_error_status_is_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(
        "/login",
        Err(NetworkError::HttpStatus {
            status_code: 503,
            endpoint: "/login".to_string(),
        }),
    );
    transport.push("/login", login_response(&["sid=1"]));
    let account = common::account("token-aaaaaa", None);

    let cookie = manager(&transport)
        .acquire(&account.proxy, &account.identity, &mut ScriptedEntropy::quiet())
        .await
        .unwrap();

    assert_eq!(cookie, "sid=1");
}
