#![allow(clippy::expect_used, clippy::unwrap_used)]
// Not every test binary uses every helper.
#![allow(dead_code)]

use std::time::Duration;

use duet_core::ChatClient;
use duet_core::CoreConfig;
use duet_core::Coordinator;
use duet_core::Query;
use duet_core::QueryStatus;
use tokio::sync::watch;
use tokio::time::timeout;
use wiremock::MockServer;

/// Build a coordinator pointed at a mock answer service, with timers tight
/// enough for tests.
pub fn coordinator_for(server: &MockServer) -> Coordinator {
    let config = CoreConfig::default()
        .with_base_url(server.uri())
        .with_debounce_window(Duration::from_millis(10))
        .with_idle_timeout(Duration::from_secs(5));
    Coordinator::new(ChatClient::new(&config), config)
}

/// Render a sequence of data-line payloads as one SSE response body.
pub fn sse_body(payloads: &[&str]) -> String {
    let mut body = String::new();
    for payload in payloads {
        body.push_str("data: ");
        body.push_str(payload);
        body.push('\n');
    }
    body
}

/// Observe snapshots until the query at `index` reaches a terminal status,
/// asserting along the way that statuses only ever move forward. Returns the
/// terminal query and every status observed before it.
pub async fn wait_for_terminal(
    rx: &mut watch::Receiver<Vec<Query>>,
    index: usize,
) -> (Query, Vec<QueryStatus>) {
    let mut seen = Vec::new();
    timeout(Duration::from_secs(10), async {
        loop {
            let query = rx.borrow_and_update().get(index).cloned();
            if let Some(query) = query {
                if seen.last() != Some(&query.status) {
                    if let Some(last) = seen.last() {
                        assert!(
                            !last.is_terminal(),
                            "status moved after terminal: {last:?} -> {:?}",
                            query.status
                        );
                    }
                    seen.push(query.status);
                }
                if query.status.is_terminal() {
                    return (query, seen);
                }
            }
            rx.changed().await.expect("conversation state dropped");
        }
    })
    .await
    .expect("query never reached a terminal status")
}
