use std::time::Duration;

use ask_github_client::{GithubApiClient, GithubClientConfig};
use ask_github_context::context_format::NO_BODY_PLACEHOLDER;
use ask_github_context::traversal::{EntityState, TraversalConfig};
use ask_github_context::{
    format_resolved_context, parse_reference, render_context, resolve_context, EntityRef,
};
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{json, Value};

fn client(server: &MockServer, retry_max_attempts: usize) -> GithubApiClient {
    GithubApiClient::new(GithubClientConfig {
        api_base: server.base_url(),
        token: Some("integration-token".to_string()),
        request_timeout_ms: 2_000,
        retry_max_attempts,
        retry_base_delay_ms: 1,
    })
    .expect("client")
}

fn seed(raw: &str) -> EntityRef {
    parse_reference(raw, None).expect("seed")
}

fn issue_json(owner: &str, repo: &str, number: u64, body: &str, pull: bool) -> Value {
    let kind = if pull { "pull" } else { "issues" };
    let mut issue = json!({
        "id": number * 100,
        "number": number,
        "title": format!("Entity {number}"),
        "body": body,
        "html_url": format!("https://github.com/{owner}/{repo}/{kind}/{number}"),
        "user": { "login": "author", "type": "User" }
    });
    if pull {
        issue["pull_request"] = json!({
            "url": format!("https://api.github.com/repos/{owner}/{repo}/pulls/{number}")
        });
    }
    issue
}

fn comment_json(
    owner: &str,
    repo: &str,
    number: u64,
    id: u64,
    login: &str,
    kind: &str,
    body: &str,
) -> Value {
    json!({
        "id": id,
        "body": body,
        "user": { "login": login, "type": kind },
        "issue_url": format!("https://api.github.com/repos/{owner}/{repo}/issues/{number}")
    })
}

struct IssueMocks<'a> {
    issue: Mock<'a>,
    comments: Mock<'a>,
}

fn mock_issue<'a>(
    server: &'a MockServer,
    number: u64,
    body: &str,
    comments: Vec<Value>,
    delay: Duration,
) -> IssueMocks<'a> {
    let issue = issue_json("acme", "widgets", number, body, false);
    IssueMocks {
        issue: server.mock(|when, then| {
            when.method(GET)
                .path(format!("/repos/acme/widgets/issues/{number}"));
            then.status(200).delay(delay).json_body(issue);
        }),
        comments: server.mock(|when, then| {
            when.method(GET)
                .path(format!("/repos/acme/widgets/issues/{number}/comments"));
            then.status(200).json_body(Value::Array(comments));
        }),
    }
}

#[tokio::test]
async fn integration_cyclic_references_are_fetched_once() {
    let server = MockServer::start();
    let first = mock_issue(
        &server,
        1,
        "Duplicate of https://github.com/acme/widgets/issues/2",
        vec![],
        Duration::ZERO,
    );
    let second = mock_issue(
        &server,
        2,
        "Duplicate of https://github.com/acme/widgets/issues/1#issuecomment-9",
        vec![comment_json(
            "acme",
            "widgets",
            2,
            21,
            "bob",
            "User",
            "see acme/widgets#1",
        )],
        Duration::ZERO,
    );

    let mut config = TraversalConfig::default();
    config.max_hops = 10;
    let resolved = resolve_context(
        &client(&server, 1),
        &seed("https://github.com/acme/widgets/issues/1"),
        &config,
    )
    .await;

    assert_eq!(
        resolved.visited.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["acme/widgets/1", "acme/widgets/2"]
    );
    first.issue.assert_calls(1);
    first.comments.assert_calls(1);
    second.issue.assert_calls(1);
    second.comments.assert_calls(1);
}

#[tokio::test]
async fn integration_linear_chain_renders_blocks_in_discovery_order() {
    let server = MockServer::start();
    mock_issue(
        &server,
        1,
        "Tracking issue for #2",
        vec![
            comment_json("acme", "widgets", 1, 11, "alice", "User", "Any update?"),
            comment_json("acme", "widgets", 1, 12, "ci-bot", "Bot", "Build #99 passed"),
        ],
        Duration::ZERO,
    );
    mock_issue(
        &server,
        2,
        "Second step",
        vec![comment_json(
            "acme",
            "widgets",
            2,
            21,
            "bob",
            "User",
            "Blocked on #3",
        )],
        Duration::from_millis(40),
    );
    mock_issue(&server, 3, "Leaf", vec![], Duration::ZERO);

    let resolved = resolve_context(
        &client(&server, 1),
        &seed("acme/widgets/1"),
        &TraversalConfig::default(),
    )
    .await;
    let blocks = format_resolved_context(&resolved);

    assert_eq!(blocks.len(), 3);
    assert!(blocks[0].starts_with(
        "=== Current Issue #1 Specification === acme/widgets/1 ==="
    ));
    assert!(blocks[0].contains("11 alice: Any update?\n"));
    assert!(!blocks[0].contains("ci-bot"));
    assert!(blocks[1].starts_with("=== Linked Issue #2 Specification === acme/widgets/2 ==="));
    assert!(blocks[2].starts_with("=== Linked Issue #3 Specification === acme/widgets/3 ==="));
    for (block, number) in blocks.iter().zip(1..) {
        let scope = if number == 1 { "Current" } else { "Linked" };
        let footer = format!("=== End {scope} Issue #{number} Conversation ===\n\n");
        assert!(block.ends_with(&footer));
    }
}

#[tokio::test]
async fn integration_failed_entity_degrades_to_placeholder_block() {
    let server = MockServer::start();
    mock_issue(&server, 1, "Needs #2 and #3", vec![], Duration::ZERO);
    mock_issue(&server, 2, "Healthy", vec![], Duration::ZERO);
    let broken = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/3");
        then.status(503).body("unavailable");
    });

    let resolved = resolve_context(
        &client(&server, 2),
        &seed("https://github.com/acme/widgets/issues/1"),
        &TraversalConfig::default(),
    )
    .await;
    let rendered = render_context(&format_resolved_context(&resolved));

    assert_eq!(resolved.entities.len(), 3);
    assert_eq!(resolved.entities[2].state, EntityState::Failed);
    assert!(rendered.contains(
        "=== Linked Issue #2 Specification === acme/widgets/2 ===\n\nHealthy\n"
    ));
    assert!(rendered.contains(&format!(
        "=== Linked Issue #3 Specification === acme/widgets/3 ===\n\n{NO_BODY_PLACEHOLDER}\n"
    )));
    broken.assert_calls(2);
}

#[tokio::test]
async fn integration_pull_request_seed_includes_diff_and_review_comments() {
    let server = MockServer::start();
    let pull = issue_json(
        "acme",
        "widgets",
        5,
        "Implements #6. Upstream: https://github.com/vendor/lib/issues/1",
        true,
    );
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/5");
        then.status(200).json_body(pull);
    });
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/pulls/5/comments");
        then.status(200).json_body(json!([{
            "id": 51,
            "body": "Consider a bounded pool",
            "user": { "login": "reviewer", "type": "User" },
            "pull_request_url": "https://api.github.com/repos/acme/widgets/pulls/5",
            "path": "src/pool.ts"
        }]));
    });
    let diff = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/acme/widgets/pulls/5")
            .header("accept", "application/vnd.github.diff");
        then.status(200)
            .body("diff --git a/src/pool.ts b/src/pool.ts\n+export const limit = 10;\n");
    });
    mock_issue(&server, 6, "Pool specification", vec![], Duration::ZERO);
    let foreign = server.mock(|when, then| {
        when.method(GET).path_includes("/repos/vendor/");
        then.status(200).json_body(json!({}));
    });

    let resolved = resolve_context(
        &client(&server, 1),
        &seed("https://github.com/acme/widgets/pull/5"),
        &TraversalConfig::default(),
    )
    .await;
    let blocks = format_resolved_context(&resolved);

    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("=== Current Pull #5 Request === acme/widgets/5 ==="));
    assert!(blocks[0].contains("51 reviewer: Consider a bounded pool\n"));
    assert!(blocks[0].contains(
        "=== Current Pull Request Code Diff === acme/widgets #5 ===\n\n\
         diff --git a/src/pool.ts b/src/pool.ts\n+export const limit = 10;\n\
         === End Current Pull Request Code Diff ===\n\n"
    ));
    assert!(blocks[1].contains("Pool specification\n"));
    diff.assert_calls(1);
    foreign.assert_calls(0);
}

#[tokio::test]
async fn integration_rendering_is_stable_across_completion_timing() {
    async fn render(delays: [u64; 3]) -> String {
        let server = MockServer::start();
        mock_issue(&server, 1, "#2 #3 #4", vec![], Duration::ZERO);
        for (number, delay) in (2..).zip(delays) {
            mock_issue(
                &server,
                number,
                &format!("child {number}"),
                vec![comment_json(
                    "acme",
                    "widgets",
                    number,
                    number * 10,
                    "dev",
                    "User",
                    "ack",
                )],
                Duration::from_millis(delay),
            );
        }
        let resolved = resolve_context(
            &client(&server, 1),
            &seed("acme/widgets/1"),
            &TraversalConfig::default(),
        )
        .await;
        render_context(&format_resolved_context(&resolved))
    }

    let forward = render([0, 20, 40]).await;
    let reverse = render([40, 20, 0]).await;
    assert_eq!(forward, reverse);
    let child_two = forward.find("child 2").expect("child 2");
    let child_four = forward.find("child 4").expect("child 4");
    assert!(child_two < child_four);
}

#[tokio::test]
async fn regression_conversation_survives_custom_api_base_and_repository_rename() {
    let server = MockServer::start();
    let base = server.base_url();
    mock_issue(
        &server,
        1,
        "Why does the pool leak?",
        vec![
            json!({
                "id": 11,
                "body": "@askbot what is leaking here?",
                "user": { "login": "alice", "type": "User" },
                "issue_url": format!("{base}/repos/acme/widgets/issues/1")
            }),
            json!({
                "id": 12,
                "body": "Reported before the rename",
                "user": { "login": "bob", "type": "User" },
                "issue_url": format!("{base}/repos/acme/old-widgets/issues/1")
            }),
        ],
        Duration::ZERO,
    );

    let resolved = resolve_context(
        &client(&server, 1),
        &seed("https://github.com/acme/widgets/issues/1"),
        &TraversalConfig::default(),
    )
    .await;
    let blocks = format_resolved_context(&resolved);

    let seed_comments = resolved
        .seed_entity()
        .and_then(|entity| entity.comments.as_ref())
        .map(Vec::len);
    assert_eq!(seed_comments, Some(2));
    assert_eq!(resolved.streamlined_comments.len(), 1);
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].contains(
        "=== Current Issue #1 Conversation === acme/widgets #1 ===\n\n\
         11 alice: @askbot what is leaking here?\n\
         12 bob: Reported before the rename\n"
    ));
}
