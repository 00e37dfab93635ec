use anyhow::{bail, Context, Result};
use ask_github_client::GithubApiClient;
use ask_github_context::seed::SkipReason;
use ask_github_context::traversal::ResolvedContext;
use ask_github_context::{
    build_chat_prompt, extract_question, format_resolved_context, parse_comment_event,
    parse_reference, render_context, resolve_context, seed_from_event_payload, ChatPrompt,
    EntityRef, QuestionTrigger,
};
use serde::Serialize;

use crate::cli_args::{Cli, CliOutputFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rendered(String),
    /// The webhook comment did not carry a question.
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub enum SeedSelection {
    Ready {
        seed: EntityRef,
        question: Option<String>,
    },
    Skipped(SkipReason),
}

#[derive(Serialize)]
struct ContextReport<'a> {
    seed: String,
    question: Option<&'a str>,
    blocks: &'a [String],
    prompt: Option<ChatPrompt>,
    resolved: &'a ResolvedContext,
}

/// Resolve the seed from `--url` or `--event-payload`.
pub async fn select_seed(cli: &Cli) -> Result<SeedSelection> {
    if let Some(url) = cli.url.as_deref() {
        let seed = parse_reference(url, None)
            .with_context(|| format!("failed to parse --url '{url}'"))?;
        return Ok(SeedSelection::Ready {
            seed,
            question: cli.question.clone(),
        });
    }

    let Some(path) = cli.event_payload.as_ref() else {
        bail!("either --url or --event-payload is required");
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    let event = parse_comment_event(&raw)
        .with_context(|| format!("failed to parse event payload {}", path.display()))?;
    let seed = seed_from_event_payload(&event)?;

    let question = match cli.question.clone() {
        Some(question) => question,
        None => {
            let trigger = cli
                .app_slug
                .as_deref()
                .map(QuestionTrigger::mention)
                .unwrap_or_else(QuestionTrigger::gpt_command);
            match extract_question(&event, &trigger) {
                Ok(question) => question,
                Err(reason) => return Ok(SeedSelection::Skipped(reason)),
            }
        }
    };
    tracing::info!(seed = %seed.key, comment_id = event.comment.id, "asking question");
    Ok(SeedSelection::Ready {
        seed,
        question: Some(question),
    })
}

pub async fn run(cli: &Cli) -> Result<RunOutcome> {
    let (seed, question) = match select_seed(cli).await? {
        SeedSelection::Ready { seed, question } => (seed, question),
        SeedSelection::Skipped(reason) => return Ok(RunOutcome::Skipped(reason)),
    };

    let client = GithubApiClient::new(cli.client_config())?;
    let resolved = resolve_context(&client, &seed, &cli.traversal_config()).await;
    tracing::info!(
        seed = %resolved.seed,
        entities = resolved.entities.len(),
        resolved = resolved.resolved_count(),
        linked_files = resolved.linked_files.len(),
        "resolved linked context"
    );

    let blocks = format_resolved_context(&resolved);
    let rendered = match cli.output {
        CliOutputFormat::Text => render_context(&blocks),
        CliOutputFormat::Json => {
            let report = ContextReport {
                seed: resolved.seed.to_string(),
                question: question.as_deref(),
                blocks: &blocks,
                prompt: question
                    .as_deref()
                    .map(|question| build_chat_prompt(question, &blocks)),
                resolved: &resolved,
            };
            serde_json::to_string_pretty(&report).context("failed to encode context report")?
        }
    };
    Ok(RunOutcome::Rendered(rendered))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ask_github_context::seed::SkipReason;
    use clap::Parser;
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::{run, RunOutcome};
    use crate::cli_args::Cli;

    fn mock_issue(server: &MockServer, number: u64, body: &str, comments: Value) {
        let body = body.to_string();
        server.mock(move |when, then| {
            when.method(GET).path(format!("/repos/o/r/issues/{number}"));
            then.status(200).json_body(json!({
                "id": number * 10,
                "number": number,
                "title": format!("Issue {number}"),
                "body": body,
                "html_url": format!("https://github.com/o/r/issues/{number}")
            }));
        });
        server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/repos/o/r/issues/{number}/comments"));
            then.status(200).json_body(comments);
        });
    }

    fn cli(server: &MockServer, extra: &[&str]) -> Cli {
        let base = server.base_url();
        let mut args = vec![
            "ask-context",
            "--github-api-base",
            base.as_str(),
            "--github-retry-max-attempts",
            "1",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("parse")
    }

    fn write_payload(dir: &Path, body: &str, user_type: &str) -> String {
        let path = dir.join("payload.json");
        let payload = json!({
            "action": "created",
            "issue": { "number": 1, "html_url": "https://github.com/o/r/issues/1" },
            "comment": {
                "id": 77,
                "body": body,
                "user": { "login": "alice", "type": user_type }
            },
            "repository": { "name": "r", "owner": { "login": "o" } }
        });
        std::fs::write(&path, payload.to_string()).expect("write payload");
        path.display().to_string()
    }

    #[tokio::test]
    async fn functional_run_renders_linked_context_for_url_seed() {
        let server = MockServer::start();
        mock_issue(&server, 1, "Tracking #2", json!([]));
        mock_issue(
            &server,
            2,
            "Root cause",
            json!([{
                "id": 201,
                "body": "fixed upstream",
                "user": { "login": "bob", "type": "User" },
                "issue_url": "https://api.github.com/repos/o/r/issues/2"
            }]),
        );

        let outcome = run(&cli(&server, &["--url", "https://github.com/o/r/issues/1"]))
            .await
            .expect("run");
        let RunOutcome::Rendered(text) = outcome else {
            panic!("expected rendered output");
        };
        assert!(text
            .starts_with("=== Current Issue #1 Specification === o/r/1 ===\n\nTracking #2\n"));
        assert!(text.contains("=== Linked Issue #2 Specification === o/r/2 ===\n\nRoot cause\n"));
        assert!(text.contains("201 bob: fixed upstream\n"));
    }

    #[tokio::test]
    async fn integration_run_reads_event_payload_and_builds_prompt() {
        let server = MockServer::start();
        mock_issue(
            &server,
            1,
            "Pool leaks",
            json!([{
                "id": 77,
                "body": "@askbot why does the pool leak?",
                "user": { "login": "alice", "type": "User" },
                "issue_url": "https://api.github.com/repos/o/r/issues/1"
            }]),
        );
        let dir = tempdir().expect("tempdir");
        let payload = write_payload(dir.path(), "@askbot why does the pool leak?", "User");

        let outcome = run(&cli(
            &server,
            &[
                "--event-payload",
                payload.as_str(),
                "--app-slug",
                "askbot",
                "--output",
                "json",
            ],
        ))
        .await
        .expect("run");
        let RunOutcome::Rendered(raw) = outcome else {
            panic!("expected rendered output");
        };
        let report: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(report["seed"], "o/r/1");
        assert_eq!(report["question"], "why does the pool leak?");
        assert_eq!(report["prompt"]["user"], "why does the pool leak?");
        assert_eq!(report["blocks"].as_array().map(Vec::len), Some(1));
        assert_eq!(report["resolved"]["entities"][0]["state"], "resolved");
        assert_eq!(report["resolved"]["visited"], json!(["o/r/1"]));
    }

    #[tokio::test]
    async fn regression_run_skips_bot_comments_without_network() {
        let server = MockServer::start();
        let any_request = server.mock(|when, then| {
            when.any_request();
            then.status(500);
        });
        let dir = tempdir().expect("tempdir");
        let payload = write_payload(dir.path(), "/gpt summarize", "Bot");

        let outcome = run(&cli(&server, &["--event-payload", payload.as_str()]))
            .await
            .expect("run");
        assert_eq!(outcome, RunOutcome::Skipped(SkipReason::BotAuthor));
        any_request.assert_calls(0);
    }

    #[tokio::test]
    async fn regression_run_rejects_invalid_url_seed() {
        let server = MockServer::start();
        let error = run(&cli(&server, &["--url", "https://example.com/nope"]))
            .await
            .expect_err("invalid seed");
        assert!(error.to_string().contains("failed to parse --url"));
    }
}
