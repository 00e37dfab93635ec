//! Reqwest-backed GitHub REST client for the ask context engine.
//! This crate provides a rate-limit aware retry policy and an `EntitySource`
//! implementation over the issues, pulls and contents endpoints.

pub mod github_api_client;
pub mod retry_policy;

pub use github_api_client::{GithubApiClient, GithubClientConfig};
