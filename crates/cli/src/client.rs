// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin HTTP client talking to `wardend`'s API — one struct per daemon
//! connection, methods mapping 1:1 onto the HTTP surface, speaking
//! loopback HTTP with a bearer token.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub struct DaemonClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DaemonClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req
            .bearer_auth(&self.token)
            .send()
            .await
            .context("failed to reach wardend; is it running?")?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            let code = body.get("code").and_then(Value::as_str).unwrap_or("");
            bail!("{status} {code}: {message}");
        }

        response.json().await.context("failed to parse response body")
    }

    async fn send_no_body(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let response = req.bearer_auth(&self.token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body.get("error").and_then(Value::as_str).unwrap_or("request failed");
            bail!("{status}: {message}");
        }
        Ok(())
    }

    pub async fn create_job(&self, body: Value) -> Result<Value> {
        self.send(self.http.post(self.url("/api/cron/jobs")).json(&body)).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Value>> {
        self.send(self.http.get(self.url("/api/cron/jobs"))).await
    }

    pub async fn update_job(&self, id: &str, body: Value) -> Result<Value> {
        self.send(
            self.http
                .patch(self.url(&format!("/api/cron/jobs/{id}")))
                .json(&body),
        )
        .await
    }

    pub async fn delete_job(&self, id: &str) -> Result<()> {
        self.send_no_body(self.http.delete(self.url(&format!("/api/cron/jobs/{id}"))))
            .await
    }

    pub async fn trigger_job(&self, id: &str) -> Result<Value> {
        self.send(self.http.post(self.url(&format!("/api/cron/jobs/{id}/trigger"))))
            .await
    }

    pub async fn job_logs(&self, id: &str, limit: usize, offset: usize) -> Result<Vec<Value>> {
        self.send(
            self.http
                .get(self.url(&format!("/api/cron/jobs/{id}/logs")))
                .query(&[("limit", limit), ("offset", offset)]),
        )
        .await
    }

    pub async fn kill_switch(&self, activate: bool) -> Result<Value> {
        let action = if activate { "activate" } else { "deactivate" };
        self.send(
            self.http
                .post(self.url("/api/cron/kill-switch"))
                .json(&serde_json::json!({ "action": action })),
        )
        .await
    }

    pub async fn dashboard_overview(&self) -> Result<Value> {
        self.send(self.http.get(self.url("/api/dashboard/overview"))).await
    }
}
