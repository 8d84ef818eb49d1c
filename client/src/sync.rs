use anyhow::{bail, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReportReq {
    pub month: u32,
    pub year: i32,
}

#[derive(Deserialize)]
struct HtmlReport {
    html: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ReportClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ReportClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    async fn post(&self, path: &str, req: &ReportReq) -> Result<Response> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;
        ensure_success(resp).await
    }

    pub async fn download_csv(&self, req: &ReportReq) -> Result<Vec<u8>> {
        let resp = self.post("/reports/csv", req).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn fetch_html(&self, req: &ReportReq) -> Result<String> {
        let report: HtmlReport = self.post("/reports/html", req).await?.json().await?;
        Ok(report.html)
    }

    /// Response whose body is the relayed analysis stream.
    pub async fn open_analysis(&self, req: &ReportReq) -> Result<Response> {
        self.post("/reports/ai", req).await
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = error_message(&text);
    bail!("server returned {status}: {message}")
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}
