use rfetch::{RetryClient, RetryOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("RFETCH_URL").unwrap_or_else(|_| "https://example.com/".to_owned());

    let client = RetryClient::new().with_options(RetryOptions {
        signal_timeout_ms: 2_000,
        retry_status_codes: vec![408, 429, 502, 503, 504],
        ..RetryOptions::from_env()
    });

    let report = client.run_with_history(&url, None).await;
    for err in &report.errors {
        eprintln!("{err}");
    }

    let response = report.result?;
    println!("{} {}", response.status(), response.text().await?);

    Ok(())
}
