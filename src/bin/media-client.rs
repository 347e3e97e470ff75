use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "media-client")]
#[command(about = "Upload an image or audio file to the OCR API and print the result")]
struct Args {
    /// Service base URL
    #[arg(long, env = "OCR_API_URL", default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize text in an image
    Ocr {
        file: PathBuf,

        #[arg(long, default_value = "pt")]
        lang: String,

        /// Include the raw result summary
        #[arg(long)]
        debug: bool,
    },
    /// Transcribe an audio file
    Transcribe {
        file: PathBuf,

        #[arg(long, default_value = "pt")]
        language: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let base_url = args.url.trim_end_matches('/');

    let (endpoint, file, fields, timeout, text_key) = match args.command {
        Command::Ocr { file, lang, debug } => (
            "ocr",
            file,
            vec![("lang", lang), ("debug", debug.to_string())],
            60,
            "rawText",
        ),
        Command::Transcribe { file, language } => (
            "transcribe",
            file,
            vec![("language", language)],
            120,
            "text",
        ),
    };

    let url = format!("{}/{}", base_url, endpoint);
    println!("Uploading: {}", file.display());
    println!("URL: {}", url);
    for (name, value) in &fields {
        println!("  {}={}", name, value);
    }
    println!("{}", "-".repeat(50));

    let form = build_form(&file, fields).await?;
    let response = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?
        .post(&url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Could not connect to {}", base_url))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Request failed with {}: {}", status, response.text().await.unwrap_or_default());
    }

    let body: serde_json::Value = response.json().await.context("Invalid JSON response")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
        bail!("Service reported an error: {}", error);
    }
    if let Some(text) = body.get(text_key).and_then(|t| t.as_str()) {
        println!("\nExtracted text:\n{}", text);
    }

    Ok(())
}

async fn build_form(file: &Path, fields: Vec<(&'static str, String)>) -> Result<Form> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("File not found: {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();

    let form = fields
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value));
    Ok(form.part("file", Part::bytes(data).file_name(file_name)))
}
