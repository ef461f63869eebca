//! docchat Client Binary
//!
//! Interactive client that talks to a docchat server over the REST API.
//!
//! ## Usage
//!
//! ```bash
//! # Connect to local server with a fresh session
//! cargo run --bin docchat-client
//!
//! # Resume a session and upload a document right away
//! cargo run --bin docchat-client -- --session 3f2c... --upload guide.pdf
//! ```
//!
//! Lines starting with `.` are commands (`.help` lists them); anything else
//! is a question about the uploaded documents.

use docchat::llm::ChatMessage;
use docchat::protocol::rest::dto::{
    ApiResponse, ChatRequest, ChatResponse, CreateSessionRequest, HealthDto,
};
use docchat::{SessionFiles, SessionInit, UploadReport};

use clap::Parser;
use reqwest::{Client, Url};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "docchat-client", version, about = "Chat with your documents")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Session id to resume; a new session is opened when it is no longer valid
    #[arg(long)]
    session: Option<String>,

    /// Files to upload before entering the REPL
    #[arg(long = "upload", value_name = "FILE")]
    uploads: Vec<PathBuf>,
}

/// HTTP Client state
struct HttpClient {
    client: Client,
    base: Url,
}

impl HttpClient {
    fn new(base_url: &str) -> Result<Self, String> {
        let base = Url::parse(base_url).map_err(|e| format!("Invalid server URL '{base_url}': {e}"))?;
        if base.cannot_be_a_base() {
            return Err(format!("Invalid server URL '{base_url}'"));
        }
        Ok(HttpClient {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base,
        })
    }

    /// Server URL with `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, String> {
        let status = resp.status();
        let body: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| format!("Failed to parse response ({status}): {e}"))?;
        match (body.data, body.error) {
            (Some(data), _) if body.success => Ok(data),
            (_, Some(err)) => Err(err.message),
            _ => Err(format!("Server returned {status} without data")),
        }
    }

    async fn health(&self) -> Result<HealthDto, String> {
        let resp = self
            .client
            .get(self.url(&["health"]))
            .send()
            .await
            .map_err(|e| format!("Failed to connect to server: {e}"))?;
        Self::decode(resp).await
    }

    async fn init_session(&self, hint: Option<String>) -> Result<SessionInit, String> {
        let resp = self
            .client
            .post(self.url(&["sessions"]))
            .json(&CreateSessionRequest { session_id: hint })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }

    async fn files(&self, session: &str) -> Result<SessionFiles, String> {
        let resp = self
            .client
            .get(self.url(&["sessions", session, "files"]))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }

    async fn upload(&self, session: &str, path: &Path) -> Result<UploadReport, String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("Not a file: {}", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
        let resp = self
            .client
            .put(self.url(&["sessions", session, "files", name]))
            .body(bytes)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }

    async fn remove(&self, session: &str, name: &str) -> Result<String, String> {
        let resp = self
            .client
            .delete(self.url(&["sessions", session, "files", name]))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }

    async fn chat(
        &self,
        session: &str,
        query: &str,
        history: &[ChatMessage],
    ) -> Result<ChatResponse, String> {
        let resp = self
            .client
            .post(self.url(&["sessions", session, "chat"]))
            .json(&ChatRequest {
                query: query.to_string(),
                history: history.to_vec(),
            })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }
}

struct ReplState {
    http: HttpClient,
    session_id: String,
    history: Vec<ChatMessage>,
}

impl ReplState {
    async fn print_files(&self) {
        match self.http.files(&self.session_id).await {
            Ok(files) => {
                println!("Files ({}/{}):", files.count, files.max_files);
                for file in &files.files {
                    println!("  {file}");
                }
                if let Some(warning) = files.warning {
                    println!("{warning}");
                }
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    async fn upload(&self, paths: &[PathBuf]) {
        for path in paths {
            match self.http.upload(&self.session_id, path).await {
                Ok(report) => {
                    for message in report.messages {
                        println!("{message}");
                    }
                }
                Err(e) => println!("Error: {e}"),
            }
        }
    }

    /// Open a fresh session and forget the conversation
    async fn reset_session(&mut self) -> Result<(), String> {
        let init = self.http.init_session(None).await?;
        self.session_id = init.session_id;
        self.history.clear();
        println!("New session: {}", self.session_id);
        Ok(())
    }

    async fn ask(&mut self, query: &str) {
        match self.http.chat(&self.session_id, query, &self.history).await {
            Ok(resp) => {
                println!("{}", resp.answer);
                self.history.push(ChatMessage::user(query));
                self.history.push(ChatMessage::assistant(resp.answer));
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    /// Returns `false` when the REPL should stop
    async fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        match command {
            ".quit" | ".exit" => return false,
            ".help" => print_help(),
            ".session" => println!("Session: {}", self.session_id),
            ".new" => {
                if let Err(e) = self.reset_session().await {
                    println!("Error: {e}");
                }
            }
            ".files" => self.print_files().await,
            ".upload" if !rest.is_empty() => {
                let paths: Vec<PathBuf> = rest.iter().map(PathBuf::from).collect();
                self.upload(&paths).await;
            }
            ".remove" if !rest.is_empty() => {
                let name = rest.join(" ");
                match self.http.remove(&self.session_id, &name).await {
                    Ok(message) => println!("{message}"),
                    Err(e) => println!("Error: {e}"),
                }
            }
            ".upload" | ".remove" => println!("Usage: {command} <file>"),
            other => println!("Unknown command: {other} (try .help)"),
        }
        true
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .upload <path>...   Upload and index documents");
    println!("  .files              List the session's documents");
    println!("  .remove <name>      Remove a document");
    println!("  .session            Show the session id");
    println!("  .new                Start a new session");
    println!("  .quit               Exit");
    println!("Anything else is sent as a question.");
}

async fn run_repl(state: &mut ReplState) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("docchat> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line.starts_with('.') {
                    if !state.handle_command(line).await {
                        break;
                    }
                } else {
                    state.ask(line).await;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Session {} kept; resume with --session {}", state.session_id, state.session_id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to server at {}...", args.server);
    let http = HttpClient::new(&args.server)?;

    let health = http.health().await?;
    println!("Connected! Server {} ({})", health.version, health.status);

    let init = http.init_session(args.session.clone()).await?;
    if init.reused {
        println!("Resumed session: {}", init.session_id);
    } else {
        if args.session.is_some() {
            println!("Previous session expired.");
        }
        println!("New session: {}", init.session_id);
    }
    println!("Type .help for commands.");
    println!();

    let mut state = ReplState {
        http,
        session_id: init.session_id,
        history: Vec::new(),
    };

    if !args.uploads.is_empty() {
        state.upload(&args.uploads).await;
    }

    run_repl(&mut state).await
}
