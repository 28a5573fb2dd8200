//! Interactive loop over stdin.
//!
//! Plain lines are prompts, lines starting with `/` are commands. Attachments
//! load in a spawned task so text-only turns are not held up by a slow read.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parley_chat::{
    AnswerService, AttachmentError, AttachmentLoader, AttachmentSource, ChatSession, LoadOutcome,
    PathSource,
};
use parley_core::{BehaviorMode, ChartType, Preferences, ThemeVariant};
use parley_ui::{token_footer, TranscriptRenderer};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const HELP: &str = "\
Commands:
  /attach PATH        read a text file to send with the next prompt
  /detach             drop the current attachment
  /abort              cancel an attachment that is still reading
  /retry [INDEX]      re-send the turn behind an error message
  /graph [TYPE]       ask for a bar, line or pie chart
  /mode [MODE]        show or set the behavior mode
  /theme [THEME]      show, set or toggle the theme
  /history            print the whole transcript
  /tokens             token usage for the last turn and in total
  /thread             current thread identifier
  /health             probe the answering service
  /quit               exit";

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Prompt(String),
    Attach(PathBuf),
    Detach,
    Abort,
    Retry(Option<usize>),
    Graph(Option<ChartType>),
    Mode(Option<BehaviorMode>),
    Theme(Option<ThemeVariant>),
    History,
    Tokens,
    Thread,
    Health,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Prompt(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "attach" => Command::Attach(PathBuf::from(arg.ok_or("usage: /attach PATH")?)),
            "detach" => Command::Detach,
            "abort" => Command::Abort,
            "retry" => Command::Retry(
                arg.map(|a| a.parse().map_err(|_| format!("not a message index: {}", a)))
                    .transpose()?,
            ),
            "graph" => Command::Graph(arg.map(str::parse).transpose()?),
            "mode" => Command::Mode(arg.map(str::parse).transpose()?),
            "theme" => Command::Theme(arg.map(str::parse).transpose()?),
            "history" => Command::History,
            "tokens" => Command::Tokens,
            "thread" => Command::Thread,
            "health" => Command::Health,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command /{} (try /help)", other)),
        };
        Ok(Some(command))
    }
}

// =============================================================================
// Loop
// =============================================================================

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Repl<S: AnswerService, W: Write> {
    session: ChatSession<S>,
    loader: Arc<AttachmentLoader>,
    renderer: TranscriptRenderer,
    prefs_path: Option<PathBuf>,
    out: W,
    printed: usize,
    /// Attachment results reported by background loads.
    notice_tx: mpsc::UnboundedSender<String>,
    notices: mpsc::UnboundedReceiver<String>,
}

impl<S: AnswerService, W: Write> Repl<S, W> {
    pub fn new(session: ChatSession<S>, loader: Arc<AttachmentLoader>, out: W) -> Self {
        let (notice_tx, notices) = mpsc::unbounded_channel();
        Self {
            session,
            loader,
            renderer: TranscriptRenderer::default(),
            prefs_path: None,
            out,
            printed: 0,
            notice_tx,
            notices,
        }
    }

    /// Persist theme changes to this preferences file.
    pub fn with_prefs_path(mut self, path: PathBuf) -> Self {
        self.prefs_path = Some(path);
        self
    }

    #[cfg(test)]
    pub fn session(&self) -> &ChatSession<S> {
        &self.session
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Read lines until EOF or `/quit`.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> std::io::Result<()> {
        let mut lines = input.lines();
        writeln!(self.out, "Parley. Type a question, or /help for commands.")?;
        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;
            let line = tokio::select! {
                biased;
                Some(notice) = self.notices.recv() => {
                    writeln!(self.out, "\n[attachment] {}", notice)?;
                    continue;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                break;
            };
            match Command::parse(&line) {
                Ok(Some(command)) => {
                    if self.handle(command).await? == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(message) => writeln!(self.out, "{}", message)?,
            }
        }
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) -> std::io::Result<Flow> {
        match command {
            Command::Prompt(text) => {
                let result = self.session.submit(&text, Some(self.loader.as_ref())).await;
                self.report_turn(result)?;
            }
            Command::Graph(chart_type) => {
                let result = self.session.request_graph(chart_type).await;
                self.report_turn(result)?;
            }
            Command::Retry(index) => {
                let Some(index) = index.or_else(|| self.last_error_index()) else {
                    writeln!(self.out, "nothing to retry")?;
                    return Ok(Flow::Continue);
                };
                let result = self.session.retry(index).await;
                if result.is_ok() {
                    self.printed = self.printed.min(index);
                }
                self.report_turn(result)?;
            }
            Command::Attach(path) => self.attach(path).await?,
            Command::Detach => {
                self.loader.clear();
                writeln!(self.out, "attachment cleared")?;
            }
            Command::Abort => {
                if self.loader.abort() {
                    writeln!(self.out, "attachment read aborted")?;
                } else {
                    writeln!(self.out, "no attachment is reading")?;
                }
            }
            Command::Mode(None) => {
                writeln!(self.out, "mode: {}", self.session.behavior_mode())?;
            }
            Command::Mode(Some(mode)) => {
                self.session.set_behavior_mode(mode);
                writeln!(self.out, "mode set to {}", mode)?;
            }
            Command::Theme(theme) => {
                let theme = theme.unwrap_or_else(|| self.session.theme().toggled());
                self.set_theme(theme);
                writeln!(self.out, "theme set to {}", theme)?;
            }
            Command::History => {
                for line in self.renderer.render(&self.session.messages()) {
                    writeln!(self.out, "{}", line)?;
                }
                self.printed = self.session.len();
            }
            Command::Tokens => {
                writeln!(self.out, "last turn: {}", token_footer(self.session.tokens()))?;
                writeln!(self.out, "total:     {}", token_footer(self.session.total_tokens()))?;
            }
            Command::Thread => match self.session.thread_id() {
                Some(id) => writeln!(self.out, "thread: {}", id)?,
                None => writeln!(self.out, "thread: (none yet)")?,
            },
            Command::Health => match self.session.health_check().await {
                Ok(body) => {
                    let message = body
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| body.to_string());
                    writeln!(self.out, "service ok: {}", message)?;
                }
                Err(e) => writeln!(self.out, "service unavailable: {}", e)?,
            },
            Command::Help => writeln!(self.out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Print whatever the turn added, or why it was rejected.
    fn report_turn<T>(&mut self, result: Result<T, parley_chat::ChatError>) -> std::io::Result<()> {
        if let Err(e) = result {
            return writeln!(self.out, "{}", e);
        }
        let messages = self.session.messages();
        let start = self.printed.min(messages.len());
        for line in self.renderer.render(&messages[start..]) {
            writeln!(self.out, "{}", line)?;
        }
        self.printed = messages.len();
        Ok(())
    }

    async fn attach(&mut self, path: PathBuf) -> std::io::Result<()> {
        let source = match PathSource::open(&path).await {
            Ok(source) => source,
            Err(e) => return writeln!(self.out, "cannot attach {}: {}", path.display(), e),
        };
        if source.size() > self.loader.max_bytes() {
            let e = AttachmentError::TooLarge {
                size: source.size(),
                limit: self.loader.max_bytes(),
            };
            self.loader.clear();
            return writeln!(self.out, "cannot attach {}: {}", source.name(), e);
        }

        writeln!(self.out, "reading {} ({} bytes)", source.name(), source.size())?;
        let loader = Arc::clone(&self.loader);
        let notices = self.notice_tx.clone();
        tokio::spawn(async move {
            let notice = match loader.load(&source).await {
                Ok(LoadOutcome::Ready) => format!("{} is ready", source.name()),
                Ok(LoadOutcome::Stale) => {
                    debug!(name = %source.name(), "Stale attachment read dropped");
                    return;
                }
                Err(AttachmentError::ReadAborted) => return,
                Err(e) => format!("{}: {}", source.name(), e),
            };
            // The loop may already have exited.
            let _ = notices.send(notice);
        });
        Ok(())
    }

    fn set_theme(&mut self, theme: ThemeVariant) {
        self.session.set_theme(theme);
        let Some(ref path) = self.prefs_path else {
            return;
        };
        let mut prefs = Preferences::load(path);
        prefs.theme = Some(theme);
        if let Err(e) = prefs.save(path) {
            warn!(path = %path.display(), error = %e, "Failed to persist theme");
        }
    }

    fn last_error_index(&self) -> Option<usize> {
        self.session
            .messages()
            .iter()
            .rev()
            .find(|m| m.is_error)
            .map(|m| m.sequence_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_chat::{MockAnswerService, SessionOptions, TransportError};
    use parley_core::AttachmentPhase;
    use serde_json::json;

    fn repl(replies: Vec<Result<serde_json::Value, TransportError>>) -> Repl<MockAnswerService, Vec<u8>> {
        let session = ChatSession::new(
            MockAnswerService::with_replies(replies),
            SessionOptions::default(),
        );
        Repl::new(session, Arc::new(AttachmentLoader::default()), Vec::new())
    }

    fn output(repl: Repl<MockAnswerService, Vec<u8>>) -> String {
        String::from_utf8(repl.into_output()).unwrap()
    }

    #[test]
    fn test_parse_prompt_and_blank() {
        assert_eq!(Command::parse("   "), Ok(None));
        assert_eq!(
            Command::parse("  how many rows? "),
            Ok(Some(Command::Prompt("how many rows?".into())))
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/attach data/sales.csv"),
            Ok(Some(Command::Attach(PathBuf::from("data/sales.csv"))))
        );
        assert_eq!(Command::parse("/retry"), Ok(Some(Command::Retry(None))));
        assert_eq!(Command::parse("/retry 3"), Ok(Some(Command::Retry(Some(3)))));
        assert_eq!(
            Command::parse("/graph pie"),
            Ok(Some(Command::Graph(Some(ChartType::Pie))))
        );
        assert_eq!(
            Command::parse("/mode Structured"),
            Ok(Some(Command::Mode(Some(BehaviorMode::Structured))))
        );
        assert_eq!(Command::parse("/theme"), Ok(Some(Command::Theme(None))));
        assert_eq!(Command::parse("/QUIT"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("/attach").is_err());
        assert!(Command::parse("/retry last").is_err());
        assert!(Command::parse("/graph scatter").is_err());
        assert!(Command::parse("/frobnicate").is_err());
    }

    #[tokio::test]
    async fn test_run_prints_turns_until_quit() {
        let mut r = repl(vec![Ok(json!({"response": "Hi there", "input_tokens": 2, "output_tokens": 3}))]);
        let input: &[u8] = b"hello\n/tokens\n/quit\nnever sent\n";
        r.run(input).await.unwrap();

        assert_eq!(r.session().service().call_count(), 1);
        let text = output(r);
        assert!(text.contains("[0] You: hello"));
        assert!(text.contains("[1] Agent: Hi there"));
        assert!(text.contains("Tokens: 2 in / 3 out"));
        assert!(!text.contains("never sent"));
    }

    #[tokio::test]
    async fn test_retry_defaults_to_last_error() {
        let mut r = repl(vec![
            Err(TransportError::new("connection refused")),
            Ok(json!({"response": "recovered"})),
        ]);
        r.handle(Command::Prompt("A".into())).await.unwrap();
        assert!(r.session().message(1).unwrap().is_error);

        r.handle(Command::Retry(None)).await.unwrap();
        let messages = r.session().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "recovered");

        let text = output(r);
        assert!(text.contains("(use /retry 1 to try again)"));
        assert!(text.contains("[1] Agent: recovered"));
    }

    #[tokio::test]
    async fn test_empty_submission_reported() {
        let mut r = repl(vec![]);
        r.handle(Command::Retry(None)).await.unwrap();
        let flow = r.handle(Command::Prompt(" ".into())).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        let text = output(r);
        assert!(text.contains("nothing to retry"));
        assert!(text.contains("nothing to send"));
    }

    #[tokio::test]
    async fn test_attach_then_send() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "region,total\nnorth,4\n").unwrap();

        let mut r = repl(vec![Ok(json!({"response": "two columns"}))]);
        r.handle(Command::Attach(path)).await.unwrap();
        assert_eq!(r.notices.recv().await.as_deref(), Some("sales.csv is ready"));
        assert_eq!(r.loader.phase(), AttachmentPhase::Ready);

        r.handle(Command::Prompt("describe it".into())).await.unwrap();
        let request = &r.session().service().requests()[0];
        assert_eq!(request.file_content.as_deref(), Some("region,total\nnorth,4\n"));
        assert_eq!(r.loader.phase(), AttachmentPhase::Idle);
        assert!(output(r).contains("[attached: sales.csv]"));
    }

    #[tokio::test]
    async fn test_attach_failure_notice_goes_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.dat");
        std::fs::write(&path, [0xff_u8, 0xfe]).unwrap();

        let mut r = repl(vec![]);
        r.handle(Command::Attach(path)).await.unwrap();
        let notice = r.notices.recv().await.unwrap();
        assert!(notice.starts_with("binary.dat: "));
        assert_eq!(r.loader.phase(), AttachmentPhase::Error);

        // The loop prints the queued notice before the next line is read.
        r.notice_tx.send(notice).unwrap();
        r.run(tokio::io::BufReader::new(tokio::io::empty())).await.unwrap();
        let text = output(r);
        assert!(text.contains("[attachment] binary.dat: read failed"));
    }

    #[tokio::test]
    async fn test_attach_missing_file() {
        let mut r = repl(vec![]);
        r.handle(Command::Attach(PathBuf::from("/definitely/not/here.csv")))
            .await
            .unwrap();
        assert!(output(r).contains("cannot attach"));
    }

    #[tokio::test]
    async fn test_theme_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = dir.path().join("prefs.toml");
        let mut r = repl(vec![]).with_prefs_path(prefs.clone());

        r.handle(Command::Theme(None)).await.unwrap();
        assert_eq!(r.session().theme(), ThemeVariant::Dark);
        assert_eq!(Preferences::load(&prefs).theme, Some(ThemeVariant::Dark));

        r.handle(Command::Theme(Some(ThemeVariant::Light))).await.unwrap();
        assert_eq!(Preferences::load(&prefs).theme, Some(ThemeVariant::Light));
    }

    #[tokio::test]
    async fn test_graph_shortcut_uses_default_type() {
        let mut r = repl(vec![Ok(json!({
            "response": "chart",
            "graph_data": {"type": "bar", "labels": ["a"], "values": [1]},
        }))]);
        r.handle(Command::Graph(None)).await.unwrap();
        let request = &r.session().service().requests()[0];
        assert!(request.is_graph_request);
        assert_eq!(request.graph_type, Some(ChartType::Bar));
        assert!(output(r).contains("Show me a bar graph"));
    }
}
