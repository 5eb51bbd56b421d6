use pdf_chat_core::{read_uploads, ChatModel, ConversationEngine, Embedder, SessionStore, Turn};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::signal::ctrl_c;
use tracing::warn;

const HELP: &str = "\
commands:
  :upload PATH...   index PDFs (files or folders), replacing this session's documents
  :session ID       switch to another session
  :history          show this session's transcript
  :state            show this session's phase
  :help             show this help
  :sessions         list sessions seen so far
  :quit             exit (Ctrl-D or Ctrl-C at the prompt work too)
anything else is asked as a question; Ctrl-C cancels a running question or upload";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Ask(String),
    Upload(Vec<PathBuf>),
    Session(String),
    History,
    Sessions,
    State,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    let Some(command) = line.strip_prefix(':') else {
        return ReplCommand::Ask(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("upload", []) => ReplCommand::Invalid("usage: :upload PATH...".to_string()),
        ("upload", paths) => ReplCommand::Upload(paths.iter().map(PathBuf::from).collect()),
        ("session", [id]) => ReplCommand::Session((*id).to_string()),
        ("session", _) => ReplCommand::Invalid("usage: :session ID".to_string()),
        ("history", []) => ReplCommand::History,
        ("sessions", []) => ReplCommand::Sessions,
        ("state", []) => ReplCommand::State,
        ("help", []) => ReplCommand::Help,
        ("quit", []) | ("exit", []) => ReplCommand::Quit,
        _ => ReplCommand::Invalid(format!("unknown command :{name} (try :help)")),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Waits for the next line; `interrupt` resolving first ends the wait.
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
    I: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => Ok(Input::Interrupted),
        line = lines.next_line() => Ok(line?.map_or(Input::Eof, Input::Line)),
    }
}

/// Runs `future` unless `interrupt` resolves first.
async fn cancellable<F, I>(future: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => None,
        output = future => Some(output),
    }
}

pub fn print_transcript(transcript: &[Turn]) {
    println!("Chat history ({} turn(s)):", transcript.len());
    for (index, turn) in transcript.iter().enumerate() {
        println!(
            "  {}. [{}] You: {}",
            index + 1,
            turn.asked_at.format("%H:%M:%S"),
            turn.question
        );
        println!("     Assistant: {}", turn.answer);
    }
}

fn prompt<W: Write>(out: &mut W, session: &str) {
    if let Err(error) = write!(out, "[{session}] > ").and_then(|()| out.flush()) {
        warn!(error = %error, "failed to write prompt");
    }
}

pub async fn run<E, M, S>(
    engine: &ConversationEngine<E, M, S>,
    mut session: String,
    initial_pdfs: Vec<PathBuf>,
) -> anyhow::Result<()>
where
    E: Embedder,
    M: ChatModel,
    S: SessionStore,
{
    println!("Upload PDFs and chat with their content. Type :help for commands.");

    if !initial_pdfs.is_empty() {
        upload(engine, &session, &initial_pdfs).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(&mut std::io::stdout(), &session);
        let line = match next_input(&mut lines, ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Eof | Input::Interrupted => {
                println!();
                break;
            }
        };

        match parse_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Invalid(message) => eprintln!("{message}"),
            ReplCommand::Session(id) => {
                session = id;
                println!("session: {session} ({:?})", engine.phase(&session));
            }
            ReplCommand::State => {
                let turns = engine.transcript(&session).await.len();
                println!("session: {session} phase={:?} turns={turns}", engine.phase(&session));
            }
            ReplCommand::History => print_transcript(&engine.transcript(&session).await),
            ReplCommand::Sessions => {
                for id in engine.sessions().await {
                    let marker = if id == session { "*" } else { " " };
                    println!("{marker} {id} ({:?})", engine.phase(&id));
                }
            }
            ReplCommand::Upload(paths) => upload(engine, &session, &paths).await,
            ReplCommand::Ask(question) => {
                match cancellable(engine.ask(&session, &question), ctrl_c()).await {
                    Some(Ok(answer)) => {
                        println!("Assistant: {}", answer.answer);
                        print_transcript(&engine.transcript(&session).await);
                    }
                    Some(Err(error)) => {
                        warn!(session = %session, error = %error, "question failed");
                        eprintln!("error: {error}");
                    }
                    None => eprintln!("cancelled"),
                }
            }
        }
    }

    Ok(())
}

async fn upload<E, M, S>(engine: &ConversationEngine<E, M, S>, session: &str, paths: &[PathBuf])
where
    E: Embedder,
    M: ChatModel,
    S: SessionStore,
{
    let uploads = match read_uploads(paths) {
        Ok(uploads) if uploads.is_empty() => {
            eprintln!("no pdf files found");
            return;
        }
        Ok(uploads) => uploads,
        Err(error) => {
            eprintln!("error: {error}");
            return;
        }
    };

    match cancellable(engine.index_uploads(session, uploads), ctrl_c()).await {
        Some(Ok(report)) => println!(
            "indexed {} page(s) into {} segment(s)",
            report.documents, report.segments
        ),
        Some(Err(error)) => {
            warn!(session, error = %error, "upload failed");
            eprintln!("error: {error}");
        }
        None => eprintln!("cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_command("  What is the capital of France? "),
            ReplCommand::Ask("What is the capital of France?".to_string())
        );
    }

    #[test]
    fn upload_takes_several_paths() {
        assert_eq!(
            parse_command(":upload a.pdf docs/"),
            ReplCommand::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/")])
        );
        assert!(matches!(parse_command(":upload"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn session_needs_exactly_one_id() {
        assert_eq!(
            parse_command(":session work"),
            ReplCommand::Session("work".to_string())
        );
        assert!(matches!(parse_command(":session"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_command(":session a b"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn simple_commands_parse() {
        assert_eq!(parse_command(":history"), ReplCommand::History);
        assert_eq!(parse_command(":sessions"), ReplCommand::Sessions);
        assert_eq!(parse_command(":state"), ReplCommand::State);
        assert_eq!(parse_command(":help"), ReplCommand::Help);
        assert_eq!(parse_command(":quit"), ReplCommand::Quit);
        assert_eq!(parse_command(":exit"), ReplCommand::Quit);
        assert_eq!(parse_command("   "), ReplCommand::Empty);
        assert!(matches!(parse_command(":frobnicate"), ReplCommand::Invalid(_)));
    }

    #[tokio::test]
    async fn lines_are_read_until_eof() -> std::io::Result<()> {
        let mut lines = BufReader::new(&b"first\nsecond\n"[..]).lines();

        assert_eq!(
            next_input(&mut lines, std::future::pending::<()>()).await?,
            Input::Line("first".to_string())
        );
        assert_eq!(
            next_input(&mut lines, std::future::pending::<()>()).await?,
            Input::Line("second".to_string())
        );
        assert_eq!(
            next_input(&mut lines, std::future::pending::<()>()).await?,
            Input::Eof
        );
        Ok(())
    }

    #[tokio::test]
    async fn interrupt_at_the_prompt_ends_input() -> std::io::Result<()> {
        let mut lines = BufReader::new(&b"never read\n"[..]).lines();

        assert_eq!(
            next_input(&mut lines, std::future::ready(())).await?,
            Input::Interrupted
        );
        Ok(())
    }

    #[tokio::test]
    async fn interrupt_cancels_running_work() {
        let cancelled = cancellable(std::future::pending::<()>(), std::future::ready(())).await;
        assert_eq!(cancelled, None);

        let finished = cancellable(async { 42 }, std::future::pending::<()>()).await;
        assert_eq!(finished, Some(42));
    }

    /// Accepts writes but fails every flush.
    #[derive(Default)]
    struct UnflushableOutput(Vec<u8>);

    impl Write for UnflushableOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn prompt_survives_flush_failure() {
        let mut out = UnflushableOutput::default();
        prompt(&mut out, "work");
        prompt(&mut out, "work");
        assert_eq!(String::from_utf8_lossy(&out.0), "[work] > [work] > ");
    }
}
