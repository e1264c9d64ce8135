//! mediassist: terminal client for the MediAssist backend.
//! Asks one question (argument or stdin) and prints the answer with its
//! sources, or runs an interactive chat loop with `--interactive`.

use clap::{ArgAction, Parser};
use mediassist_client::config::{self, Config};
use mediassist_client::render::{self, format_citation, format_turn};
use mediassist_client::{ChatSession, ClearOutcome, Rejection, SubmitOutcome, Turn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mediassist", version, about = "Ask the MediAssist health assistant")]
struct Cli {
    /// Config file (default: ~/.mediassist/config.yaml).
    #[arg(long, env = "MEDIASSIST_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Number of documents the backend should retrieve.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    top_k: Option<u32>,

    /// Ask without the backend's conversation memory.
    #[arg(long)]
    no_memory: bool,

    /// Seconds to wait for each backend call.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Chat interactively until EOF or /quit.
    #[arg(short, long)]
    interactive: bool,

    /// Start the interactive chat from the backend's history.
    #[arg(long, requires = "interactive")]
    resume: bool,

    /// -v info, -vv debug, -vvv trace. RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Question to ask; read from stdin when omitted.
    question: Vec<String>,
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// `--config` / `MEDIASSIST_CONFIG` must exist; the default path may not.
fn load_config(explicit: Option<&PathBuf>) -> Result<Config, String> {
    if let Some(path) = explicit {
        return config::load(path)
            .map_err(|e| format!("failed to load config from {}: {}", path.display(), e));
    }
    let Some(path) = config::default_config_path() else {
        return Ok(Config::default());
    };
    match config::load(&path) {
        Ok(cfg) => Ok(cfg),
        Err(e) if e.is_not_found() => Ok(Config::default()),
        Err(e) => Err(format!("failed to load config from {}: {}", path.display(), e)),
    }
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.base_url {
        cfg.api.base_url = Some(url.clone());
    }
    if let Some(secs) = cli.timeout {
        cfg.api.timeout_secs = Some(secs);
    }
    if let Some(k) = cli.top_k {
        cfg.query.top_k = Some(k);
    }
    if cli.no_memory {
        cfg.query.use_memory = Some(false);
    }
}

fn print_answer(out: &mut impl Write, turn: &Turn) {
    let _ = writeln!(out, "{}", turn.content);
    if !turn.sources.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for source in &turn.sources {
            let _ = writeln!(out, "  {}", format_citation(source));
        }
    }
    let _ = out.flush();
}

async fn ask_once(session: &ChatSession, question: &str) -> i32 {
    match session.submit(question).await {
        SubmitOutcome::Answered(turn) => {
            print_answer(&mut io::stdout().lock(), &turn);
            0
        }
        SubmitOutcome::Failed { error, turn } => {
            eprintln!("{}", turn.content);
            eprintln!("Error: {}", error);
            1
        }
        SubmitOutcome::Rejected(_) => {
            eprintln!("Error: no question provided");
            1
        }
    }
}

const HELP: &str = "Commands:
  /clear         forget this conversation (here and on the server)
  /history       show the server's record of this conversation
  /memory on|off toggle the server's conversation memory
  /quit          leave";

/// Exit status after Ctrl-C at the prompt (128 + SIGINT).
const INTERRUPTED: i32 = 130;

/// Forward every Ctrl-C to a channel. The first `ctrl_c()` replaces the
/// default SIGINT disposition for the whole process, so one listener serves
/// both the prompt and pending answers.
fn listen_for_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

async fn chat_loop(session: &ChatSession, resume: bool) -> i32 {
    let mut interrupts = listen_for_interrupts();
    println!("{}\n", render::DISCLAIMER);
    if resume {
        let restored = session.hydrate().await;
        for turn in session.conversation().iter() {
            println!("{}\n", format_turn(turn));
        }
        if restored > 0 {
            println!("(restored {} messages)\n", restored);
        }
    }
    println!("Ask a health-related question to get started. Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let next = tokio::select! {
            next = lines.next_line() => next,
            Some(()) = interrupts.recv() => {
                println!();
                return INTERRUPTED;
            }
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read input: {}", e);
                break;
            }
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/clear" => match session.clear().await {
                Ok(ClearOutcome::Cleared { .. }) => {
                    println!("Conversation cleared. Start fresh!")
                }
                Ok(ClearOutcome::Busy) => println!("Please wait for the current answer."),
                Err(e) => eprintln!("Error clearing history: {}", e),
            },
            "/history" => {
                let history = session.load_history().await;
                if history.is_empty() {
                    println!("No history on the server.");
                }
                for turn in history.iter() {
                    println!("{}\n", format_turn(turn));
                }
            }
            "/memory on" | "/memory off" => {
                let on = line.ends_with("on");
                session.set_use_memory(on);
                let mem = session
                    .backend_memory_len()
                    .map(|n| format!(" ({} messages stored)", n))
                    .unwrap_or_default();
                println!("Memory {}{}", if on { "on" } else { "off" }, mem);
            }
            _ if line.starts_with('/') => println!("Unknown command. {}", HELP),
            question => {
                println!("{} is thinking...", render::ASSISTANT_NAME);
                let submit = session.submit(question);
                tokio::pin!(submit);
                let outcome = tokio::select! {
                    outcome = &mut submit => outcome,
                    Some(()) = interrupts.recv() => {
                        session.cancel();
                        submit.await
                    }
                };
                match outcome {
                    SubmitOutcome::Answered(turn) => println!("{}\n", format_turn(&turn)),
                    SubmitOutcome::Failed { error, turn } => {
                        println!("{}\n", format_turn(&turn));
                        eprintln!("Error: {}", error);
                    }
                    SubmitOutcome::Rejected(Rejection::Busy) => {
                        println!("Please wait for the current answer.")
                    }
                    SubmitOutcome::Rejected(Rejection::EmptyQuery) => {}
                }
            }
        }
    }
    0
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    apply_overrides(&mut cfg, &cli);
    let settings = cfg.settings();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let session = match ChatSession::new(&settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // One-shot question: positional argument, else first line of stdin.
    let question = if cli.interactive {
        String::new()
    } else if !cli.question.is_empty() {
        cli.question.join(" ").trim().to_string()
    } else {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).unwrap_or(0);
        line.trim().to_string()
    };

    if !cli.interactive && question.is_empty() {
        eprintln!("Error: no question provided (pass it as an argument or on stdin)");
        process::exit(1);
    }

    tracing::debug!(
        base_url = %settings.base_url,
        timeout = ?settings.timeout,
        "client configured"
    );

    let code = rt.block_on(async {
        if cli.interactive {
            chat_loop(&session, cli.resume).await
        } else {
            ask_once(&session, &question).await
        }
    });
    process::exit(code);
}
