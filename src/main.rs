//! Project Lookup - interactive client for the employee project lookup server.
//!
//! Resolves configuration from defaults, environment and flags, then runs
//! the prompt loop over stdin/stdout. Logs go to stderr.

use std::io::Read;

use anyhow::{Context, Result};
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use project_lookup::config::USAGE;
use project_lookup::prompt::{self, LoopOptions};
use project_lookup::{LookupClient, StartupOptions};

/// Pipe buffer between the stdin thread and the prompt loop.
const STDIN_PIPE_SIZE: usize = 4096;

/// Copy stdin into an in-process pipe from a detached OS thread.
///
/// The blocking read stays off the runtime's blocking pool, which runtime
/// shutdown would otherwise wait on until the next line arrives.
fn spawn_stdin_pump() -> Result<DuplexStream> {
    let (reader, mut writer) = tokio::io::duplex(STDIN_PIPE_SIZE);
    let handle = tokio::runtime::Handle::current();

    std::thread::Builder::new()
        .name("stdin-pump".into())
        .spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut chunk = [0u8; 1024];
            loop {
                let n = match stdin.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                if handle.block_on(writer.write_all(&chunk[..n])).is_err() {
                    break;
                }
            }
            // Dropping the writer signals EOF to the prompt loop.
        })
        .context("failed to spawn stdin thread")?;

    Ok(reader)
}

/// Register the interrupt handler before the first prompt and count deliveries.
#[cfg(unix)]
fn listen_for_interrupts() -> Result<watch::Receiver<u64>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupts =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let (tx, rx) = watch::channel(0u64);
    tokio::spawn(async move {
        while interrupts.recv().await.is_some() {
            tx.send_modify(|count| *count += 1);
        }
    });
    Ok(rx)
}

#[cfg(not(unix))]
fn listen_for_interrupts() -> Result<watch::Receiver<u64>> {
    let (tx, rx) = watch::channel(0u64);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tx.send_modify(|count| *count += 1);
        }
    });
    Ok(rx)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Keep stdout clean for the operator; diagnostics go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "project_lookup=warn".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let options = StartupOptions::from_process().context("invalid startup configuration")?;
    if options.show_help {
        print!("{}", USAGE);
        return Ok(());
    }

    tracing::info!(
        "Starting project-lookup v{} against {} ({} framing)",
        env!("CARGO_PKG_VERSION"),
        options.client.addr,
        options.client.framing
    );

    let interrupts = listen_for_interrupts()?;
    let stdin = BufReader::new(spawn_stdin_pump()?);
    let mut stdout = tokio::io::stdout();
    let client = LookupClient::new(options.client);

    let summary = prompt::run(
        &client,
        stdin,
        &mut stdout,
        LoopOptions {
            verbose: options.verbose,
        },
        || {
            // Only interrupts delivered from now on count.
            let mut rx = interrupts.clone();
            let _ = rx.borrow_and_update();
            async move {
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        },
    )
    .await
    .context("terminal I/O failed")?;

    tracing::info!(
        lookups = summary.lookups,
        failures = summary.failures,
        invalid_inputs = summary.invalid_inputs,
        "Client stopped"
    );
    Ok(())
}
