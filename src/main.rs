use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tim::config::{self, Cli};
use tim::handshake::{handshake, HandshakeOutcome};
use tim::peer::{self, Role};
use tim::session::Session;
use tim::terminal::{RawMode, StdinPrompt, Terminal};
use tim::{Error, PROGRAM};

/// Environment variable holding the log filter, e.g. `TIM_LOG=tim=debug`.
const LOG_ENV: &str = "TIM_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and succeed; usage errors fail.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let Some((role, addr)) = cli.role() else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(&cli, role, addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{PROGRAM}: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, role: Role, addr: Option<&str>) -> Result<(), Error> {
    let config = cli.session_config(role)?;
    let candidates = config::resolve(addr).await?;

    let established = match role {
        Role::Listener => {
            let listener = peer::listen(&candidates)?;
            peer::accept(listener).await?
        }
        Role::Dialer => peer::dial(&candidates).await?,
    };
    let mut conn = peer::framed(established.stream);

    let peer_nick = match handshake(&mut conn, &config, established.peer_addr, &mut StdinPrompt)
        .await?
    {
        HandshakeOutcome::Talking { peer_nick } => peer_nick,
        HandshakeOutcome::Declined => {
            println!("{PROGRAM}: You declined the conversation");
            return Ok(());
        }
        HandshakeOutcome::Abandoned => {
            debug!("input closed before the conversation was accepted");
            return Ok(());
        }
    };
    println!("{PROGRAM}: You are now talking to {peer_nick}");

    let raw_mode = RawMode::enable().map_err(|err| Error::io("enable raw mode", err))?;
    let mut session = Session::new(
        config,
        peer_nick,
        conn,
        established.listener,
        Terminal::new(),
    );
    let result = session.run().await;
    let unacknowledged = session.ledger().unacknowledged_count();
    drop(session);
    drop(raw_mode);

    if let Ok(outcome) = &result {
        debug!(?outcome, "conversation over");
    }
    if unacknowledged > 0 {
        eprintln!("{PROGRAM}: Your last {unacknowledged} message(s) may not have been sent");
    }
    result.map(|_| ())
}
