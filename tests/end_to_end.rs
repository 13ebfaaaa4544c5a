mod common;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpStream;
use tokio::time::timeout;

use common::{config, scripted, NoPrompt, Script, ScriptedFrontend};
use tim::config::BusyReply;
use tim::handshake::{handshake, HandshakeOutcome};
use tim::message::Message;
use tim::peer::{self, framed, receive, send, Connection, Role};
use tim::session::{Outcome, Session};
use tim::Error;

const LIMIT: Duration = Duration::from_secs(5);

/// Bob listening with a conversation in progress, and alice's raw end of it.
struct Connected {
    bob: Session<TcpStream, ScriptedFrontend>,
    bob_script: Script,
    alice: Connection,
    listening_on: SocketAddr,
}

async fn connected(busy_reply: BusyReply) -> Result<Connected> {
    let loopback: SocketAddr = "127.0.0.1:0".parse()?;
    let listener = peer::listen(&[loopback])?;
    let listening_on = listener.local_addr()?;
    let dial_addrs = [listening_on];
    let (accepted, dialed) = tokio::join!(peer::accept(listener), peer::dial(&dial_addrs));
    let (accepted, dialed) = (accepted?, dialed?);

    let mut bob_config = config(Role::Listener, "bob");
    bob_config.busy_reply = busy_reply;

    let mut bob_conn = framed(accepted.stream);
    let mut alice = framed(dialed.stream);
    let alice_config = config(Role::Dialer, "alice");
    let (mut bob_prompt, mut alice_prompt) = (NoPrompt, NoPrompt);
    let (bob_greeted, alice_greeted) = tokio::join!(
        handshake(&mut bob_conn, &bob_config, accepted.peer_addr, &mut bob_prompt),
        handshake(
            &mut alice,
            &alice_config,
            dialed.peer_addr,
            &mut alice_prompt
        ),
    );
    assert_eq!(
        bob_greeted?,
        HandshakeOutcome::Talking {
            peer_nick: "alice".into()
        }
    );
    assert_eq!(
        alice_greeted?,
        HandshakeOutcome::Talking {
            peer_nick: "bob".into()
        }
    );

    let (bob_frontend, bob_script) = scripted();
    let bob = Session::new(
        bob_config,
        "alice".into(),
        bob_conn,
        accepted.listener,
        bob_frontend,
    );
    Ok(Connected {
        bob,
        bob_script,
        alice,
        listening_on,
    })
}

#[tokio::test]
async fn hello_round_trip() -> Result<()> {
    let Connected {
        mut bob,
        mut bob_script,
        alice,
        ..
    } = connected(BusyReply::Established).await?;
    let (alice_frontend, mut alice_script) = scripted();
    let mut alice = Session::new(
        config(Role::Dialer, "alice"),
        "bob".into(),
        alice,
        None,
        alice_frontend,
    );

    let conversation = async {
        alice_script.type_line("hello");
        assert_eq!(bob_script.next_line().await, "alice: hello");

        // Bob's reply follows his ACK on the wire, so once alice shows it her ACK is in.
        bob_script.type_line("hi alice");
        assert_eq!(alice_script.next_line().await, "alice: hello");
        assert_eq!(alice_script.next_line().await, "bob: hi alice");
        alice_script.quit();
    };
    let (bob_outcome, alice_outcome, ()) =
        timeout(LIMIT, async { tokio::join!(bob.run(), alice.run(), conversation) }).await?;

    assert_eq!(alice_outcome?, Outcome::LocalQuit);
    assert_eq!(bob_outcome?, Outcome::PeerQuit);

    let sent = alice.ledger().get(1).expect("hello is tracked");
    assert_eq!(sent.body, "hello");
    assert!(sent.acknowledged);
    assert_eq!(alice.ledger().unacknowledged_count(), 0);
    assert_eq!(bob.ledger().unacknowledged_count(), 0);

    assert_eq!(alice_script.lines(), ["tim: You ended the conversation"]);
    assert_eq!(
        bob_script.lines(),
        ["bob: hi alice", "tim: alice has ended the conversation"]
    );
    Ok(())
}

#[tokio::test]
async fn declined_dialer_sees_busy() -> Result<()> {
    struct Decline;

    impl tim::handshake::Prompt for Decline {
        fn confirm(&mut self, _question: &str) -> std::io::Result<Option<bool>> {
            Ok(Some(false))
        }
    }

    let loopback: SocketAddr = "127.0.0.1:0".parse()?;
    let listener = peer::listen(&[loopback])?;
    let addr = listener.local_addr()?;
    let dial_addrs = [addr];
    let (accepted, dialed) = tokio::join!(peer::accept(listener), peer::dial(&dial_addrs));
    let (accepted, dialed) = (accepted?, dialed?);

    let mut bob_config = config(Role::Listener, "bob");
    bob_config.assume_yes = false;
    let mut bob_conn = framed(accepted.stream);
    let mut alice_conn = framed(dialed.stream);
    let alice_config = config(Role::Dialer, "alice");
    let (mut bob_prompt, mut alice_prompt) = (Decline, NoPrompt);
    let (bob_greeted, alice_greeted) = tokio::join!(
        handshake(&mut bob_conn, &bob_config, accepted.peer_addr, &mut bob_prompt),
        handshake(
            &mut alice_conn,
            &alice_config,
            dialed.peer_addr,
            &mut alice_prompt
        ),
    );

    assert_eq!(bob_greeted?, HandshakeOutcome::Declined);
    match alice_greeted {
        Err(err @ Error::PeerBusy) => assert_eq!(err.to_string(), "Your peer is busy"),
        other => panic!("expected busy, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn second_caller_is_turned_away_on_its_own_connection() -> Result<()> {
    let Connected {
        mut bob,
        mut alice,
        listening_on,
        ..
    } = connected(BusyReply::Newcomer).await?;

    let caller = async {
        let mut carol = framed(TcpStream::connect(listening_on).await?);
        assert_eq!(receive(&mut carol, "bob").await?, Message::Busy);
        send(&mut alice, Message::Quit).await?;
        anyhow::Ok(())
    };
    let (bob_result, caller) = timeout(LIMIT, async { tokio::join!(bob.run(), caller) }).await?;
    caller?;
    assert_eq!(bob_result?, Outcome::PeerQuit);

    // Nothing reached alice before the connection closed.
    drop(bob);
    assert!(matches!(
        receive(&mut alice, "bob").await,
        Err(Error::PeerDisconnect { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn second_caller_busy_lands_on_the_established_connection() -> Result<()> {
    let Connected {
        mut bob,
        mut alice,
        listening_on,
        ..
    } = connected(BusyReply::Established).await?;

    let caller = async {
        let mut carol = framed(TcpStream::connect(listening_on).await?);
        assert_eq!(receive(&mut alice, "bob").await?, Message::Busy);
        // Carol's socket is just closed.
        assert!(matches!(
            receive(&mut carol, "bob").await,
            Err(Error::PeerDisconnect { .. })
        ));
        send(&mut alice, Message::Quit).await?;
        anyhow::Ok(())
    };
    let (bob_result, caller) = timeout(LIMIT, async { tokio::join!(bob.run(), caller) }).await?;
    caller?;
    assert_eq!(bob_result?, Outcome::PeerQuit);
    Ok(())
}
