//! End-to-end negotiation sessions over in-memory streams.
//!
//! These tests pair a real host with a real client on `tokio::io::duplex`
//! and check negotiation outcomes beyond the unit test level.

use multistream::protocol::{Client, ClientState, Communicator, Host, ProtocolId, HANDSHAKE_ID, NA};
use multistream::MultiselectClientError;
use proptest::prelude::*;
use tokio::io::duplex;

fn host_with(protocols: &[&str]) -> Host<()> {
    let host = Host::debug();
    for p in protocols {
        host.add_handler(p.parse().unwrap(), ()).unwrap();
    }
    host
}

/// Test the documented second-candidate scenario end to end
#[tokio::test]
async fn test_second_candidate_selected() {
    let (a, b) = duplex(1024);
    let host = host_with(&["/foo/1.0.0", "/echo/1.0.0"]);

    let candidates = ["/rock/1.0.0", "/foo/1.0.0"];
    let mut client = Client::from_stream(b);
    let (hosted, selected) = tokio::join!(
        host.negotiate_stream(a),
        client.select_one_of(&candidates)
    );

    assert_eq!(selected.unwrap(), "/foo/1.0.0");
    assert_eq!(hosted.unwrap().protocol, "/foo/1.0.0");
    assert_eq!(client.state(), ClientState::Selected);
}

/// Test that both sides can keep talking the selected protocol afterwards
#[tokio::test]
async fn test_stream_usable_after_selection() {
    let (a, b) = duplex(1024);
    let host = host_with(&["/echo/1.0.0"]);

    let mut client = Client::from_stream(b);
    let (hosted, selected) = tokio::join!(
        host.negotiate_stream(a),
        client.select_protocol_or_fail("/echo/1.0.0")
    );
    selected.unwrap();

    let mut host_side = Communicator::new(hosted.unwrap().stream);
    let mut client_side = client.into_inner();

    client_side.write_message("ping").await.unwrap();
    assert_eq!(host_side.read_message().await.unwrap(), "ping");
}

/// Test `ls` followed by a selection from the listing
#[tokio::test]
async fn test_ls_round_trip() {
    let (a, b) = duplex(1024);
    let host = host_with(&["/a/1", "/b/1"]);

    let client_side = async move {
        let mut client = Client::from_stream(b);
        let listed = client.ls().await.unwrap();
        let last = listed.last().cloned().unwrap();
        (listed, client.select_protocol_or_fail(last).await)
    };

    let (hosted, (listed, selected)) = tokio::join!(host.negotiate_stream(a), client_side);

    let expected: Vec<ProtocolId> = vec!["/a/1".parse().unwrap(), "/b/1".parse().unwrap()];
    assert_eq!(listed, expected);
    assert_eq!(selected.unwrap(), "/b/1");
    assert_eq!(hosted.unwrap().protocol, "/b/1");
}

/// Test that a forced protocol gets exactly one round trip
#[tokio::test]
async fn test_select_or_fail_never_falls_back() {
    let (a, b) = duplex(1024);
    let host = host_with(&["/echo/1.0.0"]);
    let host_task = tokio::spawn(async move { host.negotiate_stream(a).await.map(|n| n.protocol) });

    let mut client = Client::from_stream(b);
    let err = client.select_protocol_or_fail("/potato/1.0.0").await.unwrap_err();
    assert!(matches!(err, MultiselectClientError::Rejected { .. }));

    // The host is still serving and accepts a fresh proposal
    let mut comm = client.into_inner();
    comm.write_message("/echo/1.0.0").await.unwrap();
    assert_eq!(comm.read_message().await.unwrap(), "/echo/1.0.0");
    assert_eq!(host_task.await.unwrap().unwrap(), "/echo/1.0.0");
}

/// Test that a reserved literal is refused locally and the host never
/// sees it
#[tokio::test]
async fn test_reserved_candidate_not_selected() {
    let (a, b) = duplex(1024);
    let host = host_with(&["/echo/1.0.0"]);
    let host_task = tokio::spawn(async move { host.negotiate_stream(a).await.map(|n| n.protocol) });

    let mut client = Client::from_stream(b);
    let err = client.select_one_of(&[NA, "/echo/1.0.0"]).await.unwrap_err();
    assert!(matches!(err, MultiselectClientError::InvalidCandidate(_)));

    // The host is still in its serving loop with nothing proposed yet
    let mut comm = client.into_inner();
    comm.write_message("/echo/1.0.0").await.unwrap();
    assert_eq!(comm.read_message().await.unwrap(), "/echo/1.0.0");
    assert_eq!(host_task.await.unwrap().unwrap(), "/echo/1.0.0");
}

/// Test that handlers registered mid-session are visible to it
#[tokio::test]
async fn test_registration_during_session() {
    let (a, b) = duplex(1024);
    let host: Host<()> = Host::new();
    let setup = host.clone();
    let host_task = tokio::spawn(async move { host.negotiate_stream(a).await.map(|n| n.protocol) });

    let mut comm = Communicator::new(b);
    comm.write_message(HANDSHAKE_ID).await.unwrap();
    assert_eq!(comm.read_message().await.unwrap(), HANDSHAKE_ID);

    comm.write_message("/late/1.0.0").await.unwrap();
    assert_eq!(comm.read_message().await.unwrap(), NA);

    setup.add_handler("/late/1.0.0".parse().unwrap(), ()).unwrap();

    comm.write_message("/late/1.0.0").await.unwrap();
    assert_eq!(comm.read_message().await.unwrap(), "/late/1.0.0");
    assert_eq!(host_task.await.unwrap().unwrap(), "/late/1.0.0");
}

/// Test many concurrent sessions against one shared host
#[tokio::test]
async fn test_concurrent_sessions_share_host() {
    let host = host_with(&["/a/1", "/b/1", "/c/1"]);
    let wanted = ["/a/1", "/b/1", "/c/1", "/zzz/1"];

    let mut tasks = Vec::new();
    for i in 0..16 {
        let (a, b) = duplex(1024);
        let host = host.clone();
        let candidate = wanted[i % wanted.len()];

        tasks.push(tokio::spawn(async move {
            let host_side = tokio::spawn(async move { host.negotiate_stream(a).await.is_ok() });
            let mut client = Client::from_stream(b);
            let result = client.select_one_of(&[candidate]).await;
            drop(client);
            let _ = host_side.await;
            (candidate, result)
        }));
    }

    for task in tasks {
        let (candidate, result) = task.await.unwrap();
        if candidate == "/zzz/1" {
            assert!(result.is_err());
        } else {
            assert_eq!(result.unwrap(), candidate);
        }
    }
}

fn protocol_strategy() -> impl Strategy<Value = String> {
    "/[a-z]{1,10}/[0-9]\\.[0-9]\\.[0-9]"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any registered protocol is selected when proposed alone.
    #[test]
    fn prop_registered_protocol_selected(protocol in protocol_strategy()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let selected = rt.block_on(async {
            let (a, b) = duplex(1024);
            let host = host_with(&[protocol.as_str()]);
            let candidates = [protocol.as_str()];
            let mut client = Client::from_stream(b);
            let (_, selected) = tokio::join!(
                host.negotiate_stream(a),
                client.select_one_of(&candidates)
            );
            selected
        });
        prop_assert_eq!(selected.unwrap(), protocol.as_str());
    }

    /// An unregistered protocol fails on the client, and the host keeps
    /// serving afterwards.
    #[test]
    fn prop_unregistered_protocol_leaves_host_serving(protocol in protocol_strategy()) {
        prop_assume!(protocol != "/registered/0.0.1");
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (err, listing) = rt.block_on(async {
            let (a, b) = duplex(1024);
            let host = host_with(&["/registered/0.0.1"]);
            let host_task = tokio::spawn(async move { host.negotiate_stream(a).await.is_ok() });

            let mut client = Client::from_stream(b);
            let err = client.select_one_of(&[protocol.as_str()]).await.unwrap_err();

            let mut comm = client.into_inner();
            comm.write_message("ls").await.unwrap();
            let listing = comm.read_message().await.unwrap();
            drop(comm);
            let _ = host_task.await;
            (err, listing)
        });
        let is_no_match = matches!(err, MultiselectClientError::NoMatch { .. });
        prop_assert!(is_no_match);
        prop_assert_eq!(listing, "/registered/0.0.1");
    }
}
