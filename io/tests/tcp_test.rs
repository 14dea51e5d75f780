use crossbeam_channel::unbounded;
use io::{DirectServer, Source, TcpHandle, TransportResponse};
use std::{
    io::{Read, Write},
    net::TcpStream,
    ops::ControlFlow,
    time::Duration,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn framed(body: &[u8]) -> Vec<u8> {
    let mut data = (body.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(body);
    data
}

fn accepted_pair() -> (TcpStream, TcpStream, DirectServer) {
    let (tx, rx) = unbounded();
    let server = DirectServer::new("127.0.0.1:0", move |stream, _| {
        let _ = tx.send(stream);
    })
    .expect("failed to bind");

    let client = TcpStream::connect(server.local_addr()).expect("failed to connect");
    let accepted = rx.recv_timeout(TIMEOUT).expect("nothing accepted");
    (client, accepted, server)
}

#[test]
fn test_reads_frames_then_shutdown() {
    let (mut client, accepted, _server) = accepted_pair();
    let (tx, rx) = unbounded();
    let _handle = TcpHandle::new_from(accepted, 1024, move |result| {
        let event = match result {
            Ok(TransportResponse::Message(message)) => Some(message),
            Ok(TransportResponse::Shutdown(source)) => {
                assert_eq!(source, Source::Read);
                None
            }
            Err(error) => panic!("unexpected error: {}", error),
        };
        let _ = tx.send(event);
        ControlFlow::Continue(())
    });

    client.write_all(&framed(b"one")).unwrap();
    client.write_all(&framed(b"two")).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Some(b"one".to_vec()));
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Some(b"two".to_vec()));

    drop(client);
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), None);
}

#[test]
fn test_send_writes_whole_buffers() {
    let (mut client, accepted, _server) = accepted_pair();
    let handle = TcpHandle::new_from(accepted, 1024, |_| ControlFlow::Continue(()));

    handle.send(framed(b"hello")).unwrap();
    handle.send(framed(b"")).unwrap();

    client.set_read_timeout(Some(TIMEOUT)).unwrap();
    let mut received = [0u8; 13];
    client.read_exact(&mut received).unwrap();
    assert_eq!(&received[.. 9], &framed(b"hello")[..]);
    assert_eq!(&received[9 ..], &[0, 0, 0, 0]);
}

#[test]
fn test_close_unblocks_reader() {
    let (_client, accepted, _server) = accepted_pair();
    let (tx, rx) = unbounded();
    let handle = TcpHandle::new_from(accepted, 1024, move |result| {
        let _ = tx.send(matches!(result, Ok(TransportResponse::Shutdown(_))) || result.is_err());
        ControlFlow::Continue(())
    });

    handle.close();
    assert!(rx.recv_timeout(TIMEOUT).unwrap());
}
