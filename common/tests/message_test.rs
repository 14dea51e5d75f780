mod helper;
use crate::helper::test_write;
use common::messages::{Error, Inbound, Message, MessageComponent, RequestCode, ResponseCode};

#[test]
fn test_role_claim() {
    let bytes = [0xff, 0x01, 0x00];
    let message = Message::from_bytes(&bytes).unwrap();
    assert_eq!(message.request_id, 255);
    assert_eq!(message.request, RequestCode::Camera);
    assert_eq!(message.response, ResponseCode::None);
    assert!(message.payload.is_empty());
    assert!(message.is_peer_request());
    test_write(&message, &bytes);
}

#[test]
fn test_reply() {
    let message = Message::reply(255, ResponseCode::Ok);
    test_write(&message, &[0xff, 0x00, 0x01]);
}

#[test]
fn test_request_with_payload() {
    let bytes = [0x07, 0x22, 0x00, 0xff, 0xd8, 0xff, 0xe0];
    let message = Message::from_bytes(&bytes).unwrap();
    assert_eq!(
        message,
        Message::request(7, RequestCode::DisplayShowPicture, vec![0xff, 0xd8, 0xff, 0xe0])
    );
    test_write(&message, &bytes);
}

#[test]
fn test_round_trip() {
    let payloads: [&[u8]; 3] = [b"", b"\x01", b"a larger payload than the header"];

    for &request in RequestCode::ALL {
        for &response in ResponseCode::ALL {
            for (request_id, payload) in [0u8, 128, 254, 255].into_iter().zip(payloads.iter().cycle()) {
                let message = Message {
                    request_id,
                    request,
                    response,
                    payload: payload.to_vec(),
                };
                let bytes = message.to_bytes(false).unwrap();
                assert_eq!(Message::from_bytes(&bytes).unwrap(), message);
            }
        }
    }
}

#[test]
fn test_too_short() {
    for len in 0 .. 3 {
        let bytes = vec![0u8; len];
        match Message::from_bytes(&bytes) {
            Err(Error::MalformedMessage { len: got }) => assert_eq!(got, len),
            other => panic!("expected malformed message, got {:?}", other),
        }
    }
}

#[test]
fn test_unknown_codes_survive() {
    let bytes = [0xff, 0x33, 0x09];
    let message = Message::from_bytes(&bytes).unwrap();
    assert_eq!(message.request, RequestCode::Unknown(0x33));
    assert_eq!(message.response, ResponseCode::Unknown(0x09));
    test_write(&message, &bytes);
}

#[test]
fn test_into_inbound() {
    let request = Message::peer_request(RequestCode::Quit, vec![]).into_inbound();
    assert_eq!(
        request,
        Inbound::Request {
            request: RequestCode::Quit,
            payload: vec![],
        }
    );

    let response = Message {
        request_id: 0,
        request: RequestCode::None,
        response: ResponseCode::Ack,
        payload: b"jpeg".to_vec(),
    }
    .into_inbound();
    assert_eq!(
        response,
        Inbound::Response {
            request_id: 0,
            response: ResponseCode::Ack,
            payload: b"jpeg".to_vec(),
        }
    );
}
