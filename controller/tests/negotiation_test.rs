use common::messages::{Message, RequestCode, Role};
use controller::{negotiation::evaluate_claim, ClaimRejection};

fn claim(request: RequestCode) -> Message {
    Message::peer_request(request, Vec::new())
}

#[test]
fn free_slots_are_granted() {
    for role in Role::ALL {
        assert_eq!(evaluate_claim(&claim(role.claim_code()), |_| false), Ok(role));
    }
}

#[test]
fn occupied_slot_is_refused() {
    let camera_taken = |role: Role| role == Role::Camera;

    assert_eq!(
        evaluate_claim(&claim(RequestCode::Camera), camera_taken),
        Err(ClaimRejection::SlotOccupied(Role::Camera))
    );
    assert_eq!(
        evaluate_claim(&claim(RequestCode::Display), camera_taken),
        Ok(Role::Display)
    );
}

#[test]
fn codes_without_a_role_are_refused() {
    for code in [
        RequestCode::None,
        RequestCode::Quit,
        RequestCode::CameraTakePicture,
        RequestCode::DisplayShowPicture,
        RequestCode::from_byte(0x03),
    ] {
        assert_eq!(
            evaluate_claim(&claim(code), |_| false),
            Err(ClaimRejection::UnknownRole(code))
        );
    }
}

#[test]
fn claim_must_be_a_peer_request() {
    let message = Message::request(0, RequestCode::Camera, Vec::new());
    assert_eq!(
        evaluate_claim(&message, |_| false),
        Err(ClaimRejection::NotAPeerRequest(0))
    );
}
