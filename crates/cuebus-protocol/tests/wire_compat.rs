// Verify the wire format the web console depends on.

use cuebus_protocol::frames::{codes, EventFrame, Frame, ReqFrame, ResFrame};
use cuebus_protocol::methods;
use serde::Deserialize;

#[test]
fn req_frame_parses_method_and_params() {
    let json = r#"{"type":"req","id":"abc-123","method":"playback.control","params":{"group_id":1,"action":"start"}}"#;
    let frame: Frame = serde_json::from_str(json).unwrap();

    let req = frame.into_req().unwrap();
    assert_eq!(req.method, methods::PLAYBACK_CONTROL);
    assert_eq!(req.id, "abc-123");
    assert_eq!(req.params.unwrap()["action"], "start");
}

#[test]
fn req_frame_without_params() {
    let json = r#"{"type":"req","id":"r1","method":"state.subscribe"}"#;
    let req = serde_json::from_str::<Frame>(json).unwrap().into_req().unwrap();
    assert!(req.params.is_none());
}

#[test]
fn typed_params() {
    #[derive(Deserialize)]
    struct Remove {
        group_id: i64,
        command_id: i64,
    }

    let json = r#"{"type":"req","id":"r2","method":"commands.remove","params":{"group_id":3,"command_id":9}}"#;
    let req: ReqFrame = serde_json::from_str::<Frame>(json).unwrap().into_req().unwrap();
    let p: Remove = req.params_as().unwrap();
    assert_eq!((p.group_id, p.command_id), (3, 9));

    let bare = ReqFrame { id: "r3".into(), method: methods::PING.into(), params: None };
    assert!(bare.params_as::<Remove>().is_err());
}

#[test]
fn res_ok_serialization() {
    let res = ResFrame::ok("req-1", serde_json::json!({"pong": true}));
    let json = serde_json::to_string(&Frame::from(res)).unwrap();

    assert!(json.contains(r#""type":"res""#));
    assert!(json.contains(r#""ok":true"#));
    assert!(json.contains(r#""pong":true"#));
    // error field must be absent on success
    assert!(!json.contains(r#""error""#));
}

#[test]
fn res_err_serialization() {
    let res = ResFrame::err("req-2", codes::INVALID_PARAMS, "tag must start with '/'");
    let json = serde_json::to_string(&Frame::from(res)).unwrap();

    assert!(json.contains(r#""ok":false"#));
    assert!(json.contains(r#""INVALID_PARAMS""#));
    // payload must be absent on error
    assert!(!json.contains(r#""payload""#));
}

#[test]
fn timers_event_with_seq() {
    let ev = EventFrame::new(
        methods::EVENT_TIMERS,
        serde_json::json!({"1": {"duration": 4, "iteration": 0, "state": "running"}}),
    )
    .with_seq(42);
    let json = serde_json::to_string(&Frame::from(ev)).unwrap();

    assert!(json.contains(r#""type":"event""#));
    assert!(json.contains(r#""event":"timers""#));
    assert!(json.contains(r#""seq":42"#));
}

#[test]
fn non_req_frames_yield_no_request() {
    let json = r#"{"type":"event","event":"state","payload":{}}"#;
    let frame: Frame = serde_json::from_str(json).unwrap();
    assert!(frame.into_req().is_none(), "event frame must not parse as req");
}

#[test]
fn unknown_frame_type_is_rejected() {
    assert!(serde_json::from_str::<Frame>(r#"{"type":"hello","id":"x"}"#).is_err());
}
