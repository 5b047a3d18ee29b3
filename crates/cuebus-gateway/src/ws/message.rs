use cuebus_protocol::{
    frames::{EventFrame, Frame, ResFrame},
    methods,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::ws::connection::Subscriptions;
use crate::ws::send::{self, WsSink};
use crate::ws::dispatch;

/// Process one inbound WS text frame. Returns `false` when the connection
/// should close.
pub async fn handle(
    conn_id: &str,
    text: &str,
    subs: &mut Subscriptions,
    tx: &mut WsSink,
    app: &Arc<AppState>,
) -> bool {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id, error = %e, "malformed frame");
            return true;
        }
    };
    let Some(req) = frame.into_req() else {
        debug!(conn_id, "non-request frame ignored");
        return true;
    };

    match req.method.as_str() {
        methods::STATE_SUBSCRIBE => {
            let mut rx = app.engine.subscribe_state();
            let current = rx.borrow_and_update().clone();
            subs.state = Some(rx);
            debug!(conn_id, "subscribed to state");
            let res = ResFrame::ok(&req.id, serde_json::json!({ "subscribed": methods::EVENT_STATE }));
            let ev = EventFrame::new(methods::EVENT_STATE, &*current).with_seq(app.next_seq());
            send::frame(tx, res).await.is_ok() && send::frame(tx, ev).await.is_ok()
        }
        methods::TIMERS_SUBSCRIBE => {
            let mut rx = app.engine.subscribe_timers();
            let current = rx.borrow_and_update().clone();
            subs.timers = Some(rx);
            debug!(conn_id, "subscribed to timers");
            let res = ResFrame::ok(&req.id, serde_json::json!({ "subscribed": methods::EVENT_TIMERS }));
            let ev = EventFrame::new(methods::EVENT_TIMERS, &*current).with_seq(app.next_seq());
            send::frame(tx, res).await.is_ok() && send::frame(tx, ev).await.is_ok()
        }
        methods::STATE_UNSUBSCRIBE => {
            subs.state = None;
            let res = ResFrame::ok(&req.id, serde_json::json!({ "unsubscribed": methods::EVENT_STATE }));
            send::frame(tx, res).await.is_ok()
        }
        methods::TIMERS_UNSUBSCRIBE => {
            subs.timers = None;
            let res = ResFrame::ok(&req.id, serde_json::json!({ "unsubscribed": methods::EVENT_TIMERS }));
            send::frame(tx, res).await.is_ok()
        }
        method => {
            let res = dispatch::route(method, req.params.as_ref(), &req.id, app);
            send::frame(tx, res).await.is_ok()
        }
    }
}
