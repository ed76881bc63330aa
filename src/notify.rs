/// Fire-and-forget OS toast. Delivery failure is logged and ignored.
pub fn toast(body: &str) {
    if let Err(err) = notify_rust::Notification::new()
        .appname("shotrelay")
        .summary("shotrelay")
        .body(body)
        .show()
    {
        log::warn!("system notification failed: {err}");
    }
}
