pub const EVENT_SOURCE_BUTTON: &str = "toggl-button";

pub fn button_event_topic(device_id: &str) -> String {
    format!("devices/{device_id}/events/{EVENT_SOURCE_BUTTON}")
}

pub fn status_topic(device_id: &str) -> String {
    format!("devices/{device_id}/status")
}
