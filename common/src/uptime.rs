/// Formats elapsed seconds as `<days> days, <HH>:<MM>:<SS>`, with days
/// unpadded and the clock fields zero-padded to two digits.
pub fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let rem = total_seconds % 86_400;
    let hours = rem / 3_600;
    let rem = rem % 3_600;
    let minutes = rem / 60;
    let seconds = rem % 60;

    format!("{days} days, {hours:02}:{minutes:02}:{seconds:02}")
}
