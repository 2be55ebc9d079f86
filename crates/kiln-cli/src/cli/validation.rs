/// Parse a `--port` value.
///
/// 0 is accepted and means "any free port".
pub fn parse_port(s: &str) -> Result<u16, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Port cannot be empty".to_string());
    }
    trimmed
        .parse::<u16>()
        .map_err(|_| format!("Port must be a number between 0 and 65535: '{s}'"))
}
