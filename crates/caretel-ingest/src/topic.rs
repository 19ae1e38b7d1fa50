use caretel_domain::{DomainError, DomainResult};

/// Extracts the device identifier embedded in a vendor publish topic.
///
/// Vendor gateways publish on topics shaped like `<prefix>/<identifier>/<suffix>`,
/// so the identifier is always the second-to-last segment. Topics with fewer
/// than three segments cannot carry an identifier and are rejected.
pub fn device_identifier(topic: &str) -> DomainResult<&str> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 3 {
        return Err(DomainError::TopicShapeViolation(topic.to_string()));
    }

    Ok(segments[segments.len() - 2])
}

/// Matches a concrete topic against an MQTT subscription filter,
/// honoring the `+` single-level and `#` multi-level wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_segments = filter.split('/');
    let mut topic_segments = topic.split('/');

    loop {
        match (filter_segments.next(), topic_segments.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(expected), Some(actual)) if expected == actual => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
