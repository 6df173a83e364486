use super::MediaMetadata;

const LIVE_STATUSES: &[&str] = &["is_live", "is_upcoming"];

/// Whether probed metadata describes a live or scheduled stream.
///
/// Extractors disagree on which fields they fill in, so any one signal is
/// enough: the `live_status` enumeration or either boolean flag.
pub fn is_live_content(metadata: &MediaMetadata) -> bool {
    let status_live = metadata
        .live_status
        .as_deref()
        .map(|status| status.trim().to_ascii_lowercase())
        .is_some_and(|status| LIVE_STATUSES.contains(&status.as_str()));

    status_live || metadata.is_live == Some(true) || metadata.is_upcoming == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(status: Option<&str>, is_live: Option<bool>, is_upcoming: Option<bool>) -> MediaMetadata {
        MediaMetadata {
            live_status: status.map(str::to_string),
            is_live,
            is_upcoming,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_field_alone_marks_live() {
        assert!(is_live_content(&metadata(Some("is_live"), None, None)));
        assert!(is_live_content(&metadata(Some("is_upcoming"), Some(false), None)));
        assert!(is_live_content(&metadata(Some(" IS_LIVE "), None, None)));
    }

    #[test]
    fn test_flags_alone_mark_live() {
        assert!(is_live_content(&metadata(None, Some(true), None)));
        assert!(is_live_content(&metadata(Some("not_live"), None, Some(true))));
    }

    #[test]
    fn test_recorded_content_is_not_live() {
        assert!(!is_live_content(&metadata(None, None, None)));
        assert!(!is_live_content(&metadata(Some("not_live"), Some(false), Some(false))));
        assert!(!is_live_content(&metadata(Some("was_live"), None, None)));
        assert!(!is_live_content(&metadata(Some("post_live"), Some(false), None)));
    }
}
