/// Marker printed by ffmpeg's `metadata=print` filter for scene changes.
pub const SCENE_SCORE_MARKER: &str = "scene_score=";

/// Pull the scene-change score out of one diagnostic line.
///
/// ```text
/// [Parsed_metadata_1 @ 0x55d1] lavfi.scene_score=0.321457
/// ```
///
/// The value is the longest run of digits, `.` and `-` right after the
/// marker. Lines without the marker, or whose value does not parse as a
/// finite float, yield `None`.
pub fn parse_scene_score(line: &str) -> Option<f64> {
    let idx = line.find(SCENE_SCORE_MARKER)?;
    let rest = &line[idx + SCENE_SCORE_MARKER.len()..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
