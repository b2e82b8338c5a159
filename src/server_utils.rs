use crate::constants::NEUTRAL_PLAYER_NAME;

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    let name: String = trimmed.chars().take(16).collect();
    if name.eq_ignore_ascii_case(NEUTRAL_PLAYER_NAME) {
        return format!("{name}_");
    }
    name
}

/// Makes a joining name unique among names already in the waiting room.
pub fn unique_name(name: &str, taken: &[String]) -> String {
    if !taken.iter().any(|other| other == name) {
        return name.to_string();
    }
    (2..)
        .map(|suffix| format!("{name}#{suffix}"))
        .find(|candidate| !taken.iter().any(|other| other == candidate))
        .unwrap_or_else(|| name.to_string())
}

pub fn normalize_player_count(value: usize) -> usize {
    value.clamp(2, 8)
}

pub fn normalize_turn_ms(seconds: u64) -> u64 {
    seconds.clamp(5, 600) * 1_000
}

pub fn normalize_arena_side(value: i32) -> i32 {
    value.clamp(4, 32)
}

pub fn parse_results_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse::<usize>().ok())
}
