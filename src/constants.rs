pub const TURN_TIME_LIMIT_MS: u64 = 60_000;
pub const MAX_TIMEOUTS: u32 = 3;
pub const LMS_TURN_LIMIT: u32 = 10;
pub const MAX_SUMMON_ATTEMPTS: u32 = 64;

pub const DEFAULT_ARENA_WIDTH: i32 = 8;
pub const DEFAULT_ARENA_HEIGHT: i32 = 8;
pub const POOL_SIZE_PER_PLAYER: usize = 3;

pub const WIN_REWARD: i64 = 100;
pub const PARTICIPATION_REWARD: i64 = 10;

pub const NEUTRAL_PLAYER_NAME: &str = "Neutral";

pub const GUARDIAN_DEFENSE: i32 = 2;
pub const BERSERK_ATTACK: i32 = 2;
pub const SWORD_BONUS: i32 = 2;
pub const SHIELD_BONUS: i32 = 2;
pub const BANNER_MOVEMENT: i32 = 1;
pub const FORTRESS_BONUS: i32 = 2;
pub const MIRE_PENALTY: i32 = 1;

pub fn pool_size_for_players(player_count: usize) -> usize {
    player_count.max(2) * POOL_SIZE_PER_PLAYER
}

pub fn wasted_tile_count(width: i32, height: i32) -> usize {
    let area = (width.max(0) * height.max(0)) as usize;
    if area < 16 {
        return 0;
    }
    area / 16
}

pub fn artefact_count(width: i32, height: i32) -> usize {
    let area = (width.max(0) * height.max(0)) as usize;
    (area / 12).clamp(1, 8)
}
