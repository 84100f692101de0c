pub const APP_NAME: &str = "Herald";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_SNOWFLAKE_LENGTH: usize = 20;

// Dispatch
pub const DISPATCH_INTERVAL_SECS: u64 = 60;

// Sync
pub const SYNC_CHUNK_SIZE: usize = 100;
pub const SYNC_PACING_MS: u64 = 500;
pub const SYNC_RETRY_ATTEMPTS: u32 = 3;
pub const SYNC_RETRY_BASE_MS: u64 = 1_000;

// Discord channel-type codes
pub const CHANNEL_TYPE_TEXT: i64 = 0;
pub const CHANNEL_TYPE_DM: i64 = 1;
pub const CHANNEL_TYPE_VOICE: i64 = 2;
pub const CHANNEL_TYPE_GROUP: i64 = 3;
pub const CHANNEL_TYPE_CATEGORY: i64 = 4;
pub const CHANNEL_TYPE_NEWS: i64 = 5;

/// Channel types pulled in by a directory sync.
pub const SYNCED_CHANNEL_TYPES: [i64; 2] = [CHANNEL_TYPE_TEXT, CHANNEL_TYPE_NEWS];

pub fn channel_type_name(code: i64) -> &'static str {
    match code {
        CHANNEL_TYPE_TEXT => "text",
        CHANNEL_TYPE_DM => "dm",
        CHANNEL_TYPE_VOICE => "voice",
        CHANNEL_TYPE_GROUP => "group",
        CHANNEL_TYPE_CATEGORY => "category",
        CHANNEL_TYPE_NEWS => "news",
        _ => "unknown",
    }
}

pub fn is_supported_channel_type(code: i64) -> bool {
    (CHANNEL_TYPE_TEXT..=CHANNEL_TYPE_NEWS).contains(&code)
}
