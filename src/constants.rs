pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
pub const CLOUDINARY_FILE_FOLDER: &str = "worksheet-hub/files";
pub const CLOUDINARY_THUMB_FOLDER: &str = "worksheet-hub/thumbnails";

pub const GDRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id,webContentLink";
pub const GDRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

pub const MAX_UPLOAD_BYTES: usize = 120 * 1024 * 1024;

pub const HISTORY_LIMIT: i64 = 50;
pub const WEEKLY_LEADERBOARD_SIZE: i64 = 10;

/// How often the weekly reward job wakes up to check for an unpaid week.
pub const REWARD_TICK_INTERVAL_SECS: u64 = 6 * 60 * 60;
