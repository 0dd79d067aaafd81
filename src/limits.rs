/// Widest date range one board may show.
pub const MAX_DAYS_PER_VIEW: usize = 42;

/// Staff ids accepted in a view's staff filter.
pub const MAX_STAFF_FILTER_IDS: usize = 256;

/// Organizational contexts held by one registry.
pub const MAX_CONTEXTS: usize = 64;

pub const MAX_CONTEXT_NAME_LEN: usize = 128;

pub const MAX_ATTENDEES_PER_MEETING: usize = 64;

/// Longest meeting the reference store accepts.
pub const MAX_MEETING_DURATION_MINUTES: u32 = 24 * 60;
