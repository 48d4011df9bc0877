//! Document store collection names.

pub const BOOKINGS: &str = "bookings";
pub const COURSES: &str = "courses";
pub const TEE_TIMES: &str = "teeTimes";
pub const USERS: &str = "users";
pub const REVIEWS: &str = "reviews";
pub const GUEST_DRAFTS: &str = "guestBookingDrafts";
pub const EMAIL_LOGS: &str = "email_logs";
pub const PAYMENT_METHODS: &str = "paymentMethods";
pub const MIGRATION_AUDIT: &str = "migrationAudit";
pub const BACKUPS: &str = "backups";
pub const BACKUP_SNAPSHOTS: &str = "backupSnapshots";

pub const PRICING_SEASONS: &str = "pricing/seasons";
pub const PRICING_TIME_BANDS: &str = "pricing/timeBands";
pub const PRICING_RULES: &str = "pricing/rules";
pub const PRICING_OVERRIDES: &str = "pricing/overrides";
pub const PRICING_PROMOTIONS: &str = "pricing/promotions";

/// Collections an admin backup may copy.
pub const BACKUP_ELIGIBLE: &[&str] = &[
    BOOKINGS,
    COURSES,
    TEE_TIMES,
    USERS,
    REVIEWS,
    PAYMENT_METHODS,
    PRICING_SEASONS,
    PRICING_TIME_BANDS,
    PRICING_RULES,
    PRICING_OVERRIDES,
    PRICING_PROMOTIONS,
];
