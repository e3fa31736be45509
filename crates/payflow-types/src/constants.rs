//! System-wide constants for the Payflow settlement engine.

/// Currency precision (two decimal places).
pub const MONEY_SCALE: u32 = 2;

/// Maximum decimal places for fee and score rates.
pub const RATE_SCALE: u32 = 2;

/// Maximum order display name length, in characters.
pub const MAX_ORDER_NAME_CHARS: usize = 64;

/// Maximum caller-supplied remark length, in characters.
pub const MAX_REMARK_CHARS: usize = 200;

/// Maximum merchant-side order reference length, in characters.
pub const MAX_MERCHANT_ORDER_NO_CHARS: usize = 64;

/// Default merchant order validity in minutes.
pub const DEFAULT_MERCHANT_ORDER_TTL_MINUTES: i64 = 10;

/// Default online (website) order validity in minutes.
pub const DEFAULT_ONLINE_ORDER_TTL_MINUTES: i64 = 10;

/// How long a token's reverse index entry outlives its order's expiry, so a
/// late payer sees "expired" rather than "not found".
pub const TOKEN_INDEX_GRACE_MINUTES: i64 = 60;

/// Default wait for blocking row and advisory locks, in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default payer-facing pay page.
pub const DEFAULT_PAY_URL: &str = "https://pay.example.invalid/paying";

/// Query parameter carrying the order token in a pay link.
pub const PAY_URL_TOKEN_PARAM: &str = "order_no";

/// System config key: merchant order validity in minutes.
pub const CONFIG_KEY_MERCHANT_ORDER_EXPIRE_MINUTES: &str = "merchant_order_expire_minutes";

/// System config key: online order validity in minutes.
pub const CONFIG_KEY_WEBSITE_ORDER_EXPIRE_MINUTES: &str = "website_order_expire_minutes";

/// Prefix of the system remark appended to settled orders.
pub const SYSTEM_REMARK_PREFIX: &str = "[system]";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Payflow";
