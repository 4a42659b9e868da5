//! Coordination constants and tuning parameters.

/// Default simulated seconds per tick.
pub const DEFAULT_TICK_SECS: u32 = 1;

// --- Flight-plan coordination ---

/// Plans are pushed to the receiving facility this many minutes before the coordination time.
pub const PLAN_PUSH_LEAD_MINS: i64 = 30;

// --- Beacon codes ---

/// First code of the NAS-wide enroute pool.
pub const NAS_BEACON_FIRST: u16 = 0o1001;

/// Last code of the NAS-wide enroute pool.
pub const NAS_BEACON_LAST: u16 = 0o7777;

/// Highest representable beacon code.
pub const BEACON_MAX: u16 = 0o7777;

/// VFR code.
pub const VFR_BEACON: u16 = 0o1200;

/// Codes never handed out: VFR, hijack, radio failure, emergency and military intercept.
pub const FORBIDDEN_BEACONS: [u16; 5] = [0o1200, 0o7500, 0o7600, 0o7700, 0o7777];

/// Codes per terminal bank (X01-X77).
pub const BEACON_BANK_SIZE: u16 = 0o100;

/// Random draws before an allocator falls back to a linear probe.
pub const BEACON_RANDOM_DRAWS: usize = 32;

// --- Computer IDs ---

/// Number of three-digit CIDs.
pub const CID_SLOTS: u16 = 1000;

// --- Identifiers ---

/// Maximum ACID length.
pub const ACID_MAX_LEN: usize = 7;

/// Facility identifiers are exactly this long (ZNY, N90, PHL).
pub const FACILITY_ID_LEN: usize = 3;

// --- Radar tracks ---

/// Previous positions kept per track.
pub const TRACK_HISTORY_LEN: usize = 6;

/// Minimum spacing between stored history samples (seconds).
pub const TRACK_HISTORY_INTERVAL_SECS: i64 = 12;

/// Datablock alternation period (seconds).
pub const DISPLAY_ALTERNATION_SECS: i64 = 6;

// --- Display constraints ---

/// The reduced J-ring is only available at or below this transponder altitude (feet).
pub const REDUCED_JRING_CEILING_FT: u32 = 23_000;

/// Acknowledged point-outs kept per flight plan.
pub const POINT_OUT_HISTORY_LEN: usize = 20;

// --- Scratchpads ---

/// Scratchpad contents reserved by the system.
pub const RESERVED_SCRATCHPADS: [&str; 6] = ["NAT", "CST", "AMB", "RDR", "ADB", "XXX"];

/// Longest primary scratchpad.
pub const SCRATCHPAD_MAX_LEN: usize = 3;

/// Longest secondary scratchpad (without the leading `+`).
pub const SECONDARY_SCRATCHPAD_MAX_LEN: usize = 3;

// --- Geodesy ---

/// Mean earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;
