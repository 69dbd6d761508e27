//! Application constants for the session processor
//!
//! Reserved parameter keys, column names, technique identifiers and the
//! supported instrument software version.

// =============================================================================
// Session File Format
// =============================================================================

/// Newest `CoreVersion` (major, minor, build) known to parse correctly
pub const SUPPORTED_CORE_VERSION: (u32, u32, u32) = (5, 11, 1006);

/// Suffix appended to a session file name for its parsed JSON cache
pub const JSON_CACHE_SUFFIX: &str = ".json";

/// Environment variable carrying comma-separated pre-sort keys
pub const PRESORT_ENV_VAR: &str = "PSESS_PRESORT";

/// Ticks per microsecond in `TimeStamp` values (100 ns ticks)
pub const TICKS_PER_MICROSECOND: i64 = 10;

// =============================================================================
// Parameter Block
// =============================================================================

/// Lines starting with this marker are comments
pub const COMMENT_MARKER: char = '#';

/// Reserved key that identifies the technique of a record
pub const METHOD_ID_KEY: &str = "method_id";

/// Required scan rate for cyclic and linear sweep voltammetry
pub const SCAN_RATE_KEY: &str = "scan_rate";

// =============================================================================
// Technique Identifiers
// =============================================================================

pub mod method_ids {
    pub const EIS: &str = "eis";
    pub const CV: &str = "cv";
    pub const LSV: &str = "lsv";
}

// =============================================================================
// Column Names
// =============================================================================

pub mod columns {
    // Common metadata
    pub const TITLE: &str = "title";
    pub const DATE: &str = "date";
    pub const MEASUREMENT_ID: &str = "measurement_id";
    pub const SWEEP_ID: &str = "sweep_id";

    // Channel discriminators
    pub const CHANNEL: &str = "channel";
    pub const CYCLE: &str = "cycle";

    // Enrichment output
    pub const DEVICE: &str = "device";
    pub const BLOCK: &str = "block";

    // Voltammetry channels
    pub const VOLTAGE: &str = "voltage";
    pub const CURRENT: &str = "current";

    // Derived voltammetry features
    pub const SWEEP_DIR: &str = "sweep_dir";
    pub const CHARGE: &str = "charge";
    pub const SEGMENT_CHARGE: &str = "segment_charge";
    pub const Q_NORM: &str = "q_norm";

    /// Columns that hold text even when every value looks numeric
    pub const TEXT: &[&str] = &[
        TITLE,
        DATE,
        MEASUREMENT_ID,
        SWEEP_ID,
        super::METHOD_ID_KEY,
        DEVICE,
        BLOCK,
    ];
}

/// Impedance quantities kept from a channel's data set, after label mapping
pub const EIS_QUANTITIES: &[&str] = &[
    "frequency",
    "z",
    "phase",
    "zre",
    "zim",
    "c",
    "cre",
    "cim",
    "idc",
];

/// Map a lower-cased raw data-set description to its canonical column name
pub fn canonical_quantity(label: &str) -> &str {
    match label {
        "capacitance" => "c",
        "capacitance'" => "cre",
        "capacitance''" => "cim",
        other => other,
    }
}
