//! Line cleaning and classification.
//!
//! The meter's CSV output has no framing or message IDs, so a line is
//! identified only by its field count, a few anchor fields and which command
//! is outstanding. Classification is pure; the driver applies the result.

use super::commands::CommandKind;
use super::menu::CONFIG_FIELD_COUNT;
use crate::measurement::{CalibrationRecord, Measurement};
use once_cell::sync::Lazy;
use regex::Regex;

/// Text the meter prints when it powers on.
pub const POWER_ON_BANNER: &str = "Thermo Scientific (c) 2007";

/// Prefix of lines that echo our own commands back.
pub const PROMPT: &str = "> ";

static DEVICE_ERROR: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^E-3\w{3}$").expect("device error pattern is valid")
});

const IDENTITY_FIELD_COUNT: usize = 4;
const ORP_FIELD_COUNT: usize = 9;

/// What a cleaned line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Power-on banner; the meter must be initialized again
    PowerOn,
    /// Device error token such as `E-3ABC`
    DeviceError(String),
    /// Reply to `GetMethod`: the active method name
    Method(String),
    /// `119,<serial>,<firmware>,<method>`
    Identity(Vec<String>),
    /// ORP calibration reply, used as the heartbeat
    OrpCheck(Vec<String>),
    PhCalibration(Vec<String>),
    CondCalibration(Vec<String>),
    Measurement(Vec<String>),
    /// 62-field menu dump
    ConfigDump(Vec<String>),
    Unrecognized(Vec<String>),
}

/// Result of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: LineKind,
    /// Whether the line is the reply the outstanding command was waiting for
    pub satisfies: bool,
}

impl Classification {
    fn new(kind: LineKind, satisfies: bool) -> Self {
        Self { kind, satisfies }
    }
}

/// Normalise a raw line from the transport.
///
/// Echoed commands (prompt-prefixed) and blank lines yield `None`. Control
/// characters are removed and surrounding whitespace trimmed.
pub fn clean_line(raw: &str) -> Option<String> {
    let raw = raw.trim_start_matches(['\n', '\r']);
    if raw.starts_with(PROMPT) {
        return None;
    }
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Classify a cleaned line against the outstanding command. The first
/// matching rule wins.
pub fn classify(line: &str, outstanding: CommandKind) -> Classification {
    if line.contains(POWER_ON_BANNER) {
        return Classification::new(LineKind::PowerOn, false);
    }
    if DEVICE_ERROR.is_match(line) {
        return Classification::new(LineKind::DeviceError(line.to_string()), true);
    }

    let fields: Vec<String> = line.split(',').map(str::to_string).collect();
    let anchor = |i: usize| fields.get(i).map(String::as_str);

    match fields.len() {
        1 if outstanding == CommandKind::GetMethod => {
            Classification::new(LineKind::Method(line.to_string()), true)
        }
        IDENTITY_FIELD_COUNT => Classification::new(LineKind::Identity(fields), false),
        ORP_FIELD_COUNT if outstanding == CommandKind::Poll && anchor(6) == Some("ORP") => {
            Classification::new(LineKind::OrpCheck(fields), true)
        }
        CalibrationRecord::FIELD_COUNT
            if outstanding == CommandKind::GetPHCal && anchor(6) == Some("PH") =>
        {
            Classification::new(LineKind::PhCalibration(fields), true)
        }
        CalibrationRecord::FIELD_COUNT
            if outstanding == CommandKind::GetCondCal && anchor(6) == Some("COND") =>
        {
            Classification::new(LineKind::CondCalibration(fields), true)
        }
        Measurement::FIELD_COUNT
            if anchor(6) == Some("pH") && anchor(10) == Some("C") && anchor(15) == Some("uS/cm") =>
        {
            let satisfies = outstanding == CommandKind::GetData;
            Classification::new(LineKind::Measurement(fields), satisfies)
        }
        CONFIG_FIELD_COUNT if outstanding == CommandKind::GetConfig => {
            Classification::new(LineKind::ConfigDump(fields), true)
        }
        _ => Classification::new(LineKind::Unrecognized(fields), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::fixtures::{COND_CAL, MEASUREMENT, ORP, PH_CAL};

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("> GETMEAS"), None);
        assert_eq!(clean_line("\n> GETMEAS"), None);
        assert_eq!(clean_line("   \x1b "), None);
        assert_eq!(clean_line("\x1b E-3AB1 \n"), Some("E-3AB1".to_string()));
    }

    #[test]
    fn test_banner_and_device_error() {
        let banner = classify("Thermo Scientific (c) 2007 Orion Star", CommandKind::Poll);
        assert_eq!(banner.kind, LineKind::PowerOn);
        assert!(!banner.satisfies);

        let err = classify("E-3XY9", CommandKind::GetData);
        assert_eq!(err.kind, LineKind::DeviceError("E-3XY9".into()));
        assert!(err.satisfies);

        assert!(matches!(
            classify("E-3XY90", CommandKind::GetData).kind,
            LineKind::Unrecognized(_)
        ));
    }

    #[test]
    fn test_method_needs_get_method() {
        let method = classify("pHMethod", CommandKind::GetMethod);
        assert_eq!(method.kind, LineKind::Method("pHMethod".into()));
        assert!(method.satisfies);

        let stray = classify("pHMethod", CommandKind::GetData);
        assert!(matches!(stray.kind, LineKind::Unrecognized(_)));
        assert!(!stray.satisfies);
    }

    #[test]
    fn test_identity_never_satisfies() {
        let id = classify("119,B15164,2.39,8", CommandKind::Poll);
        assert!(matches!(id.kind, LineKind::Identity(ref f) if f[1] == "B15164"));
        assert!(!id.satisfies);
    }

    #[test]
    fn test_replies_keyed_on_outstanding_command() {
        assert!(classify(ORP, CommandKind::Poll).satisfies);
        assert!(!classify(ORP, CommandKind::GetData).satisfies);

        assert!(matches!(
            classify(PH_CAL, CommandKind::GetPHCal).kind,
            LineKind::PhCalibration(_)
        ));
        assert!(matches!(
            classify(PH_CAL, CommandKind::GetCondCal).kind,
            LineKind::Unrecognized(_)
        ));
        assert!(matches!(
            classify(COND_CAL, CommandKind::GetCondCal).kind,
            LineKind::CondCalibration(_)
        ));
    }

    #[test]
    fn test_measurement_recognised_regardless_of_outstanding() {
        for kind in CommandKind::ALL {
            let c = classify(MEASUREMENT, kind);
            assert!(matches!(c.kind, LineKind::Measurement(_)), "{kind}");
            assert_eq!(c.satisfies, kind == CommandKind::GetData);
        }
    }

    #[test]
    fn test_config_dump_needs_get_config() {
        let dump = vec!["0"; CONFIG_FIELD_COUNT].join(",");
        let c = classify(&dump, CommandKind::GetConfig);
        assert!(matches!(c.kind, LineKind::ConfigDump(ref f) if f.len() == 62));
        assert!(c.satisfies);
        assert!(!classify(&dump, CommandKind::Pause).satisfies);
    }
}
