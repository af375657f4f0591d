//! Menu decode table for the 5-Star Plus settings dump.
//!
//! `GETMENU 0000,6,62` returns 62 comma-separated raw codes covering menu
//! indices 6 through 67. Each entry below names the setting, says whether it
//! belongs in the published configuration, and for categorical settings maps
//! raw codes to their front-panel labels.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

/// Menu index of the first field in a configuration dump.
pub const FIRST_MENU_INDEX: u8 = 6;

/// Number of fields in a configuration dump.
pub const CONFIG_FIELD_COUNT: usize = 62;

/// How the raw code of a menu entry is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuValues {
    /// Categorical setting: raw code → label
    Lookup(&'static [(&'static str, &'static str)]),
    /// Numeric setting bounded by the meter; the raw text is the value
    Range {
        /// Lower bound as printed by the meter
        min: &'static str,
        /// Upper bound as printed by the meter
        max: &'static str,
    },
    /// Reported by the meter but not settable
    ReadOnly,
}

/// One row of the decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuEntry {
    /// Menu index on the meter
    pub index: u8,
    /// Human-readable setting name, used as the configuration key
    pub name: &'static str,
    /// Whether the setting is stored in the meter configuration.
    /// Transient and write-only settings (clock, passwords, alarms) are not.
    pub persist: bool,
    /// Interpretation of the raw code
    pub values: MenuValues,
}

impl MenuEntry {
    /// Decode a raw code. Unmapped lookup codes are returned unchanged.
    pub fn decode(&self, raw: &str) -> String {
        match self.values {
            MenuValues::Lookup(table) => table
                .iter()
                .find(|(code, _)| *code == raw)
                .map(|(_, label)| (*label).to_string())
                .unwrap_or_else(|| raw.to_string()),
            MenuValues::Range { .. } | MenuValues::ReadOnly => raw.to_string(),
        }
    }
}

const fn lookup(
    index: u8,
    name: &'static str,
    persist: bool,
    table: &'static [(&'static str, &'static str)],
) -> MenuEntry {
    MenuEntry {
        index,
        name,
        persist,
        values: MenuValues::Lookup(table),
    }
}

const fn range(
    index: u8,
    name: &'static str,
    persist: bool,
    min: &'static str,
    max: &'static str,
) -> MenuEntry {
    MenuEntry {
        index,
        name,
        persist,
        values: MenuValues::Range { min, max },
    }
}

const fn read_only(index: u8, name: &'static str) -> MenuEntry {
    MenuEntry {
        index,
        name,
        persist: false,
        values: MenuValues::ReadOnly,
    }
}

const USA_EURO: &[(&str, &str)] = &[("0", "USA"), ("1", "Euro")];
const OFF_ON: &[(&str, &str)] = &[("0", "Off"), ("1", "On")];
const OFF_ON_UPPER: &[(&str, &str)] = &[("0", "OFF"), ("1", "ON")];
const AUTO_MANUAL: &[(&str, &str)] = &[("0", "Auto"), ("1", "Manual")];
const NO_YES: &[(&str, &str)] = &[("0", "No"), ("1", "Yes")];
const AUTO_CAL_POINTS: &[(&str, &str)] =
    &[("0", "0 (no CAL)"), ("1", "1"), ("2", "2"), ("3", "3")];
const CELL_RANGES_VWR: &[(&str, &str)] = &[
    ("0", "Planar"),
    ("1", "Standard"),
    ("2", "Range 1"),
    ("3", "Range 2"),
    ("4", "Range 3"),
    ("5", "Range 4"),
    ("6", "Range 5"),
    ("7", "Range 6"),
    ("8", "Range 7"),
];
const CELL_RANGES: &[(&str, &str)] = &[
    ("0", "USP"),
    ("1", "Standard"),
    ("2", "Range 1"),
    ("3", "Range 2"),
    ("4", "Range 3"),
    ("5", "Range 4"),
    ("6", "Range 5"),
    ("7", "Range 6"),
    ("8", "Range 7"),
];

const ENTRIES: [MenuEntry; CONFIG_FIELD_COUNT] = [
    lookup(6, "Displayed pH Resolution", true, &[("0", "0.1"), ("1", "0.01"), ("2", "0.001")]),
    lookup(7, "pH Buffer Set Queenston", false, USA_EURO),
    lookup(8, "pH Buffer Set", true, USA_EURO),
    read_only(9, "pH Smart Probe"),
    lookup(10, "ISE Resolution", true, &[("0", "1"), ("1", "2"), ("2", "3")]),
    lookup(
        11,
        "ISE Units",
        true,
        &[("0", "M"), ("1", "mg/L"), ("2", "%"), ("3", "ppb"), ("4", "None")],
    ),
    lookup(12, "ISE Calibration Standard Concentration Range", true, &[("0", "Low"), ("1", "High")]),
    lookup(13, "ISE Auto-Blank Correction", true, &[("0", "Auto"), ("1", "Off")]),
    read_only(14, "ISE Smart Probe"),
    lookup(
        15,
        "Conductivity Temperature Compensation Selection",
        true,
        &[("0", "Off"), ("1", "Linear"), ("2", "unLf")],
    ),
    range(16, "Conductivity Linear Temp Comp Coefficient Setting VWR", false, "0.0", "10.0"),
    range(17, "Conductivity Linear Temp Comp Coefficient Setting", true, "0.0", "10.0"),
    range(18, "Conductivity TDS Factor Setting", true, "0.00", "10.00"),
    range(19, "Conductivity Auto-Cal Default Cell Constant", true, "0.001", "199.9"),
    lookup(
        20,
        "Conductivity Temperature Reference Selection VWR",
        false,
        &[("0", "15"), ("1", "20"), ("2", "25")],
    ),
    lookup(21, "Conductivity Cell Type & Manual Ranging Selection VWR", false, CELL_RANGES_VWR),
    lookup(
        22,
        "Conductivity Temperature Reference Selection",
        true,
        &[("0", "15"), ("1", "20"), ("2", "25"), ("3", "5"), ("4", "10")],
    ),
    lookup(23, "Conductivity Cell Type & Manual Ranging Selection", true, CELL_RANGES),
    read_only(24, "Conductivity Smart Probe"),
    lookup(25, "Dissolved Oxygen %Saturation Resolution", true, &[("0", "1"), ("1", "0.1")]),
    lookup(26, "Dissolved Oxygen Concentration Resolution", true, &[("0", "0.1"), ("1", "0.01")]),
    lookup(27, "Dissolved Oxygen Barometric Press. Comp.", true, AUTO_MANUAL),
    range(28, "Dissolved Oxygen Manual Barometric Pressure", true, "450.0", "850.0"),
    lookup(29, "Dissolved Oxygen Salinity Correction Selection", true, AUTO_MANUAL),
    range(30, "Dissolved Oxygen Manual Salinity Correction Factor", true, "0", "45"),
    lookup(
        31,
        "Dissolved Oxygen Calibration Type Selection",
        true,
        &[("0", "Air"), ("1", "Water"), ("2", "Manual"), ("3", "Zero")],
    ),
    read_only(32, "DO Smart Probe"),
    range(33, "pH Calibration Alarm Setting", false, "0000", "9999"),
    range(34, "ORP Calibration Alarm Setting", false, "0000", "9999"),
    range(35, "ISE Calibration Alarm Setting", false, "0000", "9999"),
    range(36, "Conductivity Calibration Alarm Setting", false, "0000", "9999"),
    range(37, "Dissolved Oxygen Calibration Alarm Setting", false, "0000", "9999"),
    lookup(
        38,
        "Continuous, Timed, or Auto-Read Measurement Selection",
        true,
        &[("0", "Continuous"), ("1", "AutoRead"), ("2", "Timed Readings")],
    ),
    range(39, "Timed Reading Setting", true, "00.30", "99.59"),
    lookup(40, "Data Log Roll Over or Delete on Download Option Selection", false, NO_YES),
    lookup(41, "Auto Log Feature", false, OFF_ON_UPPER),
    range(42, "Manual Temperature Compensation Setting", true, "0.0", "105.0"),
    lookup(
        43,
        "Stirrer Speed Setting",
        false,
        &[
            ("0", "Off"),
            ("1", "Speed 1"),
            ("2", "Speed 2"),
            ("3", "Speed 3"),
            ("4", "Speed 4"),
            ("5", "Speed 5"),
            ("6", "Speed 6"),
            ("7", "Speed 7"),
        ],
    ),
    range(44, "Instrument Password", false, "0000", "9999"),
    lookup(45, "Auto-Shut Off Selection", false, OFF_ON),
    lookup(46, "Methods Setting", false, OFF_ON),
    range(47, "Instrument Password VWR", false, "0000", "9999"),
    range(48, "Time: Hour Setting", false, "0", "23"),
    range(49, "Time: Minute Setting", false, "0", "59"),
    lookup(50, "Date Format", false, &[("0", "MDY"), ("1", "DMY")]),
    range(51, "Date: Year Setting", false, "00", "99"),
    range(52, "Date: Month Setting", false, "1", "12"),
    range(53, "Date: Day of the Month Setting", false, "1", "31"),
    lookup(
        54,
        "RS-232 Baud Rate Selection",
        false,
        &[("0", "1200"), ("1", "2400"), ("2", "4800"), ("3", "9600")],
    ),
    lookup(55, "Printout Format", false, &[("0", "Printer"), ("1", "Computer")]),
    lookup(56, "Autosampler Operation", false, OFF_ON_UPPER),
    lookup(57, "Tray type", false, &[("0", "28"), ("1", "48")]),
    lookup(
        58,
        "Number rinse beakers to use",
        false,
        &[("0", "1"), ("1", "2"), ("2", "3"), ("3", "4"), ("4", "5")],
    ),
    range(59, "Beaker rinse time.", false, "5", "60"),
    lookup(60, "Auto CAL pH", true, AUTO_CAL_POINTS),
    lookup(61, "Auto CAL ORP", true, NO_YES),
    lookup(62, "Auto CAL ISE", true, &[("0", "0 (no CAL)"), ("1", "2"), ("2", "3")]),
    range(63, "ISE CAL point # 1", true, "0.0001", "19999"),
    range(64, "ISE CAL point # 2", true, "0.0001", "19999"),
    range(65, "ISE CAL point # 3", true, "0.0001", "19999"),
    lookup(66, "Auto CAL Conductivity", true, AUTO_CAL_POINTS),
    range(67, "Number of samples to test", false, "1", "47"),
];

/// Process-wide decode table keyed by menu index, built once on first use.
pub static MENU_TABLE: Lazy<HashMap<u8, MenuEntry>> =
    Lazy::new(|| ENTRIES.iter().map(|entry| (entry.index, *entry)).collect());

/// Look up a menu entry by index.
pub fn entry(index: u8) -> Option<&'static MenuEntry> {
    MENU_TABLE.get(&index)
}

/// Decode a full configuration dump into the persisted, named settings.
///
/// Field `i` of the dump corresponds to menu index `FIRST_MENU_INDEX + i`.
pub fn decode_config_dump<S: AsRef<str>>(fields: &[S]) -> BTreeMap<String, String> {
    fields
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let index = u8::try_from(i).ok()?.checked_add(FIRST_MENU_INDEX)?;
            let entry = entry(index)?;
            entry
                .persist
                .then(|| (entry.name.to_string(), entry.decode(raw.as_ref())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_dump_field() {
        assert_eq!(MENU_TABLE.len(), CONFIG_FIELD_COUNT);
        for i in 0..CONFIG_FIELD_COUNT as u8 {
            assert!(entry(FIRST_MENU_INDEX + i).is_some(), "missing menu {}", i + 6);
        }
        assert!(entry(5).is_none());
        assert!(entry(68).is_none());
    }

    #[test]
    fn test_lookup_decoding() {
        let resolution = entry(6).unwrap();
        assert_eq!(resolution.decode("1"), "0.01");
        // unknown codes pass through
        assert_eq!(resolution.decode("9"), "9");

        let cell_constant = entry(19).unwrap();
        assert_eq!(cell_constant.decode("0.475"), "0.475");
    }

    #[test]
    fn test_decode_dump_keeps_only_persisted_settings() {
        let mut fields = vec!["0"; CONFIG_FIELD_COUNT];
        fields[0] = "2"; // menu 6
        fields[45 - 6] = "1"; // auto shutoff, not persisted
        fields[17 - 6] = "2.1";

        let config = decode_config_dump(&fields);
        assert_eq!(config["Displayed pH Resolution"], "0.001");
        assert_eq!(config["Conductivity Linear Temp Comp Coefficient Setting"], "2.1");
        assert_eq!(config["pH Buffer Set"], "USA");
        assert!(!config.contains_key("Auto-Shut Off Selection"));
        assert!(!config.contains_key("pH Smart Probe"));

        let persisted = ENTRIES.iter().filter(|e| e.persist).count();
        assert_eq!(config.len(), persisted);
    }
}
