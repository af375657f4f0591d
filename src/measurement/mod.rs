//! Records parsed from meter output.
//!
//! Each record is built wholesale from a shape-matched CSV line. Numeric
//! fields are parsed strictly: a bad field fails the whole record with
//! [`MeterError::Parse`] so the caller can keep the previous good value.

use crate::error::{AppResult, MeterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Leading field of identity-bearing lines on the 5-Star Plus.
pub const DEVICE_TYPE_CODE: &str = "119";

/// Sample identifier for routine polled measurements.
pub const POLLED_SAMPLE: &str = "Polled";
/// Sample identifier for measurements the meter sent on its own (front-panel button).
pub const MANUAL_SAMPLE: &str = "Manual";

const UNINITIATED: &str = "Uninitiated";

/// A physical value with its engineering unit.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub unit: String,
}

impl Reading {
    fn from_fields(fields: &[String], value: usize, unit: usize) -> AppResult<Self> {
        Ok(Self {
            value: parse_f64(fields, value)?,
            unit: field(fields, unit)?.to_string(),
        })
    }

    fn unknown() -> Self {
        Self {
            value: f64::NAN,
            unit: String::new(),
        }
    }
}

/// Whether the measurement record holds a real sample yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementStatus {
    /// Nothing received since the driver started
    Offline,
    /// Parsed from a measurement line
    Good,
}

/// Values carried by a pH + conductivity measurement line.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValues {
    pub temperature: Reading,
    pub ph: Reading,
    pub mv: Reading,
    pub slope: Reading,
    pub ph_calibration_index: i64,
    pub conductivity: Reading,
    pub conductance: Reading,
    /// Kept as printed; the meter reports it without a unit
    pub temp_coefficient: String,
    pub temp_reference: Reading,
    pub cell_constant: Reading,
    pub cond_calibration_index: i64,
}

/// The most recent measurement.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub status: MeasurementStatus,
    /// When the driver parsed the line
    pub timestamp: Option<DateTime<Utc>>,
    /// Correlation tag: a caller identifier, [`MANUAL_SAMPLE`] or [`POLLED_SAMPLE`]
    pub sample_id: String,
    /// Timestamp printed by the meter
    pub meter_timestamp: String,
    pub values: MeasurementValues,
}

impl Default for Measurement {
    fn default() -> Self {
        Self {
            status: MeasurementStatus::Offline,
            timestamp: None,
            sample_id: UNINITIATED.to_string(),
            meter_timestamp: UNINITIATED.to_string(),
            values: MeasurementValues {
                temperature: Reading::unknown(),
                ph: Reading::unknown(),
                mv: Reading::unknown(),
                slope: Reading::unknown(),
                ph_calibration_index: -1,
                conductivity: Reading::unknown(),
                conductance: Reading::unknown(),
                temp_coefficient: String::new(),
                temp_reference: Reading::unknown(),
                cell_constant: Reading::unknown(),
                cond_calibration_index: -1,
            },
        }
    }
}

impl Measurement {
    /// Number of fields in a measurement line.
    pub const FIELD_COUNT: usize = 26;

    /// Parse a 26-field measurement line.
    ///
    /// ```text
    /// 119,B15164,2.39,8,10/19/26 14:02:11,7.01,pH,-2.3,mV,24.8,C,98.6,%,5,1413,uS/cm,1.41,mS,...
    /// ```
    pub fn from_fields(
        fields: &[String],
        sample_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> AppResult<Self> {
        expect_fields(fields, Self::FIELD_COUNT)?;
        Ok(Self {
            status: MeasurementStatus::Good,
            timestamp: Some(timestamp),
            sample_id: sample_id.into(),
            meter_timestamp: fields[4].clone(),
            values: MeasurementValues {
                temperature: Reading::from_fields(fields, 9, 10)?,
                ph: Reading::from_fields(fields, 5, 6)?,
                mv: Reading::from_fields(fields, 7, 8)?,
                slope: Reading::from_fields(fields, 11, 12)?,
                ph_calibration_index: parse_i64(fields, 13)?,
                conductivity: Reading::from_fields(fields, 14, 15)?,
                conductance: Reading::from_fields(fields, 16, 17)?,
                temp_coefficient: fields[20].clone(),
                temp_reference: Reading::from_fields(fields, 21, 22)?,
                cell_constant: Reading::from_fields(fields, 23, 24)?,
                cond_calibration_index: parse_i64(fields, 25)?,
            },
        })
    }
}

/// First calibration point of a stored calibration.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub reading: Reading,
    /// mV for pH calibrations, conductance for conductivity calibrations
    pub secondary: Reading,
    pub temperature: Reading,
    pub cal_type: String,
}

/// A one-point calibration as reported by `GETCAL PH` / `GETCAL COND`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub calibration_index: i64,
    pub meter_timestamp: String,
    pub point1: CalibrationPoint,
    /// Slope for pH, cell constant K1 for conductivity
    pub slope: Reading,
    /// E0 for pH, offset for conductivity
    pub offset: Reading,
}

impl CalibrationRecord {
    /// Number of fields in a calibration line.
    pub const FIELD_COUNT: usize = 19;

    /// Parse a 19-field `GETCAL PH` line. The mV reading in field 10 carries
    /// no unit on the wire.
    pub fn ph_from_fields(fields: &[String]) -> AppResult<Self> {
        expect_fields(fields, Self::FIELD_COUNT)?;
        let secondary = Reading {
            value: parse_f64(fields, 10)?,
            unit: "mV".to_string(),
        };
        Self::from_fields(fields, secondary)
    }

    /// Parse a 19-field `GETCAL COND` line.
    pub fn conductivity_from_fields(fields: &[String]) -> AppResult<Self> {
        expect_fields(fields, Self::FIELD_COUNT)?;
        let secondary = Reading::from_fields(fields, 10, 11)?;
        Self::from_fields(fields, secondary)
    }

    fn from_fields(fields: &[String], secondary: Reading) -> AppResult<Self> {
        Ok(Self {
            calibration_index: parse_i64(fields, 5)?,
            meter_timestamp: fields[4].clone(),
            point1: CalibrationPoint {
                reading: Reading::from_fields(fields, 8, 9)?,
                secondary,
                temperature: Reading::from_fields(fields, 12, 13)?,
                cal_type: fields[14].clone(),
            },
            slope: Reading::from_fields(fields, 15, 16)?,
            offset: Reading::from_fields(fields, 17, 18)?,
        })
    }
}

/// Calibration change, tagged with the probe it belongs to.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Calibration {
    #[serde(rename = "pH")]
    Ph(CalibrationRecord),
    Conductivity(CalibrationRecord),
}

/// Identity and decoded configuration of the connected meter.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterIdentity {
    pub make: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_rev: String,
    /// Setting name → decoded value, including the active `Method`
    pub configuration: BTreeMap<String, String>,
}

impl Default for MeterIdentity {
    fn default() -> Self {
        Self {
            make: "Thermo Scientific".to_string(),
            model: "5-Star Plus BENCHTOP MULTI with ISE".to_string(),
            serial_number: UNINITIATED.to_string(),
            firmware_rev: UNINITIATED.to_string(),
            configuration: BTreeMap::from([("Method".to_string(), UNINITIATED.to_string())]),
        }
    }
}

impl MeterIdentity {
    /// Take serial number and firmware revision from an identity-bearing line
    /// such as `119,B15164,2.39,8`. Lines with another leading field are
    /// ignored. Returns whether anything changed.
    pub fn apply_device_id<S: AsRef<str>>(&mut self, fields: &[S]) -> bool {
        let (Some(kind), Some(serial), Some(firmware)) =
            (fields.first(), fields.get(1), fields.get(2))
        else {
            return false;
        };
        if kind.as_ref() != DEVICE_TYPE_CODE {
            return false;
        }
        let changed =
            self.serial_number != serial.as_ref() || self.firmware_rev != firmware.as_ref();
        self.serial_number = serial.as_ref().to_string();
        self.firmware_rev = firmware.as_ref().to_string();
        changed
    }

    /// Record the active method. Returns whether it changed.
    pub fn set_method(&mut self, method: &str) -> bool {
        self.configuration
            .insert("Method".to_string(), method.to_string())
            .as_deref()
            != Some(method)
    }

    /// Merge decoded settings. Returns whether any value changed.
    pub fn apply_configuration(&mut self, settings: BTreeMap<String, String>) -> bool {
        let mut changed = false;
        for (name, value) in settings {
            if self.configuration.get(&name) != Some(&value) {
                self.configuration.insert(name, value);
                changed = true;
            }
        }
        changed
    }
}

fn expect_fields(fields: &[String], expected: usize) -> AppResult<()> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(MeterError::FieldCount {
            expected,
            actual: fields.len(),
        })
    }
}

fn field(fields: &[String], index: usize) -> AppResult<&str> {
    fields
        .get(index)
        .map(String::as_str)
        .ok_or(MeterError::FieldCount {
            expected: index + 1,
            actual: fields.len(),
        })
}

fn parse_f64(fields: &[String], index: usize) -> AppResult<f64> {
    let raw = field(fields, index)?;
    raw.trim().parse::<f64>().map_err(|e| MeterError::Parse {
        index,
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_i64(fields: &[String], index: usize) -> AppResult<i64> {
    let raw = field(fields, index)?;
    raw.trim().parse::<i64>().map_err(|e| MeterError::Parse {
        index,
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Literal meter lines shared by unit tests.

    pub const MEASUREMENT: &str = "119,B15164,2.39,8,10/19/26 14:02:11,7.01,pH,-2.3,mV,24.8,C,98.6,%,5,1413,uS/cm,1.41,mS,0,0,2.1,25.0,C,0.475,/cm,3";
    pub const PH_CAL: &str =
        "119,B15164,2.39,8,10/18/26 09:15:40,5,PH,1,7.00,pH,-3.1,mV,25.1,C,AUTO,98.7,%,-3.1,mV";
    pub const COND_CAL: &str =
        "119,B15164,2.39,8,10/18/26 09:30:02,3,COND,1,1413,uS/cm,2.98,mS,25.0,C,AUTO,0.475,/cm,0.0,uS";
    pub const ORP: &str = "119,B15164,2.39,8,10/18/26 09:40:00,2,ORP,1,220.0";

    pub fn split(line: &str) -> Vec<String> {
        line.split(',').map(str::to_string).collect()
    }
}
