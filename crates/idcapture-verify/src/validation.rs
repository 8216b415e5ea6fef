use chrono::NaiveDate;
use idcapture_core::Side;
use serde::{Deserialize, Serialize};

use crate::fields::{is_valid_id_number, IdFields};

/// Accepted printed date formats, tried in order.
pub const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%Y-%m-%d", "%d.%m.%Y"];

const FRONT_MIN_CONFIDENCE: f32 = 0.5;
const BACK_MIN_CONFIDENCE: f32 = 0.3;

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Result of checking extracted fields against one card side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub is_target_type: bool,
    pub confidence: f32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Scores extracted fields. `today` is the reference date for birth and
/// expiry checks.
#[derive(Clone, Copy, Debug)]
pub struct IdValidator {
    today: NaiveDate,
}

impl Default for IdValidator {
    fn default() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

impl IdValidator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn validate(&self, fields: &IdFields, side: Side) -> ValidationReport {
        let mut report = ValidationReport::default();
        match side {
            Side::Front => self.validate_front(fields, &mut report),
            Side::Back => self.validate_back(fields, &mut report),
        }
        report.confidence = report.confidence.min(1.0);
        report.is_valid = report.is_target_type && report.errors.is_empty();
        log::debug!(
            "{side} validation: valid={} confidence={:.2} errors={:?}",
            report.is_valid,
            report.confidence,
            report.errors
        );
        report
    }

    fn validate_front(&self, fields: &IdFields, r: &mut ValidationReport) {
        match fields.id_number.as_deref() {
            Some(id) if is_valid_id_number(id) => {
                r.confidence += 0.4;
                r.is_target_type = true;
            }
            Some(id) => r.errors.push(format!("Invalid ID number format: {id}")),
            None => r
                .warnings
                .push("ID number not found in extracted text".to_string()),
        }

        if fields.name.is_some() {
            r.confidence += 0.2;
        } else {
            r.warnings.push("Name not found".to_string());
        }

        if let Some(dob) = fields.date_of_birth.as_deref() {
            match parse_date(dob) {
                Some(d) if self.is_plausible_birth(d) => r.confidence += 0.1,
                Some(_) => r
                    .warnings
                    .push(format!("Date of birth seems invalid: {dob}")),
                None => r
                    .warnings
                    .push(format!("Date of birth format unclear: {dob}")),
            }
        }

        match fields.expiry_date.as_deref() {
            Some(expiry) => match parse_date(expiry) {
                Some(d) if d > self.today => r.confidence += 0.2,
                Some(_) => r.errors.push(format!("Emirates ID has expired: {expiry}")),
                None => r
                    .warnings
                    .push(format!("Expiry date format unclear: {expiry}")),
            },
            None => r.warnings.push("Expiry date not found".to_string()),
        }

        if fields.nationality.is_some() {
            r.confidence += 0.05;
        }
        if fields.gender.is_some() {
            r.confidence += 0.05;
        }

        if r.confidence < FRONT_MIN_CONFIDENCE {
            r.warnings
                .push(format!("Low confidence score: {:.2}", r.confidence));
        }
    }

    fn validate_back(&self, fields: &IdFields, r: &mut ValidationReport) {
        if fields.card_number.is_some() || fields.id_number.is_some() {
            r.confidence += 0.3;
            r.is_target_type = true;
        }
        if let Some(id) = fields.id_number.as_deref() {
            if is_valid_id_number(id) {
                r.confidence += 0.4;
            } else {
                r.warnings.push(format!("ID number format unclear: {id}"));
            }
        }
        if r.confidence < BACK_MIN_CONFIDENCE {
            r.warnings
                .push(format!("Low confidence score: {:.2}", r.confidence));
        }
        r.is_target_type |= r.confidence >= BACK_MIN_CONFIDENCE;
    }

    fn is_plausible_birth(&self, d: NaiveDate) -> bool {
        let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
        d >= earliest && d <= self.today
    }
}
