//! Form validation for configuration screens, patient intake and sign-up.
//!
//! Each validator returns every problem at once as a field → message map,
//! so a form can highlight all invalid inputs together. A form that fails
//! validation is never written.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::models::*;
use crate::sync::PatientDraft;

pub const REQUIRED: &str = "required";
pub const MIN_PASSWORD_LEN: usize = 8;

/// Field name → message. Ordered so responses are stable.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        f.write_str(&parts.join(", "))
    }
}

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value.trim())
}

/// Digits only, between 10 and 13 of them (local number up to full E.164 for Brazil).
pub fn is_valid_phone(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    (10..=13).contains(&digits)
}

pub fn validate_hospital(hospital: &Hospital) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &hospital.name);
    if let Some(phone) = hospital.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        if !is_valid_phone(phone) {
            errors.add("phone", "invalid phone number");
        }
    }
    errors.into_result()
}

/// A doctor only exists in the context of a hospital: the hospital must be
/// chosen (and exist) before the doctor can be saved.
pub fn validate_doctor(doctor: &Doctor, hospital_exists: bool) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &doctor.name);
    if doctor.hospital_id.is_nil() || !hospital_exists {
        errors.add("hospital_id", "select a hospital first");
    }
    errors.into_result()
}

pub fn validate_insurance_plan(plan: &InsurancePlan) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &plan.name);
    errors.into_result()
}

pub fn validate_configured_procedure(procedure: &ConfiguredProcedure) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &procedure.name);
    if procedure.default_price_cents.is_some_and(|p| p < 0) {
        errors.add("default_price_cents", "must not be negative");
    }
    errors.into_result()
}

pub fn validate_marketing_source(source: &MarketingSource) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &source.name);
    errors.into_result()
}

pub fn validate_funnel(funnel: &Funnel) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &funnel.name);
    if funnel.stages.is_empty() {
        errors.add("stages", "a funnel needs at least one stage");
    }
    let mut seen = HashSet::new();
    for (i, stage) in funnel.stages.iter().enumerate() {
        let name = stage.name.trim();
        if name.is_empty() {
            errors.add(&format!("stages[{i}].name"), REQUIRED);
        } else if !seen.insert(name.to_lowercase()) {
            errors.add(&format!("stages[{i}].name"), "duplicate stage name");
        }
    }
    errors.into_result()
}

pub fn validate_patient(patient: &Patient) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("full_name", &patient.full_name);
    errors.require("status", &patient.status);
    if let Some(email) = patient.email.as_deref().filter(|e| !e.trim().is_empty()) {
        if !is_valid_email(email) {
            errors.add("email", "invalid email");
        }
    }
    if let Some(phone) = patient.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        if !is_valid_phone(phone) {
            errors.add("phone", "invalid phone number");
        }
    }
    if patient.doctor_id.is_some() && patient.hospital_id.is_none() {
        errors.add("doctor_id", "select a hospital first");
    }
    errors.into_result()
}

/// Child rows of a detail-editor save, keyed by collection and index
/// (`notes[0].description`).
pub fn validate_patient_children(draft: &PatientDraft) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for (i, note) in draft.notes.iter().enumerate() {
        errors.require(&format!("notes[{i}].description"), &note.description);
    }
    for (i, entry) in draft.history.iter().enumerate() {
        errors.require(&format!("history[{i}].action"), &entry.action);
        errors.require(&format!("history[{i}].description"), &entry.description);
    }
    for (i, procedure) in draft.procedures.iter().enumerate() {
        if procedure.price_cents.is_some_and(|p| p < 0) {
            errors.add(&format!("procedures[{i}].price_cents"), "must not be negative");
        }
        if let (Some(scheduled), Some(performed)) = (procedure.scheduled_date, procedure.performed_date) {
            if performed < scheduled {
                errors.add(&format!("procedures[{i}].performed_date"), "before the scheduled date");
            }
        }
    }
    errors.into_result()
}

pub fn validate_sign_up(email: &str, full_name: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("email", email);
    errors.require("full_name", full_name);
    if !email.trim().is_empty() && !is_valid_email(email) {
        errors.add("email", "invalid email");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    errors.into_result()
}

/// Treat the nil UUID a form sends for "nothing selected" as absent.
pub fn non_nil(id: Option<Uuid>) -> Option<Uuid> {
    id.filter(|id| !id.is_nil())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn hospital(name: &str) -> Hospital {
        Hospital {
            id: Uuid::new_v4(),
            name: name.into(),
            city: None,
            phone: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn hospital_with_blank_name_is_required() {
        let errors = validate_hospital(&hospital("   ")).unwrap_err();
        assert_eq!(errors.get("name"), Some(REQUIRED));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn hospital_with_name_passes() {
        assert!(validate_hospital(&hospital("Hospital de Olhos")).is_ok());
    }

    #[test]
    fn doctor_without_hospital_is_rejected() {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            hospital_id: Uuid::nil(),
            name: "Dr. Rui".into(),
            crm_number: None,
            specialty: None,
            phone: None,
            active: true,
        };
        let errors = validate_doctor(&doctor, false).unwrap_err();
        assert_eq!(errors.get("hospital_id"), Some("select a hospital first"));
    }

    #[test]
    fn funnel_stage_names_must_be_unique_ignoring_case() {
        let id = Uuid::new_v4();
        let stage = |name: &str, position| Stage {
            id: Uuid::new_v4(),
            funnel_id: id,
            name: name.into(),
            position,
            color: None,
        };
        let funnel = Funnel {
            id,
            name: "Refrativa".into(),
            position: 0,
            stages: vec![stage("Lead", 0), stage("lead", 1), stage("", 2)],
        };
        let errors = validate_funnel(&funnel).unwrap_err();
        assert_eq!(errors.get("stages[1].name"), Some("duplicate stage name"));
        assert_eq!(errors.get("stages[2].name"), Some(REQUIRED));
    }

    #[test]
    fn phone_length_bounds() {
        assert!(!is_valid_phone("98765-432"));
        assert!(is_valid_phone("(11) 98765-4321"));
        assert!(is_valid_phone("+55 11 98765-4321"));
        assert!(!is_valid_phone("+55 11 98765-4321 0000"));
    }

    #[test]
    fn sign_up_collects_all_problems() {
        let errors = validate_sign_up("not-an-email", "", "short").unwrap_err();
        assert_eq!(errors.get("email"), Some("invalid email"));
        assert_eq!(errors.get("full_name"), Some(REQUIRED));
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn blank_children_and_negative_price_are_flagged_by_index() {
        let draft: PatientDraft = serde_json::from_value(serde_json::json!({
            "full_name": "Ana",
            "status": "Lead",
            "notes": [{"id": "temp-1", "description": "ok"}, {"id": "temp-2", "description": "   "}],
            "history": [{"id": "temp-3", "action": "", "description": "Ligação"}],
            "procedures": [{"id": "temp-4", "kind": "surgery", "status": "won", "price_cents": -500}]
        }))
        .unwrap();
        let errors = validate_patient_children(&draft).unwrap_err();
        assert_eq!(errors.get("notes[1].description"), Some(REQUIRED));
        assert!(errors.get("notes[0].description").is_none());
        assert_eq!(errors.get("history[0].action"), Some(REQUIRED));
        assert_eq!(errors.get("procedures[0].price_cents"), Some("must not be negative"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn field_errors_serialize_as_flat_map() {
        let mut errors = FieldErrors::new();
        errors.add("name", REQUIRED);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"name": "required"}));
    }
}
