//! Patient detail view: tab state and the assembled record behind it.
//!
//! `PatientDetail` is the editor's view state, exported for clients that
//! embed the library; the HTTP API is stateless and only serves
//! `load_patient_detail`.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::*;
use crate::whatsapp::{is_sendable, ChatMessage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailTab {
    #[default]
    Contact,
    Procedures,
    Notes,
    History,
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

/// Which patient is open, on which tab, and the chat history loaded for it.
/// Held by the client, never stored server-side.
#[derive(Debug, Default)]
pub struct PatientDetail {
    patient_id: Option<Uuid>,
    tab: DetailTab,
    chat: Vec<ChatMessage>,
}

impl PatientDetail {
    pub fn open(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        self.patient_id
    }

    pub fn tab(&self) -> DetailTab {
        self.tab
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Show another patient. The previous patient's chat must not leak into
    /// the new view, so the tab resets and the history is dropped.
    pub fn switch_patient(&mut self, patient_id: Uuid) {
        if self.patient_id == Some(patient_id) {
            return;
        }
        self.patient_id = Some(patient_id);
        self.tab = DetailTab::Contact;
        self.chat.clear();
    }

    /// Returns `true` when the chat history has to be fetched.
    pub fn select_tab(&mut self, tab: DetailTab) -> bool {
        let entering_chat = tab == DetailTab::WhatsApp && self.tab != DetailTab::WhatsApp;
        self.tab = tab;
        entering_chat
    }

    pub fn set_chat(&mut self, messages: Vec<ChatMessage>) {
        self.chat = messages;
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }
}

/// Everything the detail editor shows for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct PatientRecord {
    pub patient: Patient,
    pub hospital_name: Option<String>,
    pub doctor_name: Option<String>,
    pub insurance_plan_name: Option<String>,
    pub procedures: Vec<Procedure>,
    pub notes: Vec<Note>,
    pub history: Vec<HistoryEntry>,
    /// Whether the WhatsApp tab can send to this patient's phone.
    pub whatsapp_sendable: bool,
}

pub fn load_patient_detail(conn: &Connection, patient_id: &Uuid) -> Result<PatientRecord, DatabaseError> {
    let patient = db::get_patient(conn, patient_id)?
        .ok_or_else(|| DatabaseError::not_found("patient", patient_id))?;

    let hospital_name = match patient.hospital_id {
        Some(id) => db::get_hospital(conn, &id)?.map(|h| h.name),
        None => None,
    };
    let doctor_name = match patient.doctor_id {
        Some(id) => db::get_doctor(conn, &id)?.map(|d| d.name),
        None => None,
    };
    let insurance_plan_name = match patient.insurance_plan_id {
        Some(id) => db::get_insurance_plan(conn, &id)?.map(|p| p.name),
        None => None,
    };

    Ok(PatientRecord {
        whatsapp_sendable: is_sendable(patient.phone.as_deref()),
        procedures: db::list_procedures_for_patient(conn, patient_id)?,
        notes: db::list_notes_for_patient(conn, patient_id)?,
        history: db::list_history_for_patient(conn, patient_id)?,
        hospital_name,
        doctor_name,
        insurance_plan_name,
        patient,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ProcedureKind;
    use crate::whatsapp::MessageKind;

    fn chat_message() -> ChatMessage {
        ChatMessage {
            id: "m1".into(),
            from_me: false,
            kind: MessageKind::Text,
            text: Some("Bom dia".into()),
            file_name: None,
            mimetype: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn switching_patient_resets_tab_and_chat() {
        let mut detail = PatientDetail::open(Uuid::new_v4());
        assert!(detail.select_tab(DetailTab::WhatsApp));
        detail.set_chat(vec![chat_message()]);

        let other = Uuid::new_v4();
        detail.switch_patient(other);

        assert_eq!(detail.patient_id(), Some(other));
        assert_eq!(detail.tab(), DetailTab::Contact);
        assert!(detail.chat().is_empty());
    }

    #[test]
    fn reopening_same_patient_keeps_state() {
        let id = Uuid::new_v4();
        let mut detail = PatientDetail::open(id);
        detail.select_tab(DetailTab::Notes);
        detail.switch_patient(id);
        assert_eq!(detail.tab(), DetailTab::Notes);
    }

    #[test]
    fn only_entering_whatsapp_triggers_fetch() {
        let mut detail = PatientDetail::open(Uuid::new_v4());
        assert!(!detail.select_tab(DetailTab::Procedures));
        assert!(detail.select_tab(DetailTab::WhatsApp));
        assert!(!detail.select_tab(DetailTab::WhatsApp));
    }

    #[test]
    fn close_clears_everything() {
        let mut detail = PatientDetail::open(Uuid::new_v4());
        detail.set_chat(vec![chat_message()]);
        detail.close();
        assert!(detail.patient_id().is_none());
        assert!(detail.chat().is_empty());
    }

    #[test]
    fn record_resolves_reference_names() {
        let conn = open_memory_database().unwrap();
        let hospital = fixtures::hospital(&conn, "Hospital de Olhos");
        let mut p = fixtures::patient(&conn, "Ana", None, "Lead");
        p.hospital_id = Some(hospital.id);
        db::update_patient(&conn, &p).unwrap();
        fixtures::note(&conn, p.id, "Primeiro contato");
        fixtures::procedure(&conn, p.id, ProcedureKind::Consultation);

        let record = load_patient_detail(&conn, &p.id).unwrap();
        assert_eq!(record.hospital_name.as_deref(), Some("Hospital de Olhos"));
        assert!(record.doctor_name.is_none());
        assert_eq!(record.notes.len(), 1);
        assert_eq!(record.procedures.len(), 1);
        assert!(record.whatsapp_sendable);
    }

    #[test]
    fn missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            load_patient_detail(&conn, &Uuid::new_v4()),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
