//! Patient detail save — diff-sync of the edited record against storage.
//!
//! The detail editor sends the whole patient with its three child
//! collections (notes, history entries, procedures). Child drafts carry
//! string IDs; an ID starting with `temp-` marks a row created in the
//! editor that has never been stored.
//!
//! For each collection the stored rows are re-read and compared:
//! `temp-` rows are inserted, changed rows updated, missing rows deleted,
//! untouched rows left alone. The patient update and every child write
//! run in a single transaction.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::{ProcedureKind, ProcedureStatus};
use crate::models::*;
use crate::validation::non_nil;

pub const TEMP_ID_PREFIX: &str = "temp-";

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

// ═══════════════════════════════════════════════════════════
// Drafts
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDraft {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDraft {
    pub id: String,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureDraft {
    pub id: String,
    pub kind: ProcedureKind,
    #[serde(default)]
    pub configured_procedure_id: Option<Uuid>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub performed_date: Option<NaiveDate>,
    pub status: ProcedureStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full edited patient as submitted by the detail editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDraft {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub insurance_plan_id: Option<Uuid>,
    #[serde(default)]
    pub funnel_id: Option<Uuid>,
    pub status: String,
    #[serde(default)]
    pub consultant_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub marketing: Marketing,
    #[serde(default)]
    pub notes: Vec<NoteDraft>,
    #[serde(default)]
    pub history: Vec<HistoryDraft>,
    #[serde(default)]
    pub procedures: Vec<ProcedureDraft>,
}

impl PatientDraft {
    /// Patient row as it will be stored: editable fields from the draft,
    /// identity and creation time from the stored row. Nil ids from empty
    /// selects are stored as absent.
    pub fn merged_into(&self, stored: &Patient) -> Patient {
        Patient {
            id: stored.id,
            full_name: self.full_name.trim().to_string(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            birth_date: self.birth_date,
            city: self.city.clone(),
            hospital_id: non_nil(self.hospital_id),
            doctor_id: non_nil(self.doctor_id),
            insurance_plan_id: non_nil(self.insurance_plan_id),
            funnel_id: non_nil(self.funnel_id),
            status: self.status.clone(),
            consultant_id: non_nil(self.consultant_id),
            manager_id: non_nil(self.manager_id),
            marketing: self.marketing.clone(),
            created_at: stored.created_at,
            updated_at: Utc::now(),
        }
    }
}

/// Who performed the save; stamped on newly inserted notes and history.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: Option<Uuid>,
    pub name: String,
}

// ═══════════════════════════════════════════════════════════
// Planning
// ═══════════════════════════════════════════════════════════

/// A child draft that can be compared against its stored row.
pub trait ChildDraft {
    type Stored;
    const KIND: &'static str;

    fn draft_id(&self) -> &str;
    fn stored_id(stored: &Self::Stored) -> Uuid;
    /// True when saving this draft would leave `stored` unchanged.
    fn matches(&self, stored: &Self::Stored) -> bool;
    /// Stored rows the editor may neither change nor remove.
    fn is_locked(_stored: &Self::Stored) -> bool {
        false
    }
}

impl ChildDraft for NoteDraft {
    type Stored = Note;
    const KIND: &'static str = "note";

    fn draft_id(&self) -> &str {
        &self.id
    }
    fn stored_id(stored: &Note) -> Uuid {
        stored.id
    }
    fn matches(&self, stored: &Note) -> bool {
        self.description == stored.description
    }
}

impl ChildDraft for HistoryDraft {
    type Stored = HistoryEntry;
    const KIND: &'static str = "history_entry";

    fn draft_id(&self) -> &str {
        &self.id
    }
    fn stored_id(stored: &HistoryEntry) -> Uuid {
        stored.id
    }
    fn matches(&self, stored: &HistoryEntry) -> bool {
        self.action == stored.action && self.description == stored.description
    }
    fn is_locked(stored: &HistoryEntry) -> bool {
        stored.is_system()
    }
}

impl ChildDraft for ProcedureDraft {
    type Stored = Procedure;
    const KIND: &'static str = "procedure";

    fn draft_id(&self) -> &str {
        &self.id
    }
    fn stored_id(stored: &Procedure) -> Uuid {
        stored.id
    }
    fn matches(&self, stored: &Procedure) -> bool {
        self.kind == stored.kind
            && non_nil(self.configured_procedure_id) == stored.configured_procedure_id
            && self.price_cents == stored.price_cents
            && self.scheduled_date == stored.scheduled_date
            && self.performed_date == stored.performed_date
            && self.status == stored.status
            && self.notes == stored.notes
    }
}

/// Writes needed to bring one stored collection in line with the edit.
pub struct ChildPlan<'a, D: ChildDraft> {
    pub inserts: Vec<&'a D>,
    pub updates: Vec<(&'a D, &'a D::Stored)>,
    pub deletes: Vec<Uuid>,
}

impl<D: ChildDraft> ChildPlan<'_, D> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn counts(&self) -> ChildCounts {
        ChildCounts {
            inserted: self.inserts.len(),
            updated: self.updates.len(),
            deleted: self.deletes.len(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Unknown {kind} id '{id}' for this patient")]
    UnknownChild { kind: &'static str, id: String },
    #[error("Duplicate {kind} id '{id}' in submitted record")]
    DuplicateChild { kind: &'static str, id: String },
    #[error("The {kind} '{id}' is system-written and cannot be edited")]
    LockedChild { kind: &'static str, id: String },
}

/// Compare edited drafts with the stored rows of one collection.
///
/// A non-temp ID that is not among the stored rows is rejected rather than
/// silently re-created. Locked rows are never deleted, and editing one is
/// rejected.
pub fn plan_children<'a, D: ChildDraft>(
    edited: &'a [D],
    original: &'a [D::Stored],
) -> Result<ChildPlan<'a, D>, SyncError> {
    let by_id: HashMap<Uuid, &D::Stored> =
        original.iter().map(|s| (D::stored_id(s), s)).collect();

    let mut plan = ChildPlan {
        inserts: Vec::new(),
        updates: Vec::new(),
        deletes: Vec::new(),
    };
    let mut kept = HashSet::new();

    for draft in edited {
        let raw = draft.draft_id();
        if is_temp_id(raw) {
            plan.inserts.push(draft);
            continue;
        }
        let unknown = || SyncError::UnknownChild {
            kind: D::KIND,
            id: raw.to_string(),
        };
        let id = Uuid::parse_str(raw).map_err(|_| unknown())?;
        let stored = by_id.get(&id).copied().ok_or_else(unknown)?;
        if !kept.insert(id) {
            return Err(SyncError::DuplicateChild {
                kind: D::KIND,
                id: raw.to_string(),
            });
        }
        if !draft.matches(stored) {
            if D::is_locked(stored) {
                return Err(SyncError::LockedChild {
                    kind: D::KIND,
                    id: raw.to_string(),
                });
            }
            plan.updates.push((draft, stored));
        }
    }

    plan.deletes = original
        .iter()
        .filter(|s| !D::is_locked(*s))
        .map(D::stored_id)
        .filter(|id| !kept.contains(id))
        .collect();

    Ok(plan)
}

// ═══════════════════════════════════════════════════════════
// Save
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChildCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub patient: Patient,
    pub notes: ChildCounts,
    pub history: ChildCounts,
    pub procedures: ChildCounts,
}

/// Save an edited patient with all child changes in one transaction.
///
/// Any failure rolls everything back; the stored record is then exactly
/// what it was before the call.
pub fn save_patient(
    conn: &Connection,
    patient_id: &Uuid,
    draft: &PatientDraft,
    author: &Author,
) -> Result<SyncReport, SyncError> {
    let stored = db::get_patient(conn, patient_id)?
        .ok_or_else(|| DatabaseError::not_found("patient", patient_id))?;
    let original_notes = db::list_notes_for_patient(conn, patient_id)?;
    let original_history = db::list_history_for_patient(conn, patient_id)?;
    let original_procedures = db::list_procedures_for_patient(conn, patient_id)?;

    let notes = plan_children(&draft.notes, &original_notes)?;
    let history = plan_children(&draft.history, &original_history)?;
    let procedures = plan_children(&draft.procedures, &original_procedures)?;

    let patient = draft.merged_into(&stored);
    let now = Utc::now();

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

    db::update_patient(&tx, &patient)?;

    for d in &notes.inserts {
        db::insert_note(&tx, &Note {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            author_id: author.id,
            author_name: author.name.clone(),
            description: d.description.clone(),
            created_at: now,
        })?;
    }
    for (d, stored) in &notes.updates {
        db::update_note(&tx, &Note {
            description: d.description.clone(),
            ..(*stored).clone()
        })?;
    }
    for id in &notes.deletes {
        db::delete_note(&tx, id)?;
    }

    for d in &history.inserts {
        db::insert_history_entry(&tx, &HistoryEntry {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            author_id: author.id,
            author_name: author.name.clone(),
            action: d.action.clone(),
            description: d.description.clone(),
            created_at: now,
        })?;
    }
    for (d, stored) in &history.updates {
        db::update_history_entry(&tx, &HistoryEntry {
            action: d.action.clone(),
            description: d.description.clone(),
            ..(*stored).clone()
        })?;
    }
    for id in &history.deletes {
        db::delete_history_entry(&tx, id)?;
    }

    for d in &procedures.inserts {
        db::insert_procedure(&tx, &procedure_from_draft(Uuid::new_v4(), *patient_id, d))?;
    }
    for (d, stored) in &procedures.updates {
        db::update_procedure(&tx, &procedure_from_draft(stored.id, *patient_id, d))?;
    }
    for id in &procedures.deletes {
        db::delete_procedure(&tx, id)?;
    }

    tx.commit().map_err(DatabaseError::from)?;

    let report = SyncReport {
        patient,
        notes: notes.counts(),
        history: history.counts(),
        procedures: procedures.counts(),
    };
    tracing::info!(
        patient_id = %patient_id,
        notes = ?report.notes,
        history = ?report.history,
        procedures = ?report.procedures,
        "Patient saved"
    );
    Ok(report)
}

fn procedure_from_draft(id: Uuid, patient_id: Uuid, d: &ProcedureDraft) -> Procedure {
    Procedure {
        id,
        patient_id,
        kind: d.kind,
        configured_procedure_id: non_nil(d.configured_procedure_id),
        price_cents: d.price_cents,
        scheduled_date: d.scheduled_date,
        performed_date: d.performed_date,
        status: d.status,
        notes: d.notes.clone(),
    }
}

/// Draft mirroring the stored record exactly; saving it writes no children.
pub fn draft_from_stored(
    patient: &Patient,
    notes: &[Note],
    history: &[HistoryEntry],
    procedures: &[Procedure],
) -> PatientDraft {
    PatientDraft {
        full_name: patient.full_name.clone(),
        email: patient.email.clone(),
        phone: patient.phone.clone(),
        birth_date: patient.birth_date,
        city: patient.city.clone(),
        hospital_id: patient.hospital_id,
        doctor_id: patient.doctor_id,
        insurance_plan_id: patient.insurance_plan_id,
        funnel_id: patient.funnel_id,
        status: patient.status.clone(),
        consultant_id: patient.consultant_id,
        manager_id: patient.manager_id,
        marketing: patient.marketing.clone(),
        notes: notes
            .iter()
            .map(|n| NoteDraft {
                id: n.id.to_string(),
                description: n.description.clone(),
            })
            .collect(),
        history: history
            .iter()
            .map(|h| HistoryDraft {
                id: h.id.to_string(),
                action: h.action.clone(),
                description: h.description.clone(),
            })
            .collect(),
        procedures: procedures
            .iter()
            .map(|p| ProcedureDraft {
                id: p.id.to_string(),
                kind: p.kind,
                configured_procedure_id: p.configured_procedure_id,
                price_cents: p.price_cents,
                scheduled_date: p.scheduled_date,
                performed_date: p.performed_date,
                status: p.status,
                notes: p.notes.clone(),
            })
            .collect(),
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn author() -> Author {
        Author {
            id: None,
            name: "Marina".into(),
        }
    }

    fn stored_draft(conn: &Connection, patient: &Patient) -> PatientDraft {
        draft_from_stored(
            patient,
            &db::list_notes_for_patient(conn, &patient.id).unwrap(),
            &db::list_history_for_patient(conn, &patient.id).unwrap(),
            &db::list_procedures_for_patient(conn, &patient.id).unwrap(),
        )
    }

    #[test]
    fn temp_prefix_marks_new_rows() {
        assert!(is_temp_id("temp-1718000000"));
        assert!(!is_temp_id(&Uuid::new_v4().to_string()));
    }

    #[test]
    fn two_new_notes_and_one_history_entry_are_the_only_writes() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        let kept = fixtures::note(&conn, p.id, "Primeiro contato");

        let mut draft = stored_draft(&conn, &p);
        draft.notes.push(NoteDraft { id: "temp-1".into(), description: "Pediu orçamento".into() });
        draft.notes.push(NoteDraft { id: "temp-2".into(), description: "Retornar sexta".into() });
        draft.history.push(HistoryDraft {
            id: "temp-3".into(),
            action: "call".into(),
            description: "Ligação realizada".into(),
        });

        let report = save_patient(&conn, &p.id, &draft, &author()).unwrap();

        assert_eq!(report.notes, ChildCounts { inserted: 2, updated: 0, deleted: 0 });
        assert_eq!(report.history, ChildCounts { inserted: 1, updated: 0, deleted: 0 });
        assert_eq!(report.procedures, ChildCounts::default());

        let notes = db::list_notes_for_patient(&conn, &p.id).unwrap();
        assert_eq!(notes.len(), 3);
        let untouched = notes.iter().find(|n| n.id == kept.id).unwrap();
        assert_eq!(untouched, &kept);
        assert!(notes.iter().all(|n| !n.id.to_string().starts_with(TEMP_ID_PREFIX)));

        let history = db::list_history_for_patient(&conn, &p.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].author_name, "Marina");
    }

    #[test]
    fn removed_procedure_is_deleted_by_id() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        let keep = fixtures::procedure(&conn, p.id, ProcedureKind::Consultation);
        let gone = fixtures::procedure(&conn, p.id, ProcedureKind::Surgery);

        let mut draft = stored_draft(&conn, &p);
        draft.procedures.retain(|d| d.id != gone.id.to_string());

        let original = db::list_procedures_for_patient(&conn, &p.id).unwrap();
        let plan = plan_children(&draft.procedures, &original).unwrap();
        assert_eq!(plan.deletes, vec![gone.id]);
        assert!(plan.inserts.is_empty() && plan.updates.is_empty());

        let report = save_patient(&conn, &p.id, &draft, &author()).unwrap();
        assert_eq!(report.procedures, ChildCounts { inserted: 0, updated: 0, deleted: 1 });

        let left = db::list_procedures_for_patient(&conn, &p.id).unwrap();
        assert_eq!(left.iter().map(|x| x.id).collect::<Vec<_>>(), vec![keep.id]);
    }

    #[test]
    fn edited_child_is_updated_in_place() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        let proc = fixtures::procedure(&conn, p.id, ProcedureKind::Exam);

        let mut draft = stored_draft(&conn, &p);
        draft.procedures[0].status = ProcedureStatus::Won;

        let report = save_patient(&conn, &p.id, &draft, &author()).unwrap();
        assert_eq!(report.procedures, ChildCounts { inserted: 0, updated: 1, deleted: 0 });

        let stored = db::list_procedures_for_patient(&conn, &p.id).unwrap();
        assert_eq!(stored[0].id, proc.id);
        assert_eq!(stored[0].status, ProcedureStatus::Won);
    }

    #[test]
    fn unchanged_record_plans_no_child_writes() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        fixtures::note(&conn, p.id, "a");
        fixtures::procedure(&conn, p.id, ProcedureKind::Exam);

        let draft = stored_draft(&conn, &p);
        let notes = db::list_notes_for_patient(&conn, &p.id).unwrap();
        assert!(plan_children(&draft.notes, &notes).unwrap().is_empty());
    }

    #[test]
    fn unknown_child_id_is_rejected_and_nothing_written() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");

        let mut draft = stored_draft(&conn, &p);
        draft.full_name = "Ana Paula".into();
        draft.notes.push(NoteDraft { id: "temp-1".into(), description: "x".into() });
        draft.notes.push(NoteDraft { id: Uuid::new_v4().to_string(), description: "y".into() });

        let err = save_patient(&conn, &p.id, &draft, &author()).unwrap_err();
        assert!(matches!(err, SyncError::UnknownChild { kind: "note", .. }));
        assert!(db::list_notes_for_patient(&conn, &p.id).unwrap().is_empty());
        assert_eq!(db::get_patient(&conn, &p.id).unwrap().unwrap().full_name, "Ana");
    }

    #[test]
    fn failed_child_write_rolls_back_patient_update() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");

        let mut draft = stored_draft(&conn, &p);
        draft.full_name = "Ana Paula".into();
        draft.procedures.push(ProcedureDraft {
            id: "temp-9".into(),
            kind: ProcedureKind::Surgery,
            // Dangling catalog reference trips the foreign key.
            configured_procedure_id: Some(Uuid::new_v4()),
            price_cents: None,
            scheduled_date: None,
            performed_date: None,
            status: ProcedureStatus::Pending,
            notes: None,
        });

        assert!(save_patient(&conn, &p.id, &draft, &author()).is_err());
        assert_eq!(db::get_patient(&conn, &p.id).unwrap().unwrap().full_name, "Ana");
        assert!(db::list_procedures_for_patient(&conn, &p.id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_existing_id_is_rejected() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        fixtures::note(&conn, p.id, "a");

        let mut draft = stored_draft(&conn, &p);
        let dup = draft.notes[0].clone();
        draft.notes.push(dup);

        let err = save_patient(&conn, &p.id, &draft, &author()).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateChild { .. }));
    }

    #[test]
    fn created_entry_survives_omission_and_rejects_edits() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        let created = HistoryEntry {
            id: Uuid::new_v4(),
            patient_id: p.id,
            author_id: None,
            author_name: "Marina".into(),
            action: CREATED_ACTION.into(),
            description: "Lead created in stage Lead".into(),
            created_at: Utc::now(),
        };
        db::insert_history_entry(&conn, &created).unwrap();

        let mut draft = stored_draft(&conn, &p);
        draft.history.clear();
        let report = save_patient(&conn, &p.id, &draft, &author()).unwrap();
        assert_eq!(report.history, ChildCounts::default());

        let mut draft = stored_draft(&conn, &p);
        draft.history[0].description = "rewritten".into();
        let err = save_patient(&conn, &p.id, &draft, &author()).unwrap_err();
        assert!(matches!(err, SyncError::LockedChild { kind: "history_entry", .. }));
        assert_eq!(db::list_history_for_patient(&conn, &p.id).unwrap(), vec![created]);
    }

    #[test]
    fn nil_ids_from_empty_selects_are_stored_as_absent() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        let proc = fixtures::procedure(&conn, p.id, ProcedureKind::Exam);

        let mut draft = stored_draft(&conn, &p);
        draft.insurance_plan_id = Some(Uuid::nil());
        draft.consultant_id = Some(Uuid::nil());
        draft.procedures[0].configured_procedure_id = Some(Uuid::nil());

        let report = save_patient(&conn, &p.id, &draft, &author()).unwrap();
        assert!(report.patient.insurance_plan_id.is_none());
        assert!(report.patient.consultant_id.is_none());
        assert_eq!(report.procedures, ChildCounts::default());
        assert_eq!(db::list_procedures_for_patient(&conn, &p.id).unwrap(), vec![proc]);
    }

    #[test]
    fn missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Ana", None, "Lead");
        let draft = stored_draft(&conn, &p);
        let err = save_patient(&conn, &Uuid::new_v4(), &draft, &author()).unwrap_err();
        assert!(matches!(err, SyncError::Database(DatabaseError::NotFound { .. })));
    }
}
