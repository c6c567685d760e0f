//! Kanban pipeline board — patients grouped into one column per funnel stage.
//!
//! A move is optimistic: the card's status is rewritten locally first, then a
//! single status write goes to storage. If the write fails the board is put
//! back exactly as it was before the move and an error notice is queued.
//!
//! Stage order is display-only. Any stage can be reached from any other in
//! one move; there is no transition table.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{Funnel, Patient, PatientFilter, Stage};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The slice of a patient a board card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientCard {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub status: String,
    pub hospital_id: Option<Uuid>,
    pub consultant_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<Patient> for PatientCard {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id,
            full_name: p.full_name,
            phone: p.phone,
            status: p.status,
            hospital_id: p.hospital_id,
            consultant_id: p.consultant_id,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub stage: Stage,
    pub cards: Vec<PatientCard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing notification produced by a board action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved { from: String, to: String },
    /// Dropped on its own column; nothing written.
    Unchanged,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage '{0}' does not exist in this funnel")]
    UnknownStage(String),
    #[error("Patient {0} is not on this board")]
    PatientNotOnBoard(Uuid),
    #[error("Failed to update patient status: {0}")]
    WriteFailed(#[source] DatabaseError),
}

/// Persists a patient's new stage. One call per move.
pub trait StatusWriter {
    fn write_status(&self, patient_id: &Uuid, stage: &str) -> Result<(), DatabaseError>;
}

/// Writes the status column of a single patient row.
pub struct SqliteStatusWriter<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStatusWriter<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StatusWriter for SqliteStatusWriter<'_> {
    fn write_status(&self, patient_id: &Uuid, stage: &str) -> Result<(), DatabaseError> {
        db::update_patient_status(self.conn, patient_id, stage, Utc::now())
    }
}

// ═══════════════════════════════════════════════════════════
// Board
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Board {
    funnel: Funnel,
    cards: Vec<PatientCard>,
    notices: Vec<Notice>,
}

impl Board {
    pub fn build(funnel: Funnel, patients: Vec<Patient>) -> Self {
        Self {
            funnel,
            cards: patients.into_iter().map(PatientCard::from).collect(),
            notices: Vec::new(),
        }
    }

    pub fn funnel(&self) -> &Funnel {
        &self.funnel
    }

    /// One column per stage, in stage order. Cards keep their load order.
    pub fn columns(&self) -> Vec<Column> {
        self.funnel
            .stages
            .iter()
            .map(|stage| Column {
                stage: stage.clone(),
                cards: self
                    .cards
                    .iter()
                    .filter(|c| c.status == stage.name)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    /// Cards whose status names no stage of the funnel. They render nowhere.
    pub fn unplaced(&self) -> Vec<&PatientCard> {
        self.cards
            .iter()
            .filter(|c| self.funnel.stage_named(&c.status).is_none())
            .collect()
    }

    pub fn stage_of(&self, patient_id: &Uuid) -> Option<&str> {
        self.cards
            .iter()
            .find(|c| &c.id == patient_id)
            .map(|c| c.status.as_str())
    }

    /// Move a card to `target_stage`.
    ///
    /// On a failed write the board is restored to its pre-move state, an
    /// error notice is queued and the error is returned.
    pub fn move_patient(
        &mut self,
        patient_id: &Uuid,
        target_stage: &str,
        writer: &impl StatusWriter,
    ) -> Result<MoveOutcome, PipelineError> {
        if self.funnel.stage_named(target_stage).is_none() {
            return Err(PipelineError::UnknownStage(target_stage.to_string()));
        }
        let index = self
            .cards
            .iter()
            .position(|c| &c.id == patient_id)
            .ok_or(PipelineError::PatientNotOnBoard(*patient_id))?;

        let from = self.cards[index].status.clone();
        if from == target_stage {
            return Ok(MoveOutcome::Unchanged);
        }

        let snapshot = self.cards.clone();
        self.cards[index].status = target_stage.to_string();
        self.cards[index].updated_at = Utc::now();

        match writer.write_status(patient_id, target_stage) {
            Ok(()) => {
                tracing::info!(patient_id = %patient_id, from = %from, to = %target_stage, "Patient moved");
                self.notices.push(Notice {
                    level: NoticeLevel::Success,
                    message: format!("{} moved to {target_stage}", self.cards[index].full_name),
                });
                Ok(MoveOutcome::Moved {
                    from,
                    to: target_stage.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, error = %e, "Status write failed, reverting move");
                self.cards = snapshot;
                self.notices.push(Notice {
                    level: NoticeLevel::Error,
                    message: format!("Could not move patient: {e}"),
                });
                Err(PipelineError::WriteFailed(e))
            }
        }
    }

    /// Take the queued notices, oldest first.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Serializable board for the API.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub funnel_id: Uuid,
    pub funnel_name: String,
    pub columns: Vec<Column>,
    pub unplaced: Vec<PatientCard>,
    pub notices: Vec<Notice>,
}

impl From<&mut Board> for BoardView {
    fn from(board: &mut Board) -> Self {
        Self {
            funnel_id: board.funnel.id,
            funnel_name: board.funnel.name.clone(),
            columns: board.columns(),
            unplaced: board.unplaced().into_iter().cloned().collect(),
            notices: board.drain_notices(),
        }
    }
}

/// Load the board for one funnel with its patients.
pub fn load_board(conn: &Connection, funnel_id: &Uuid) -> Result<Board, DatabaseError> {
    let funnel = db::get_funnel(conn, funnel_id)?
        .ok_or_else(|| DatabaseError::not_found("funnel", funnel_id))?;
    let patients = db::list_patients(conn, &PatientFilter {
        funnel_id: Some(*funnel_id),
        ..Default::default()
    })?;
    Ok(Board::build(funnel, patients))
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    /// Records every write; fails all of them when `fail` is set.
    #[derive(Default)]
    struct RecordingWriter {
        calls: RefCell<Vec<(Uuid, String)>>,
        fail: bool,
    }

    impl StatusWriter for RecordingWriter {
        fn write_status(&self, patient_id: &Uuid, stage: &str) -> Result<(), DatabaseError> {
            self.calls.borrow_mut().push((*patient_id, stage.to_string()));
            if self.fail {
                return Err(DatabaseError::ConstraintViolation("connection reset".into()));
            }
            Ok(())
        }
    }

    fn board_with(stages: &[&str], patients: &[(&str, &str)]) -> (Board, Vec<Uuid>) {
        let conn = open_memory_database().unwrap();
        let funnel = fixtures::funnel(&conn, "Catarata", stages);
        let ps: Vec<Patient> = patients
            .iter()
            .map(|(name, status)| fixtures::patient(&conn, name, Some(&funnel), status))
            .collect();
        let ids = ps.iter().map(|p| p.id).collect();
        (Board::build(funnel, ps), ids)
    }

    fn column_names(board: &Board, stage: &str) -> Vec<String> {
        board
            .columns()
            .into_iter()
            .find(|c| c.stage.name == stage)
            .map(|c| c.cards.into_iter().map(|card| card.full_name).collect())
            .unwrap_or_default()
    }

    #[test]
    fn columns_follow_stage_order() {
        let (board, _) = board_with(
            &["Lead", "Consulta", "Cirurgia"],
            &[("Ana", "Cirurgia"), ("Bia", "Lead")],
        );
        let stages: Vec<String> = board.columns().into_iter().map(|c| c.stage.name).collect();
        assert_eq!(stages, vec!["Lead", "Consulta", "Cirurgia"]);
        assert_eq!(column_names(&board, "Lead"), vec!["Bia"]);
    }

    #[test]
    fn status_outside_funnel_is_unplaced() {
        let (board, _) = board_with(&["Lead"], &[("Ana", "Lead"), ("Caio", "Arquivado")]);
        let unplaced: Vec<&str> = board.unplaced().iter().map(|c| c.full_name.as_str()).collect();
        assert_eq!(unplaced, vec!["Caio"]);
        assert_eq!(board.columns()[0].cards.len(), 1);
    }

    #[test]
    fn move_issues_exactly_one_write_with_new_stage() {
        let (mut board, ids) = board_with(&["Lead", "Consulta"], &[("Ana", "Lead")]);
        let writer = RecordingWriter::default();

        let outcome = board.move_patient(&ids[0], "Consulta", &writer).unwrap();

        assert_eq!(
            outcome,
            MoveOutcome::Moved { from: "Lead".into(), to: "Consulta".into() }
        );
        assert_eq!(*writer.calls.borrow(), vec![(ids[0], "Consulta".to_string())]);
        assert_eq!(board.stage_of(&ids[0]), Some("Consulta"));
        assert_eq!(column_names(&board, "Consulta"), vec!["Ana"]);
        assert!(column_names(&board, "Lead").is_empty());
        assert_eq!(board.drain_notices()[0].level, NoticeLevel::Success);
    }

    #[test]
    fn failed_write_reverts_card_and_reports_error() {
        let (mut board, ids) = board_with(&["Lead", "Consulta"], &[("Ana", "Lead"), ("Bia", "Lead")]);
        let before = board.columns();
        let writer = RecordingWriter { fail: true, ..Default::default() };

        let err = board.move_patient(&ids[0], "Consulta", &writer).unwrap_err();

        assert!(matches!(err, PipelineError::WriteFailed(_)));
        assert_eq!(writer.calls.borrow().len(), 1);
        assert_eq!(board.stage_of(&ids[0]), Some("Lead"));
        assert_eq!(column_names(&board, "Lead"), vec!["Ana", "Bia"]);
        assert_eq!(board.columns()[0].cards, before[0].cards);

        let notices = board.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("connection reset"));
    }

    #[test]
    fn drop_on_same_column_writes_nothing() {
        let (mut board, ids) = board_with(&["Lead", "Consulta"], &[("Ana", "Lead")]);
        let writer = RecordingWriter::default();
        let outcome = board.move_patient(&ids[0], "Lead", &writer).unwrap();
        assert_eq!(outcome, MoveOutcome::Unchanged);
        assert!(writer.calls.borrow().is_empty());
    }

    #[test]
    fn any_stage_reachable_including_backwards() {
        let (mut board, ids) = board_with(&["Lead", "Consulta", "Cirurgia"], &[("Ana", "Cirurgia")]);
        let writer = RecordingWriter::default();
        board.move_patient(&ids[0], "Lead", &writer).unwrap();
        assert_eq!(board.stage_of(&ids[0]), Some("Lead"));
    }

    #[test]
    fn unknown_target_stage_is_rejected_without_write() {
        let (mut board, ids) = board_with(&["Lead"], &[("Ana", "Lead")]);
        let writer = RecordingWriter::default();
        let err = board.move_patient(&ids[0], "Nowhere", &writer).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStage(_)));
        assert!(writer.calls.borrow().is_empty());
    }

    #[test]
    fn sqlite_writer_persists_the_move() {
        let conn = open_memory_database().unwrap();
        let funnel = fixtures::funnel(&conn, "Catarata", &["Lead", "Consulta"]);
        let p = fixtures::patient(&conn, "Ana", Some(&funnel), "Lead");

        let mut board = load_board(&conn, &funnel.id).unwrap();
        board
            .move_patient(&p.id, "Consulta", &SqliteStatusWriter::new(&conn))
            .unwrap();

        let reloaded = load_board(&conn, &funnel.id).unwrap();
        assert_eq!(reloaded.stage_of(&p.id), Some("Consulta"));
    }

    #[test]
    fn sqlite_writer_failure_reverts() {
        let conn = open_memory_database().unwrap();
        let funnel = fixtures::funnel(&conn, "Catarata", &["Lead", "Consulta"]);
        let p = fixtures::patient(&conn, "Ana", Some(&funnel), "Lead");
        let mut board = load_board(&conn, &funnel.id).unwrap();

        // Another session deleted the patient in the meantime.
        db::delete_patient(&conn, &p.id).unwrap();

        let err = board
            .move_patient(&p.id, "Consulta", &SqliteStatusWriter::new(&conn))
            .unwrap_err();
        assert!(matches!(err, PipelineError::WriteFailed(DatabaseError::NotFound { .. })));
        assert_eq!(board.stage_of(&p.id), Some("Lead"));
    }
}
