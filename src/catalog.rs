//! Everything a signed-in client loads up front, in one call.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, DatabaseError};
use crate::models::*;

#[derive(Debug, Clone, Serialize)]
pub struct HospitalWithDoctors {
    #[serde(flatten)]
    pub hospital: Hospital,
    pub doctors: Vec<Doctor>,
}

/// Reference data plus the patient list.
#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub hospitals: Vec<HospitalWithDoctors>,
    pub insurance_plans: Vec<InsurancePlan>,
    pub procedures: Vec<ConfiguredProcedure>,
    pub funnels: Vec<Funnel>,
    pub users: Vec<UserProfile>,
    pub marketing_sources: Vec<MarketingSource>,
    pub patients: Vec<Patient>,
}

pub fn load_workspace(conn: &Connection, filter: &PatientFilter) -> Result<Workspace, DatabaseError> {
    let mut doctors = db::list_doctors(conn)?;
    let hospitals = db::list_hospitals(conn)?
        .into_iter()
        .map(|hospital| {
            let (mine, rest): (Vec<Doctor>, Vec<Doctor>) = std::mem::take(&mut doctors)
                .into_iter()
                .partition(|d| d.hospital_id == hospital.id);
            doctors = rest;
            HospitalWithDoctors { hospital, doctors: mine }
        })
        .collect();

    let workspace = Workspace {
        hospitals,
        insurance_plans: db::list_insurance_plans(conn)?,
        procedures: db::list_configured_procedures(conn)?,
        funnels: db::list_funnels(conn)?,
        users: db::list_users(conn)?,
        marketing_sources: db::list_marketing_sources(conn)?,
        patients: reload_patients(conn, filter)?,
    };
    tracing::debug!(
        hospitals = workspace.hospitals.len(),
        funnels = workspace.funnels.len(),
        patients = workspace.patients.len(),
        "Workspace loaded"
    );
    Ok(workspace)
}

/// Re-read only the patients, after reference data changed.
pub fn reload_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, DatabaseError> {
    db::list_patients(conn, filter)
}
