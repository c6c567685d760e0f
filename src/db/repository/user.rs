use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_at, expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const USER_COLUMNS: &str = "id, email, full_name, role, avatar_path, active, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        role: enum_at(row, 3)?,
        avatar_path: row.get(4)?,
        active: row.get::<_, i32>(5)? != 0,
        created_at: row.get(6)?,
    })
}

/// Emails are stored lower-cased; lookups must lower-case too.
pub fn insert_user(
    conn: &Connection,
    user: &UserProfile,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO user_profiles (id, email, full_name, role, avatar_path, password_hash,
         active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.email.to_lowercase(),
            user.full_name,
            user.role.as_str(),
            user.avatar_path,
            password_hash,
            user.active as i32,
            user.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<UserProfile>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM user_profiles WHERE id = ?1"),
        params![id.to_string()],
        user_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// User plus stored password hash, for sign-in.
pub fn get_user_credentials(
    conn: &Connection,
    email: &str,
) -> Result<Option<(UserProfile, String)>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS}, password_hash FROM user_profiles WHERE email = ?1"),
        params![email.trim().to_lowercase()],
        |row| Ok((user_from_row(row)?, row.get::<_, String>(7)?)),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn count_users(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM user_profiles", [], |row| row.get(0))?)
}

pub fn list_users(conn: &Connection) -> Result<Vec<UserProfile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM user_profiles ORDER BY full_name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Update name, role and active flag. Email and password are not editable here.
pub fn update_user(conn: &Connection, user: &UserProfile) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE user_profiles SET full_name = ?2, role = ?3, active = ?4 WHERE id = ?1",
        params![
            user.id.to_string(),
            user.full_name,
            user.role.as_str(),
            user.active as i32,
        ],
    )?;
    expect_affected(affected, "user", &user.id)
}

pub fn set_avatar_path(conn: &Connection, id: &Uuid, path: &str) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE user_profiles SET avatar_path = ?2 WHERE id = ?1",
        params![id.to_string(), path],
    )?;
    expect_affected(affected, "user", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::UserRole;
    use chrono::Utc;

    fn make_user(email: &str) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: "Júlia Ramos".into(),
            role: UserRole::Consultant,
            avatar_path: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn credentials_lookup_is_case_insensitive() {
        let conn = open_memory_database().unwrap();
        let u = make_user("Julia@Clinica.com");
        insert_user(&conn, &u, "hash").unwrap();
        let (found, hash) = get_user_credentials(&conn, " julia@clinica.COM ").unwrap().unwrap();
        assert_eq!(found.id, u.id);
        assert_eq!(found.email, "julia@clinica.com");
        assert_eq!(hash, "hash");
    }

    #[test]
    fn duplicate_email_rejected() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &make_user("a@b.com"), "h").unwrap();
        assert!(insert_user(&conn, &make_user("A@B.com"), "h").is_err());
        assert_eq!(count_users(&conn).unwrap(), 1);
    }

    #[test]
    fn avatar_path_is_recorded() {
        let conn = open_memory_database().unwrap();
        let u = make_user("a@b.com");
        insert_user(&conn, &u, "h").unwrap();
        set_avatar_path(&conn, &u.id, "avatars/x.png").unwrap();
        let loaded = get_user(&conn, &u.id).unwrap().unwrap();
        assert_eq!(loaded.avatar_path.as_deref(), Some("avatars/x.png"));
    }
}
