use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppError;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Migrações em ordem. O índice + 1 é a `user_version` resultante.
const MIGRATIONS: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS users (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        telegram_id  INTEGER NOT NULL UNIQUE,
        first_name   TEXT NOT NULL,
        last_name    TEXT,
        username     TEXT,
        created_at   TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS activities (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content      TEXT NOT NULL,
        date         TEXT NOT NULL,
        created_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_activities_user_date ON activities(user_id, date);",
];

/// A registered Telegram user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    /// `@username`, quando o usuário tem um.
    pub fn handle(&self) -> Option<String> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("@{}", u))
    }
}

/// A logged activity note.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    /// Quando a atividade aconteceu (horário local do usuário).
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub users: i64,
    pub activities: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn init(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self { conn };
        let applied = db.migrate()?;
        if applied > 0 {
            tracing::info!(applied, path, "Database migrated");
        }
        Ok(db)
    }

    /// Applies pending migrations. Returns how many were applied.
    pub fn migrate(&self) -> Result<usize, AppError> {
        let current: usize = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))?
            as usize;

        let pending = MIGRATIONS.iter().enumerate().skip(current);
        let mut applied = 0;
        for (idx, sql) in pending {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", (idx + 1) as i64)?;
            tx.commit()?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn schema_version(&self) -> Result<i64, AppError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Insere o usuário ou atualiza nome/username, devolvendo a linha salva.
    pub fn upsert_user(
        &self,
        telegram_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<User, AppError> {
        let now = Utc::now().format(DATE_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO users (telegram_id, first_name, last_name, username, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(telegram_id) DO UPDATE SET
               first_name = ?2,
               last_name = ?3,
               username = ?4,
               updated_at = ?5",
            params![telegram_id, first_name, last_name, username, now],
        )?;

        self.find_user(telegram_id)?
            .ok_or_else(|| AppError::Validation(format!("user {telegram_id} vanished after upsert")))
    }

    pub fn find_user(&self, telegram_id: i64) -> Result<Option<User>, AppError> {
        let user = self
            .conn
            .query_row(
                "SELECT id, telegram_id, first_name, last_name, username
                 FROM users WHERE telegram_id = ?1",
                params![telegram_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        telegram_id: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        username: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn create_activity(
        &self,
        user_id: i64,
        content: &str,
        date: NaiveDateTime,
    ) -> Result<Activity, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("activity content is empty".into()));
        }

        self.conn.execute(
            "INSERT INTO activities (user_id, content, date) VALUES (?1, ?2, ?3)",
            params![user_id, content, date.format(DATE_FORMAT).to_string()],
        )?;

        Ok(Activity {
            id: self.conn.last_insert_rowid(),
            user_id,
            content: content.to_string(),
            date,
        })
    }

    /// Atividades a partir de `since`, em ordem cronológica.
    pub fn activities_since(
        &self,
        user_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<Activity>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, content, date FROM activities
             WHERE user_id = ?1 AND date >= ?2
             ORDER BY date ASC, id ASC",
        )?;

        let activities = stmt
            .query_map(
                params![user_id, since.format(DATE_FORMAT).to_string()],
                activity_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(activities)
    }

    /// Most recent first.
    pub fn recent_activities(&self, user_id: i64, limit: usize) -> Result<Vec<Activity>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, content, date FROM activities
             WHERE user_id = ?1
             ORDER BY date DESC, id DESC LIMIT ?2",
        )?;

        let activities = stmt
            .query_map(params![user_id, limit as i64], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(activities)
    }

    /// Apaga a última atividade registrada (por ordem de criação).
    pub fn delete_last_activity(&self, user_id: i64) -> Result<Option<Activity>, AppError> {
        let last = self
            .conn
            .query_row(
                "SELECT id, user_id, content, date FROM activities
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
                params![user_id],
                activity_from_row,
            )
            .optional()?;

        if let Some(ref activity) = last {
            self.conn
                .execute("DELETE FROM activities WHERE id = ?1", params![activity.id])?;
        }
        Ok(last)
    }

    pub fn count_activities(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    pub fn stats(&self) -> Result<Stats, AppError> {
        Ok(self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM activities)",
            [],
            |row| {
                Ok(Stats {
                    users: row.get(0)?,
                    activities: row.get(1)?,
                })
            },
        )?)
    }
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let raw: String = row.get(3)?;
    let date = NaiveDateTime::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Activity {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        date,
    })
}
