use rusqlite::{Connection, params};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::aggregator::ValueSource;
use crate::models::client::{Client, ClientListQuery};
use crate::models::exercise::Exercise;
use crate::models::metrics::{MetricDefinition, MetricPreference, ValuePoint};
use crate::models::user::User;

/// Current UTC timestamp in the store's canonical text form.
pub fn now_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Failure phase of the preference replace. The delete-then-insert is not
/// atomic: a failed insert after a successful delete leaves the client with
/// zero preferences, which downstream resolves as the alphabetical fallback.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceWriteError {
    #[error("failed to delete existing preferences: {0}")]
    DeleteFailed(#[source] rusqlite::Error),
    #[error("failed to insert new preferences: {0}")]
    InsertFailed(#[source] rusqlite::Error),
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

            CREATE TABLE IF NOT EXISTS clients (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                first_name  TEXT NOT NULL DEFAULT '',
                last_name   TEXT NOT NULL DEFAULT '',
                email       TEXT NOT NULL DEFAULT '',
                client_type TEXT NOT NULL DEFAULT 'Online',
                status      TEXT NOT NULL DEFAULT 'Connected',
                avatar_url  TEXT,
                assigned_to TEXT,
                last_training_completion     REAL,
                last_training_30d_completion REAL,
                last_task_completion         REAL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            CREATE INDEX IF NOT EXISTS idx_clients_user ON clients(user_id);

            CREATE TABLE IF NOT EXISTS metric_definitions (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                unit TEXT
            );

            CREATE TABLE IF NOT EXISTS client_metric_preferences (
                client_id     TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                metric_id     INTEGER NOT NULL,
                display_order INTEGER NOT NULL,
                is_visible    INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (client_id, metric_id)
            );

            CREATE TABLE IF NOT EXISTS client_metrics (
                id          TEXT PRIMARY KEY,
                client_id   TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                metric_id   INTEGER NOT NULL,
                value       REAL NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_client_metrics_series
                ON client_metrics(client_id, metric_id, recorded_at);

            CREATE TABLE IF NOT EXISTS exercises (
                id                TEXT PRIMARY KEY,
                user_id           TEXT REFERENCES users(id) ON DELETE CASCADE,
                name              TEXT NOT NULL,
                target_muscles    TEXT NOT NULL DEFAULT '[]',
                secondary_muscles TEXT NOT NULL DEFAULT '[]',
                body_parts        TEXT NOT NULL DEFAULT '[]',
                equipments        TEXT NOT NULL DEFAULT '[]',
                instructions      TEXT NOT NULL DEFAULT '[]',
                gif_filename      TEXT,
                video_url         TEXT,
                video_platform    TEXT,
                status            TEXT NOT NULL DEFAULT 'active',
                is_custom         INTEGER NOT NULL DEFAULT 0,
                is_private        INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                updated_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            CREATE INDEX IF NOT EXISTS idx_exercises_user ON exercises(user_id);

            INSERT OR IGNORE INTO metric_definitions (id, name, unit) VALUES
                (1, 'Weight', 'kg'),
                (2, 'Body Fat %', '%'),
                (3, 'Muscle Mass', 'kg'),
                (4, 'Waist', 'cm'),
                (5, 'Resting Heart Rate', 'bpm'),
                (6, 'Sleep', 'h');
            ",
        )?;
        Ok(())
    }

    // ── User operations ──

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
            params![id, email, password_hash],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
        )?;
        let mut rows = stmt.query_map(params![email], |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    // ── Session operations ──

    pub fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: &str,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token_hash, user_id, expires_at],
        )?;
        Ok(())
    }

    /// Resolve a session token hash to its user, ignoring expired sessions.
    pub fn session_user(&self, token_hash: &str, now: &str) -> anyhow::Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.email, u.password_hash, u.created_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?1 AND s.expires_at > ?2",
        )?;
        let mut rows = stmt.query_map(params![token_hash, now], |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn delete_session(&self, token_hash: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(count > 0)
    }

    // ── Client operations ──

    pub fn list_clients(
        &self,
        user_id: &str,
        query: &ClientListQuery,
    ) -> anyhow::Result<Vec<Client>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = "SELECT id, user_id, name, first_name, last_name, email, client_type, \
                       status, avatar_url, assigned_to, last_training_completion, \
                       last_training_30d_completion, last_task_completion, created_at, updated_at \
                       FROM clients WHERE user_id = ?1"
            .to_string();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(user_id.to_string())];

        if let Some(category) = query.category.as_deref().filter(|c| *c != "all") {
            sql.push_str(&format!(" AND client_type = ?{}", param_values.len() + 1));
            param_values.push(Box::new(category.to_string()));
        }
        if let Some(status) = query.status.as_deref().filter(|s| *s != "all") {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.to_string()));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            sql.push_str(&format!(" AND name LIKE ?{}", param_values.len() + 1));
            param_values.push(Box::new(format!("%{search}%")));
        }

        // Sort column is interpolated into the SQL text, so it goes through a
        // whitelist rather than the caller's string.
        let sort_col = match query.sort_by.as_deref() {
            Some("name") => "name",
            Some("created_at") => "created_at",
            Some("status") => "status",
            Some("client_type") => "client_type",
            _ => "updated_at",
        };
        let direction = if query.order.as_deref() == Some("asc") {
            "ASC"
        } else {
            "DESC"
        };
        sql.push_str(&format!(" ORDER BY {sort_col} {direction}"));

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(Client {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    first_name: row.get(3)?,
                    last_name: row.get(4)?,
                    email: row.get(5)?,
                    client_type: row.get(6)?,
                    status: row.get(7)?,
                    avatar_url: row.get(8)?,
                    assigned_to: row.get(9)?,
                    last_training_completion: row.get(10)?,
                    last_training_30d_completion: row.get(11)?,
                    last_task_completion: row.get(12)?,
                    created_at: row.get(13)?,
                    updated_at: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_client(&self, id: &str, user_id: &str) -> anyhow::Result<Option<Client>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, first_name, last_name, email, client_type, \
             status, avatar_url, assigned_to, last_training_completion, \
             last_training_30d_completion, last_task_completion, created_at, updated_at \
             FROM clients WHERE id = ?1 AND user_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![id, user_id], |row| {
            Ok(Client {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
                email: row.get(5)?,
                client_type: row.get(6)?,
                status: row.get(7)?,
                avatar_url: row.get(8)?,
                assigned_to: row.get(9)?,
                last_training_completion: row.get(10)?,
                last_training_30d_completion: row.get(11)?,
                last_task_completion: row.get(12)?,
                created_at: row.get(13)?,
                updated_at: row.get(14)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    /// Ownership check used before any client-scoped read or write.
    pub fn client_owned_by(&self, id: &str, user_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT 1 FROM clients WHERE id = ?1 AND user_id = ?2")?;
        Ok(stmt.exists(params![id, user_id])?)
    }

    pub fn create_client(&self, client: &Client) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO clients (id, user_id, name, first_name, last_name, email, client_type, \
             status, avatar_url, assigned_to, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                client.id,
                client.user_id,
                client.name,
                client.first_name,
                client.last_name,
                client.email,
                client.client_type,
                client.status,
                client.avatar_url,
                client.assigned_to,
                client.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_client(&self, client: &Client) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE clients SET name = ?3, first_name = ?4, last_name = ?5, email = ?6, \
             client_type = ?7, status = ?8, avatar_url = ?9, assigned_to = ?10, \
             updated_at = ?11 WHERE id = ?1 AND user_id = ?2",
            params![
                client.id,
                client.user_id,
                client.name,
                client.first_name,
                client.last_name,
                client.email,
                client.client_type,
                client.status,
                client.avatar_url,
                client.assigned_to,
                client.updated_at,
            ],
        )?;
        Ok(count > 0)
    }

    pub fn delete_client(&self, id: &str, user_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM clients WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(count > 0)
    }

    // ── Metric catalog ──

    pub fn list_metric_definitions(&self) -> anyhow::Result<Vec<MetricDefinition>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name, unit FROM metric_definitions")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MetricDefinition {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    unit: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Metric preference operations ──

    pub fn list_preferences(&self, client_id: &str) -> anyhow::Result<Vec<MetricPreference>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT metric_id, display_order, is_visible FROM client_metric_preferences \
             WHERE client_id = ?1 ORDER BY display_order",
        )?;
        let rows = stmt
            .query_map(params![client_id], |row| {
                Ok(MetricPreference {
                    metric_id: row.get(0)?,
                    display_order: row.get(1)?,
                    is_visible: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace a client's preference set wholesale: delete everything, then
    /// insert the new rows. The two phases are not wrapped in one
    /// transaction; a failed insert after the delete leaves zero
    /// preferences. Last writer wins between concurrent savers for the
    /// same client.
    pub fn replace_preferences(
        &self,
        client_id: &str,
        rows: &[MetricPreference],
    ) -> Result<(), PreferenceWriteError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM client_metric_preferences WHERE client_id = ?1",
            params![client_id],
        )
        .map_err(PreferenceWriteError::DeleteFailed)?;

        if rows.is_empty() {
            return Ok(());
        }

        // single multi-row statement: the insert phase is all-or-nothing
        let mut sql = "INSERT INTO client_metric_preferences \
                       (client_id, metric_id, display_order, is_visible) VALUES "
            .to_string();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let base = i * 4;
            sql.push_str(&format!(
                "(?{}, ?{}, ?{}, ?{})",
                base + 1,
                base + 2,
                base + 3,
                base + 4
            ));
            param_values.push(Box::new(client_id.to_string()));
            param_values.push(Box::new(row.metric_id));
            param_values.push(Box::new(row.display_order));
            param_values.push(Box::new(row.is_visible));
        }
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_ref.as_slice())
            .map_err(PreferenceWriteError::InsertFailed)?;
        Ok(())
    }

    // ── Metric value operations ──

    pub fn insert_value(
        &self,
        id: &str,
        client_id: &str,
        metric_id: i64,
        value: f64,
        recorded_at: &str,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO client_metrics (id, client_id, metric_id, value, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, client_id, metric_id, value, recorded_at],
        )?;
        Ok(())
    }

    pub fn latest_value(
        &self,
        client_id: &str,
        metric_id: i64,
    ) -> anyhow::Result<Option<ValuePoint>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT value, recorded_at FROM client_metrics \
             WHERE client_id = ?1 AND metric_id = ?2 ORDER BY recorded_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![client_id, metric_id], |row| {
            Ok(ValuePoint {
                value: row.get(0)?,
                recorded_at: row.get(1)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_values(&self, client_id: &str, metric_id: i64) -> anyhow::Result<Vec<ValuePoint>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT value, recorded_at FROM client_metrics \
             WHERE client_id = ?1 AND metric_id = ?2 ORDER BY recorded_at ASC",
        )?;
        let rows = stmt
            .query_map(params![client_id, metric_id], |row| {
                Ok(ValuePoint {
                    value: row.get(0)?,
                    recorded_at: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Exercise operations ──

    pub fn list_exercises(&self, user_id: &str) -> anyhow::Result<Vec<Exercise>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, target_muscles, secondary_muscles, body_parts, \
             equipments, instructions, gif_filename, video_url, video_platform, status, \
             is_custom, is_private, created_at, updated_at \
             FROM exercises WHERE user_id IS NULL OR user_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(Exercise {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    target_muscles: json_list(&row.get::<_, String>(3)?),
                    secondary_muscles: json_list(&row.get::<_, String>(4)?),
                    body_parts: json_list(&row.get::<_, String>(5)?),
                    equipments: json_list(&row.get::<_, String>(6)?),
                    instructions: json_list(&row.get::<_, String>(7)?),
                    gif_filename: row.get(8)?,
                    video_url: row.get(9)?,
                    video_platform: row.get(10)?,
                    status: row.get(11)?,
                    is_custom: row.get(12)?,
                    is_private: row.get(13)?,
                    created_at: row.get(14)?,
                    updated_at: row.get(15)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_exercise(&self, id: &str, user_id: &str) -> anyhow::Result<Option<Exercise>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, target_muscles, secondary_muscles, body_parts, \
             equipments, instructions, gif_filename, video_url, video_platform, status, \
             is_custom, is_private, created_at, updated_at \
             FROM exercises WHERE id = ?1 AND (user_id IS NULL OR user_id = ?2)",
        )?;
        let mut rows = stmt.query_map(params![id, user_id], |row| {
            Ok(Exercise {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                target_muscles: json_list(&row.get::<_, String>(3)?),
                secondary_muscles: json_list(&row.get::<_, String>(4)?),
                body_parts: json_list(&row.get::<_, String>(5)?),
                equipments: json_list(&row.get::<_, String>(6)?),
                instructions: json_list(&row.get::<_, String>(7)?),
                gif_filename: row.get(8)?,
                video_url: row.get(9)?,
                video_platform: row.get(10)?,
                status: row.get(11)?,
                is_custom: row.get(12)?,
                is_private: row.get(13)?,
                created_at: row.get(14)?,
                updated_at: row.get(15)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn create_exercise(&self, exercise: &Exercise) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO exercises (id, user_id, name, target_muscles, secondary_muscles, \
             body_parts, equipments, instructions, gif_filename, video_url, video_platform, \
             status, is_custom, is_private, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                exercise.id,
                exercise.user_id,
                exercise.name,
                serde_json::to_string(&exercise.target_muscles)?,
                serde_json::to_string(&exercise.secondary_muscles)?,
                serde_json::to_string(&exercise.body_parts)?,
                serde_json::to_string(&exercise.equipments)?,
                serde_json::to_string(&exercise.instructions)?,
                exercise.gif_filename,
                exercise.video_url,
                exercise.video_platform,
                exercise.status,
                exercise.is_custom,
                exercise.is_private,
                exercise.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Updates apply only to the caller's own custom rows; catalog rows
    /// (NULL user_id) never match the equality filter.
    pub fn update_exercise(&self, exercise: &Exercise) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE exercises SET name = ?3, target_muscles = ?4, secondary_muscles = ?5, \
             body_parts = ?6, equipments = ?7, instructions = ?8, gif_filename = ?9, \
             video_url = ?10, video_platform = ?11, status = ?12, is_private = ?13, \
             updated_at = ?14 WHERE id = ?1 AND user_id = ?2",
            params![
                exercise.id,
                exercise.user_id,
                exercise.name,
                serde_json::to_string(&exercise.target_muscles)?,
                serde_json::to_string(&exercise.secondary_muscles)?,
                serde_json::to_string(&exercise.body_parts)?,
                serde_json::to_string(&exercise.equipments)?,
                serde_json::to_string(&exercise.instructions)?,
                exercise.gif_filename,
                exercise.video_url,
                exercise.video_platform,
                exercise.status,
                exercise.is_private,
                exercise.updated_at,
            ],
        )?;
        Ok(count > 0)
    }

    pub fn delete_exercise(&self, id: &str, user_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM exercises WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(count > 0)
    }
}

fn json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[async_trait]
impl ValueSource for Store {
    async fn latest_value(
        &self,
        client_id: &str,
        metric_id: i64,
    ) -> anyhow::Result<Option<ValuePoint>> {
        Store::latest_value(self, client_id, metric_id)
    }

    async fn series(&self, client_id: &str, metric_id: i64) -> anyhow::Result<Vec<ValuePoint>> {
        Store::list_values(self, client_id, metric_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_metrics;

    fn test_store() -> Store {
        Store::open(":memory:").unwrap()
    }

    fn seed_client(store: &Store, user_id: &str, client_id: &str) {
        store.create_user(user_id, &format!("{user_id}@example.com"), "x").unwrap();
        store
            .create_client(&Client {
                id: client_id.to_string(),
                user_id: user_id.to_string(),
                name: "Jamie Doe".to_string(),
                first_name: "Jamie".to_string(),
                last_name: "Doe".to_string(),
                email: String::new(),
                client_type: "Online".to_string(),
                status: "Connected".to_string(),
                avatar_url: None,
                assigned_to: None,
                last_training_completion: None,
                last_training_30d_completion: None,
                last_task_completion: None,
                created_at: now_utc(),
                updated_at: now_utc(),
            })
            .unwrap();
    }

    fn pref(metric_id: i64, display_order: i64, is_visible: bool) -> MetricPreference {
        MetricPreference {
            metric_id,
            display_order,
            is_visible,
        }
    }

    #[test]
    fn migrations_seed_the_metric_catalog() {
        let store = test_store();
        let defs = store.list_metric_definitions().unwrap();
        assert!(defs.iter().any(|d| d.name == "Weight"));
        assert!(defs.iter().any(|d| d.name == "Body Fat %"));
    }

    #[test]
    fn replace_preferences_round_trips_through_the_resolver() {
        let store = test_store();
        seed_client(&store, "u1", "c1");

        let saved = vec![pref(2, 0, true), pref(1, 1, true), pref(3, 2, false)];
        store.replace_preferences("c1", &saved).unwrap();

        let defs = store.list_metric_definitions().unwrap();
        let read_back = store.list_preferences("c1").unwrap();
        let resolved = resolve_metrics(&defs, &read_back);

        let ids: Vec<i64> = resolved.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn replace_preferences_is_idempotent() {
        let store = test_store();
        seed_client(&store, "u1", "c1");

        let rows = vec![pref(1, 0, true), pref(2, 1, false)];
        store.replace_preferences("c1", &rows).unwrap();
        store.replace_preferences("c1", &rows).unwrap();

        let read_back = store.list_preferences("c1").unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].metric_id, 1);
        assert!(!read_back[1].is_visible);
    }

    #[test]
    fn replace_preferences_with_empty_set_clears() {
        let store = test_store();
        seed_client(&store, "u1", "c1");

        store.replace_preferences("c1", &[pref(1, 0, true)]).unwrap();
        store.replace_preferences("c1", &[]).unwrap();
        assert!(store.list_preferences("c1").unwrap().is_empty());
    }

    #[test]
    fn duplicate_metric_rows_fail_the_insert_phase() {
        let store = test_store();
        seed_client(&store, "u1", "c1");

        let rows = vec![pref(1, 0, true), pref(1, 1, true)];
        let err = store.replace_preferences("c1", &rows).unwrap_err();
        assert!(matches!(err, PreferenceWriteError::InsertFailed(_)));
        // delete already ran: the client degrades to the no-preference state
        assert!(store.list_preferences("c1").unwrap().is_empty());
    }

    #[test]
    fn preferences_are_scoped_per_client() {
        let store = test_store();
        seed_client(&store, "u1", "c1");
        seed_client(&store, "u2", "c2");

        store.replace_preferences("c1", &[pref(1, 0, true)]).unwrap();
        store.replace_preferences("c2", &[pref(2, 0, true)]).unwrap();

        assert_eq!(store.list_preferences("c1").unwrap()[0].metric_id, 1);
        assert_eq!(store.list_preferences("c2").unwrap()[0].metric_id, 2);
    }

    #[test]
    fn value_reads_order_by_recorded_at() {
        let store = test_store();
        seed_client(&store, "u1", "c1");

        store.insert_value("v2", "c1", 1, 140.0, "2024-02-01T00:00:00Z").unwrap();
        store.insert_value("v1", "c1", 1, 150.0, "2024-01-01T00:00:00Z").unwrap();

        let series = store.list_values("c1", 1).unwrap();
        assert_eq!(series[0].value, 150.0);
        assert_eq!(series[1].value, 140.0);

        let latest = store.latest_value("c1", 1).unwrap().unwrap();
        assert_eq!(latest.value, 140.0);
    }

    #[test]
    fn clients_are_invisible_to_other_users() {
        let store = test_store();
        seed_client(&store, "u1", "c1");
        store.create_user("u2", "u2@example.com", "x").unwrap();

        assert!(store.client_owned_by("c1", "u1").unwrap());
        assert!(!store.client_owned_by("c1", "u2").unwrap());
        assert!(store.get_client("c1", "u2").unwrap().is_none());
        assert!(!store.delete_client("c1", "u2").unwrap());
    }

    #[test]
    fn deleting_a_client_cascades_to_its_data() {
        let store = test_store();
        seed_client(&store, "u1", "c1");
        store.replace_preferences("c1", &[pref(1, 0, true)]).unwrap();
        store.insert_value("v1", "c1", 1, 80.0, "2024-01-01T00:00:00Z").unwrap();

        assert!(store.delete_client("c1", "u1").unwrap());
        assert!(store.list_preferences("c1").unwrap().is_empty());
        assert!(store.list_values("c1", 1).unwrap().is_empty());
    }

    #[test]
    fn sessions_expire() {
        let store = test_store();
        store.create_user("u1", "u1@example.com", "x").unwrap();
        store.create_session("hash1", "u1", "2099-01-01T00:00:00Z").unwrap();
        store.create_session("hash2", "u1", "2000-01-01T00:00:00Z").unwrap();

        let now = now_utc();
        assert!(store.session_user("hash1", &now).unwrap().is_some());
        assert!(store.session_user("hash2", &now).unwrap().is_none());
        assert!(store.delete_session("hash1").unwrap());
        assert!(store.session_user("hash1", &now).unwrap().is_none());
    }

    #[test]
    fn exercise_merge_scopes_custom_rows_to_their_owner() {
        let store = test_store();
        store.create_user("u1", "u1@example.com", "x").unwrap();
        store.create_user("u2", "u2@example.com", "x").unwrap();

        let base = Exercise {
            id: "e-global".to_string(),
            user_id: None,
            name: "Back Squat".to_string(),
            target_muscles: vec!["quads".to_string()],
            secondary_muscles: vec![],
            body_parts: vec!["legs".to_string()],
            equipments: vec!["barbell".to_string()],
            instructions: vec![],
            gif_filename: None,
            video_url: None,
            video_platform: None,
            status: "active".to_string(),
            is_custom: false,
            is_private: false,
            created_at: now_utc(),
            updated_at: now_utc(),
        };
        store.create_exercise(&base).unwrap();
        store
            .create_exercise(&Exercise {
                id: "e-custom".to_string(),
                user_id: Some("u1".to_string()),
                name: "Tempo Squat".to_string(),
                is_custom: true,
                ..base.clone()
            })
            .unwrap();

        let u1_rows = store.list_exercises("u1").unwrap();
        let u2_rows = store.list_exercises("u2").unwrap();
        assert_eq!(u1_rows.len(), 2);
        assert_eq!(u2_rows.len(), 1);
        assert_eq!(u2_rows[0].id, "e-global");

        // catalog rows are not mutable through the owner-scoped paths
        assert!(!store.delete_exercise("e-global", "u1").unwrap());
        assert!(store.delete_exercise("e-custom", "u1").unwrap());
    }
}
