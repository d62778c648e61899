//! SQLite-backed course store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CourseStore, NewCourse, StorageError, StoredCourse, StoredModule};
use crate::models::CourseCategory;

/// SQLite implementation of [`CourseStore`]
///
/// Modules and lessons are kept as one JSON column; courses are only ever
/// read and written whole. Queries run on the blocking thread pool.
pub struct SqliteCourseStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCourseStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite course store initialized");
        Ok(store)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Run `f` against the connection off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&conn)
        })
        .await?
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS courses (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    category TEXT NOT NULL,
                    modules TEXT NOT NULL,
                    published INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_courses_category
                    ON courses(category);
                "#,
        )?;
        Ok(())
    }
}

struct CourseRow {
    id: String,
    title: String,
    category: String,
    modules: String,
    published: bool,
    created_at: String,
}

impl CourseRow {
    fn into_course(self) -> Result<StoredCourse, StorageError> {
        let category = CourseCategory::parse(&self.category).ok_or_else(|| StorageError::Corrupt {
            id: self.id.clone(),
            reason: format!("unknown category {:?}", self.category),
        })?;

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StorageError::Corrupt {
                id: self.id.clone(),
                reason: format!("bad created_at: {e}"),
            })?
            .with_timezone(&Utc);

        let modules: Vec<StoredModule> = serde_json::from_str(&self.modules)?;

        Ok(StoredCourse {
            id: self.id,
            title: self.title,
            category,
            modules,
            published: self.published,
            created_at,
        })
    }
}

#[async_trait]
impl CourseStore for SqliteCourseStore {
    async fn save(&self, course: NewCourse) -> Result<StoredCourse, StorageError> {
        let stored = StoredCourse::from_new(course);
        let modules = serde_json::to_string(&stored.modules)?;

        let row = (
            stored.id.clone(),
            stored.title.clone(),
            stored.category.as_str(),
            stored.published,
            stored.created_at.to_rfc3339(),
        );
        self.with_conn(move |conn| {
            let (id, title, category, published, created_at) = row;
            conn.execute(
                "INSERT INTO courses (id, title, category, modules, published, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, title, category, modules, published, created_at],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(id = %stored.id, title = %stored.title, "Saved course");
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredCourse>, StorageError> {
        let id = id.to_string();
        let row = self
            .with_conn(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, title, category, modules, published, created_at
                         FROM courses WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(CourseRow {
                                id: row.get(0)?,
                                title: row.get(1)?,
                                category: row.get(2)?,
                                modules: row.get(3)?,
                                published: row.get(4)?,
                                created_at: row.get(5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(CourseRow::into_course).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM courses WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn count(&self) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
