use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use pdfrag_core::PageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InQueue,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InQueue => "in_queue",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "in_queue" => Some(JobStatus::InQueue),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn can_transition(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::InQueue, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub kb_name: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct ServiceDb {
    path: PathBuf,
}

impl ServiceDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
        };
        db.init()?;
        Ok(db)
    }

    fn connection(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    pub fn init(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                kb_name TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS processed_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                page_hash TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                tagged_text TEXT NOT NULL,
                markdown_text TEXT NOT NULL,
                image BLOB,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_pages_document ON processed_pages(document_id);
            "#,
        )?;
        Ok(())
    }

    pub fn add_job(&self, job_id: &str, kb_name: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO jobs (job_id, status, kb_name) VALUES (?1, ?2, ?3)",
            params![job_id, JobStatus::InQueue.as_str(), kb_name],
        )?;
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT job_id, status, kb_name, created_at FROM jobs WHERE job_id = ?1",
        )?;
        let row = stmt
            .query_row([job_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;
        match row {
            Some((job_id, status, kb_name, created_at)) => {
                let status = JobStatus::from_str(&status)
                    .ok_or_else(|| anyhow!("unknown job status {status}"))?;
                Ok(Some(JobRecord {
                    job_id,
                    status,
                    kb_name,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT job_id, status, kb_name, created_at FROM jobs ORDER BY created_at DESC, job_id",
        )?;
        let mut rows = stmt.query([])?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next()? {
            let status: String = row.get(1)?;
            let status = JobStatus::from_str(&status)
                .ok_or_else(|| anyhow!("unknown job status {status}"))?;
            jobs.push(JobRecord {
                job_id: row.get(0)?,
                status,
                kb_name: row.get(2)?,
                created_at: row.get(3)?,
            });
        }
        Ok(jobs)
    }

    pub fn update_job_status(&self, job_id: &str, next: JobStatus) -> Result<()> {
        let current = self
            .get_job(job_id)?
            .ok_or_else(|| anyhow!("unknown job {job_id}"))?;
        if !current.status.can_transition(next) {
            return Err(anyhow!(
                "invalid job transition {} -> {} for job {job_id}",
                current.status.as_str(),
                next.as_str()
            ));
        }
        let conn = self.connection()?;
        conn.execute(
            "UPDATE jobs SET status = ?1 WHERE job_id = ?2",
            params![next.as_str(), job_id],
        )?;
        Ok(())
    }

    pub fn add_pages(&self, pages: &[PageRecord]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        for page in pages {
            tx.execute(
                "INSERT INTO processed_pages (document_id, page_hash, page_number, tagged_text, markdown_text, image) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    page.document_id,
                    page.page_hash,
                    page.page_number,
                    page.tagged,
                    page.markdown,
                    page.image_png,
                ],
            )?;
        }
        tx.commit()?;
        Ok(pages.len())
    }

    pub fn pages_for_document(&self, document_id: &str) -> Result<Vec<(u32, String, String)>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT page_number, tagged_text, markdown_text FROM processed_pages WHERE document_id = ?1 ORDER BY page_number",
        )?;
        let mut rows = stmt.query([document_id])?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push((row.get(0)?, row.get(1)?, row.get(2)?));
        }
        Ok(pages)
    }
}
