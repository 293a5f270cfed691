use anyhow::Result;

use crate::models::ObjectRow;
use crate::{Database, OptionalExt};

impl Database {
    /// Store an object. Without `upsert` an existing object at the same
    /// path is a constraint error.
    pub fn put_object(&self, bucket: &str, path: &str, content_type: &str, data: &[u8], upsert: bool) -> Result<()> {
        let sql = if upsert {
            "INSERT OR REPLACE INTO objects (bucket, path, content_type, data) VALUES (?1, ?2, ?3, ?4)"
        } else {
            "INSERT INTO objects (bucket, path, content_type, data) VALUES (?1, ?2, ?3, ?4)"
        };
        self.with_conn(|conn| {
            conn.execute(sql, rusqlite::params![bucket, path, content_type, data])?;
            Ok(())
        })
    }

    pub fn get_object(&self, bucket: &str, path: &str) -> Result<Option<ObjectRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT content_type, data FROM objects WHERE bucket = ?1 AND path = ?2",
                (bucket, path),
                |row| {
                    Ok(ObjectRow {
                        content_type: row.get(0)?,
                        data: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Remove objects by path. Missing paths are skipped. Returns how many
    /// were removed.
    pub fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<usize> {
        self.with_conn(|conn| {
            let mut removed = 0;
            for path in paths {
                removed += conn.execute(
                    "DELETE FROM objects WHERE bucket = ?1 AND path = ?2",
                    (bucket, path),
                )?;
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let db = Database::open_in_memory().unwrap();
        db.put_object("vault", "u/f/v1/a.txt", "text/plain", b"one", false).unwrap();

        let obj = db.get_object("vault", "u/f/v1/a.txt").unwrap().unwrap();
        assert_eq!(obj.content_type, "text/plain");
        assert_eq!(obj.data, b"one");
        assert!(db.get_object("other", "u/f/v1/a.txt").unwrap().is_none());

        assert!(db.put_object("vault", "u/f/v1/a.txt", "text/plain", b"two", false).is_err());
        db.put_object("vault", "u/f/v1/a.txt", "text/plain", b"two", true).unwrap();
        assert_eq!(db.get_object("vault", "u/f/v1/a.txt").unwrap().unwrap().data, b"two");

        let removed = db
            .remove_objects("vault", &["u/f/v1/a.txt".into(), "missing".into()])
            .unwrap();
        assert_eq!(removed, 1);
    }
}
