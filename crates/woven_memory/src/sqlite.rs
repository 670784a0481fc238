use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;
use woven_core::{StoryRecord, StoryRecorder, TurnRecord};

/// SQLite-backed story log: one row per story, one row per committed turn.
///
/// Writes arrive from background tasks in no guaranteed order, so `turns`
/// carries no foreign key to `stories`.
#[derive(Clone)]
pub struct SqliteRecorder {
    pool: Pool<Sqlite>,
}

impl SqliteRecorder {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let recorder = Self { pool };
        recorder.migrate().await?;
        Ok(recorder)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stories (
                story_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                genre TEXT NOT NULL,
                total_turns INTEGER NOT NULL,
                start_time INTEGER NOT NULL,
                research_email TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create stories table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                story_id TEXT NOT NULL,
                turn_number INTEGER NOT NULL,
                character_mood TEXT NOT NULL,
                user_mood TEXT NOT NULL,
                story_summary TEXT NOT NULL,
                question TEXT NOT NULL,
                preferences TEXT NOT NULL,
                story_phase TEXT NOT NULL,
                is_final INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create turns table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_story ON turns(story_id, turn_number)")
            .execute(&self.pool)
            .await
            .context("Failed to create turns index")?;

        Ok(())
    }

    pub async fn load_story(&self, story_id: Uuid) -> Result<Option<StoryRecord>> {
        let row = sqlx::query(
            "SELECT story_id, name, genre, total_turns, start_time, research_email \
             FROM stories WHERE story_id = ?",
        )
        .bind(story_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query stories")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let total_turns: i64 = row.get("total_turns");
        Ok(Some(StoryRecord {
            story_id,
            name: row.get("name"),
            genre: row.get("genre"),
            total_turns: total_turns as usize,
            start_time: row.get("start_time"),
            research_email: row.get("research_email"),
        }))
    }

    /// All turns of a story, oldest first.
    pub async fn load_turns(&self, story_id: Uuid) -> Result<Vec<TurnRecord>> {
        let rows = sqlx::query(
            "SELECT turn_number, character_mood, user_mood, story_summary, question, \
                    preferences, story_phase, is_final, timestamp \
             FROM turns WHERE story_id = ? ORDER BY turn_number ASC",
        )
        .bind(story_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to query turns")?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let turn_number: i64 = row.get("turn_number");
            turns.push(TurnRecord {
                story_id,
                turn_number: turn_number as usize,
                character_mood: row.get("character_mood"),
                user_mood: row.get("user_mood"),
                story_summary: row.get("story_summary"),
                question: row.get("question"),
                preferences: row.get("preferences"),
                story_phase: row.get("story_phase"),
                is_final: row.get("is_final"),
                timestamp: row.get("timestamp"),
            });
        }
        Ok(turns)
    }
}

#[async_trait]
impl StoryRecorder for SqliteRecorder {
    async fn record_story(&self, story: &StoryRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO stories (story_id, name, genre, total_turns, start_time, research_email) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(story_id) DO NOTHING",
        )
        .bind(story.story_id.to_string())
        .bind(&story.name)
        .bind(&story.genre)
        .bind(story.total_turns as i64)
        .bind(story.start_time)
        .bind(&story.research_email)
        .execute(&self.pool)
        .await
        .context("Failed to insert story")?;

        tracing::debug!("Story {} recorded", story.story_id);
        Ok(())
    }

    async fn record_turn(&self, turn: &TurnRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO turns (story_id, turn_number, character_mood, user_mood, story_summary, \
                                question, preferences, story_phase, is_final, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(turn.story_id.to_string())
        .bind(turn.turn_number as i64)
        .bind(&turn.character_mood)
        .bind(&turn.user_mood)
        .bind(&turn.story_summary)
        .bind(&turn.question)
        .bind(&turn.preferences)
        .bind(&turn.story_phase)
        .bind(turn.is_final)
        .bind(turn.timestamp)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert turn {}", turn.turn_number))?;

        tracing::trace!("Turn {} of story {} recorded", turn.turn_number, turn.story_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story() -> StoryRecord {
        StoryRecord {
            story_id: Uuid::new_v4(),
            name: "Ada".into(),
            genre: "fantasy".into(),
            total_turns: 10,
            start_time: 1_700_000_000,
            research_email: None,
        }
    }

    fn turn(story_id: Uuid, n: usize) -> TurnRecord {
        TurnRecord {
            story_id,
            turn_number: n,
            character_mood: "trust".into(),
            user_mood: "joy".into(),
            story_summary: format!("turn {n}"),
            question: "Next?".into(),
            preferences: r#"{"risk_taker":1}"#.into(),
            story_phase: "beginning".into(),
            is_final: n == 9,
            timestamp: 1_700_000_100 + n as i64,
        }
    }

    #[tokio::test]
    async fn test_story_and_turns_roundtrip() {
        let db = SqliteRecorder::new(":memory:").await.expect("Failed to create recorder");
        let s = story();
        db.record_story(&s).await.unwrap();
        // turns arrive out of order from background tasks
        db.record_turn(&turn(s.story_id, 1)).await.unwrap();
        db.record_turn(&turn(s.story_id, 0)).await.unwrap();
        db.record_turn(&turn(s.story_id, 9)).await.unwrap();

        assert_eq!(db.load_story(s.story_id).await.unwrap(), Some(s.clone()));

        let turns = db.load_turns(s.story_id).await.unwrap();
        assert_eq!(turns.iter().map(|t| t.turn_number).collect::<Vec<_>>(), vec![0, 1, 9]);
        assert_eq!(turns[2], turn(s.story_id, 9));
        assert!(turns[2].is_final);
    }

    #[tokio::test]
    async fn test_duplicate_story_is_ignored() {
        let db = SqliteRecorder::new(":memory:").await.unwrap();
        let s = story();
        db.record_story(&s).await.unwrap();

        let mut renamed = s.clone();
        renamed.name = "Someone else".into();
        db.record_story(&renamed).await.unwrap();

        assert_eq!(db.load_story(s.story_id).await.unwrap().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_turn_may_arrive_before_story() {
        let db = SqliteRecorder::new(":memory:").await.unwrap();
        let s = story();
        db.record_turn(&turn(s.story_id, 0)).await.unwrap();
        db.record_story(&s).await.unwrap();
        assert_eq!(db.load_turns(s.story_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_story_loads_nothing() {
        let db = SqliteRecorder::new(":memory:").await.unwrap();
        let id = Uuid::new_v4();
        assert!(db.load_story(id).await.unwrap().is_none());
        assert!(db.load_turns(id).await.unwrap().is_empty());
    }
}
