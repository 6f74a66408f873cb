#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
mod memory;

use alloc::{string::String, vec::Vec};
use core::future::Future;
use tokio_postgres::{error::SqlState, types::ToSql};

pub use futures_util::{TryStream, TryStreamExt};
pub use memory::Memory;
pub use model::{policy, Choice, ChoiceId, DateTime, Poll, PollId, TimeDelta, Utc};
pub use tokio_postgres::{tls::NoTls, Client, Config};

/// Maximum number of polls returned by [`Store::list_visible_polls`].
pub const LATEST_POLL_LIMIT: usize = 5;

/// Storage collaborator of the request handlers.
///
/// The read operations are the only query shapes the handlers depend on. The administrative
/// operations exist so that polls can be seeded at all; no handler calls them.
pub trait Store: Send + Sync {
    /// Returns the latest [`LATEST_POLL_LIMIT`] polls that are visible at `now`, newest first.
    fn list_visible_polls(&self, now: DateTime<Utc>) -> impl Future<Output = error::Result<Vec<Poll>>> + Send;

    /// Looks up a poll that is visible at `now`. Unknown and unpublished polls are both [`error::Error::NotFound`].
    fn get_visible_poll(&self, id: PollId, now: DateTime<Utc>) -> impl Future<Output = error::Result<Poll>> + Send;

    /// Looks up a poll regardless of its publication date.
    fn get_poll(&self, id: PollId) -> impl Future<Output = error::Result<Poll>> + Send;

    /// Returns every choice owned by the poll in creation order.
    fn get_choices(&self, poll: PollId) -> impl Future<Output = error::Result<Vec<Choice>>> + Send;

    /// Looks up a choice only among those owned by `poll`.
    fn get_choice(&self, poll: PollId, choice: ChoiceId) -> impl Future<Output = error::Result<Choice>> + Send;

    /// Atomically adds one vote to the choice. Returns the new tally.
    fn increment_vote(&self, choice: ChoiceId) -> impl Future<Output = error::Result<u32>> + Send;

    fn create_poll(&self, question: &str, publish_at: DateTime<Utc>)
        -> impl Future<Output = error::Result<PollId>> + Send;

    fn add_choice(&self, poll: PollId, text: &str) -> impl Future<Output = error::Result<ChoiceId>> + Send;

    /// Deletes the poll along with all of its choices.
    fn delete_poll(&self, id: PollId) -> impl Future<Output = error::Result<()>> + Send;
}

fn validate_question(question: &str) -> error::Result<()> {
    if question.is_empty() || !model::is_acceptable_text(question) {
        return Err(error::Error::BadInput);
    }
    Ok(())
}

fn validate_choice_text(text: &str) -> error::Result<()> {
    if model::is_acceptable_text(text) {
        Ok(())
    } else {
        Err(error::Error::BadInput)
    }
}

/// Idempotent schema installed by [`Database::migrate`].
pub const SCHEMA: &str = include_str!("../schema.sql");

pub struct Database(Client);

impl From<Client> for Database {
    fn from(client: Client) -> Self {
        Self(client)
    }
}

fn fatal(err: tokio_postgres::Error) -> error::Error {
    log::error!("unexpected database error: {err}");
    error::Error::Fatal
}

fn deserialize_poll_from_row(row: &tokio_postgres::Row) -> error::Result<Poll> {
    let id: i32 = row.try_get("id").map_err(fatal)?;
    let id = PollId::new(id).ok_or(error::Error::Fatal)?;
    let question: String = row.try_get("question").map_err(fatal)?;
    let publish_at = row.try_get("publish_at").map_err(fatal)?;
    Ok(Poll { id, question, publish_at })
}

fn deserialize_choice_from_row(row: &tokio_postgres::Row) -> error::Result<Choice> {
    let id: i32 = row.try_get("id").map_err(fatal)?;
    let id = ChoiceId::new(id).ok_or(error::Error::Fatal)?;
    let poll: i32 = row.try_get("poll").map_err(fatal)?;
    let poll = PollId::new(poll).ok_or(error::Error::Fatal)?;
    let text = row.try_get("text").map_err(fatal)?;
    let votes: i32 = row.try_get("votes").map_err(fatal)?;
    let votes = u32::try_from(votes).map_err(|_| error::Error::Fatal)?;
    Ok(Choice { id, poll, text, votes })
}

impl Database {
    /// Installs the tables and indices if they do not exist yet.
    pub async fn migrate(&self) -> error::Result<()> {
        self.0.batch_execute(SCHEMA).await.map_err(fatal)
    }
}

impl Store for Database {
    async fn list_visible_polls(&self, now: DateTime<Utc>) -> error::Result<Vec<Poll>> {
        let limit = LATEST_POLL_LIMIT as i64;
        let params: [&(dyn ToSql + Sync); 2] = [&now, &limit];
        self.0
            .query_raw(
                "SELECT id, question, publish_at FROM poll WHERE publish_at <= $1 ORDER BY publish_at DESC, id DESC LIMIT $2",
                params,
            )
            .await
            .map_err(fatal)?
            .map_err(fatal)
            .and_then(|row| core::future::ready(deserialize_poll_from_row(&row)))
            .try_collect()
            .await
    }

    async fn get_visible_poll(&self, id: PollId, now: DateTime<Utc>) -> error::Result<Poll> {
        let pid = id.get();
        let row = self
            .0
            .query_opt("SELECT id, question, publish_at FROM poll WHERE id = $1 AND publish_at <= $2", &[&pid, &now])
            .await
            .map_err(fatal)?
            .ok_or(error::Error::NotFound)?;
        deserialize_poll_from_row(&row)
    }

    async fn get_poll(&self, id: PollId) -> error::Result<Poll> {
        let pid = id.get();
        let row = self
            .0
            .query_opt("SELECT id, question, publish_at FROM poll WHERE id = $1", &[&pid])
            .await
            .map_err(fatal)?
            .ok_or(error::Error::NotFound)?;
        deserialize_poll_from_row(&row)
    }

    async fn get_choices(&self, poll: PollId) -> error::Result<Vec<Choice>> {
        let pid = poll.get();
        self.0
            .query("SELECT id, poll, text, votes FROM choice WHERE poll = $1 ORDER BY id", &[&pid])
            .await
            .map_err(fatal)?
            .iter()
            .map(deserialize_choice_from_row)
            .collect()
    }

    async fn get_choice(&self, poll: PollId, choice: ChoiceId) -> error::Result<Choice> {
        let pid = poll.get();
        let cid = choice.get();
        let row = self
            .0
            .query_opt("SELECT id, poll, text, votes FROM choice WHERE id = $1 AND poll = $2", &[&cid, &pid])
            .await
            .map_err(fatal)?
            .ok_or(error::Error::NotFound)?;
        deserialize_choice_from_row(&row)
    }

    async fn increment_vote(&self, choice: ChoiceId) -> error::Result<u32> {
        let cid = choice.get();
        let row = self
            .0
            .query_opt("UPDATE choice SET votes = votes + 1 WHERE id = $1 RETURNING votes", &[&cid])
            .await
            .map_err(fatal)?
            .ok_or(error::Error::NotFound)?;
        let votes: i32 = row.try_get("votes").map_err(fatal)?;
        u32::try_from(votes).map_err(|_| error::Error::Fatal)
    }

    async fn create_poll(&self, question: &str, publish_at: DateTime<Utc>) -> error::Result<PollId> {
        validate_question(question)?;
        let err = match self
            .0
            .query_opt(
                "INSERT INTO poll (question, publish_at) VALUES ($1, $2) RETURNING id",
                &[&question, &publish_at],
            )
            .await
        {
            Ok(row) => {
                let row = row.ok_or(error::Error::Fatal)?;
                let id: i32 = row.try_get("id").map_err(fatal)?;
                return PollId::new(id).ok_or(error::Error::Fatal);
            }
            Err(err) => err,
        };

        let known = err.as_db_error().and_then(|db_err| match (db_err.code(), db_err.constraint()) {
            // The question is empty.
            (&SqlState::CHECK_VIOLATION, Some("poll_question_check")) => Some(error::Error::BadInput),
            // The question is too long for the `VARCHAR`.
            (&SqlState::STRING_DATA_RIGHT_TRUNCATION, _) => Some(error::Error::BadInput),
            _ => None,
        });
        Err(known.unwrap_or_else(|| fatal(err)))
    }

    async fn add_choice(&self, poll: PollId, text: &str) -> error::Result<ChoiceId> {
        validate_choice_text(text)?;
        let pid = poll.get();
        let err = match self
            .0
            .query_opt("INSERT INTO choice (poll, text) VALUES ($1, $2) RETURNING id", &[&pid, &text])
            .await
        {
            Ok(row) => {
                let row = row.ok_or(error::Error::Fatal)?;
                let id: i32 = row.try_get("id").map_err(fatal)?;
                return ChoiceId::new(id).ok_or(error::Error::Fatal);
            }
            Err(err) => err,
        };

        let known = err.as_db_error().and_then(|db_err| match db_err.code() {
            // The poll does not exist.
            &SqlState::FOREIGN_KEY_VIOLATION => Some(error::Error::NotFound),
            &SqlState::STRING_DATA_RIGHT_TRUNCATION => Some(error::Error::BadInput),
            _ => None,
        });
        Err(known.unwrap_or_else(|| fatal(err)))
    }

    async fn delete_poll(&self, id: PollId) -> error::Result<()> {
        let pid = id.get();
        match self.0.execute("DELETE FROM poll WHERE id = $1", &[&pid]).await.map_err(fatal)? {
            0 => Err(error::Error::NotFound),
            _ => Ok(()),
        }
    }
}
