use crate::{error, validate_choice_text, validate_question, Store, LATEST_POLL_LIMIT};
use alloc::{collections::BTreeMap, string::String, vec::Vec};
use model::{Choice, ChoiceId, DateTime, Poll, PollId, Utc};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    polls: BTreeMap<PollId, Poll>,
    choices: BTreeMap<ChoiceId, Choice>,
    last_poll: i32,
    last_choice: i32,
}

/// Volatile [`Store`] that keeps every table behind a single lock. Identifiers are assigned
/// sequentially starting from one, just like a `SERIAL` column.
#[derive(Default)]
pub struct Memory(Mutex<Tables>);

impl Store for Memory {
    async fn list_visible_polls(&self, now: DateTime<Utc>) -> error::Result<Vec<Poll>> {
        let tables = self.0.lock().await;
        let mut polls: Vec<_> = tables.polls.values().filter(|poll| poll.is_visible(now)).cloned().collect();
        polls.sort_unstable_by(|a, b| b.publish_at.cmp(&a.publish_at).then(b.id.cmp(&a.id)));
        polls.truncate(LATEST_POLL_LIMIT);
        Ok(polls)
    }

    async fn get_visible_poll(&self, id: PollId, now: DateTime<Utc>) -> error::Result<Poll> {
        let tables = self.0.lock().await;
        tables.polls.get(&id).filter(|poll| poll.is_visible(now)).cloned().ok_or(error::Error::NotFound)
    }

    async fn get_poll(&self, id: PollId) -> error::Result<Poll> {
        let tables = self.0.lock().await;
        tables.polls.get(&id).cloned().ok_or(error::Error::NotFound)
    }

    async fn get_choices(&self, poll: PollId) -> error::Result<Vec<Choice>> {
        let tables = self.0.lock().await;
        Ok(tables.choices.values().filter(|choice| choice.poll == poll).cloned().collect())
    }

    async fn get_choice(&self, poll: PollId, choice: ChoiceId) -> error::Result<Choice> {
        let tables = self.0.lock().await;
        tables.choices.get(&choice).filter(|choice| choice.poll == poll).cloned().ok_or(error::Error::NotFound)
    }

    async fn increment_vote(&self, choice: ChoiceId) -> error::Result<u32> {
        let mut tables = self.0.lock().await;
        let choice = tables.choices.get_mut(&choice).ok_or(error::Error::NotFound)?;
        choice.votes = choice.votes.checked_add(1).ok_or(error::Error::Fatal)?;
        Ok(choice.votes)
    }

    async fn create_poll(&self, question: &str, publish_at: DateTime<Utc>) -> error::Result<PollId> {
        validate_question(question)?;
        let mut tables = self.0.lock().await;
        let next = tables.last_poll.checked_add(1).ok_or(error::Error::Fatal)?;
        let id = PollId::new(next).ok_or(error::Error::Fatal)?;
        tables.last_poll = next;
        tables.polls.insert(id, Poll { id, question: String::from(question), publish_at });
        Ok(id)
    }

    async fn add_choice(&self, poll: PollId, text: &str) -> error::Result<ChoiceId> {
        validate_choice_text(text)?;
        let mut tables = self.0.lock().await;
        if !tables.polls.contains_key(&poll) {
            return Err(error::Error::NotFound);
        }

        let next = tables.last_choice.checked_add(1).ok_or(error::Error::Fatal)?;
        let id = ChoiceId::new(next).ok_or(error::Error::Fatal)?;
        tables.last_choice = next;
        tables.choices.insert(id, Choice { id, poll, text: String::from(text), votes: 0 });
        Ok(id)
    }

    async fn delete_poll(&self, id: PollId) -> error::Result<()> {
        let mut tables = self.0.lock().await;
        tables.polls.remove(&id).ok_or(error::Error::NotFound)?;
        tables.choices.retain(|_, choice| choice.poll != id);
        Ok(())
    }
}
