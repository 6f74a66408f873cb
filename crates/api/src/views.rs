//! Request handlers, independent of the transport. Every handler receives its store and, where
//! publication matters, the current time explicitly.

use crate::error;
use alloc::vec::Vec;
use db::{Choice, ChoiceId, DateTime, Poll, PollId, Store, Utc};
use serde::Serialize;

/// Shown on the index when nothing has been published yet.
pub const NO_POLLS_MESSAGE: &str = "No polls are available.";
/// Shown on a redisplayed detail page when a vote named no valid choice.
pub const NO_CHOICE_MESSAGE: &str = "You didn't select a choice.";

/// A poll as listed on the index.
#[derive(Debug, Serialize)]
pub struct Listing {
    #[serde(flatten)]
    pub poll: Poll,
    pub published_recently: bool,
}

#[derive(Debug, Serialize)]
pub struct IndexPage {
    pub latest_poll_list: Vec<Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DetailPage {
    pub poll: Poll,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ResultsPage {
    pub poll: Poll,
    pub choices: Vec<Choice>,
    pub total_votes: u64,
}

/// Outcome of a vote submission.
#[derive(Debug)]
pub enum Vote {
    /// The tally of the selected choice went up by one. Clients should be redirected to the results.
    Counted { poll: PollId, votes: u32 },
    /// No valid choice was selected. The detail page is redisplayed with an error message.
    Rejected(DetailPage),
}

/// Lists the latest published polls. Polls scheduled for the future are left out.
pub async fn index<S: Store>(store: &S, now: DateTime<Utc>) -> error::Result<IndexPage> {
    let polls = store.list_visible_polls(now).await?;
    let message = polls.is_empty().then_some(NO_POLLS_MESSAGE);
    let latest_poll_list = polls
        .into_iter()
        .map(|poll| Listing { published_recently: poll.was_published_recently(now), poll })
        .collect();
    Ok(IndexPage { latest_poll_list, message })
}

/// Displays a published poll. Unpublished polls are indistinguishable from missing ones.
pub async fn detail<S: Store>(store: &S, id: PollId, now: DateTime<Utc>) -> error::Result<DetailPage> {
    let poll = store.get_visible_poll(id, now).await?;
    let choices = store.get_choices(poll.id).await?;
    Ok(DetailPage { poll, choices, error_message: None })
}

/// Displays the tallies of a poll. Unlike [`detail`], the publication date is not checked, so
/// results of a scheduled poll are reachable by anyone who knows its identifier.
pub async fn results<S: Store>(store: &S, id: PollId) -> error::Result<ResultsPage> {
    let poll = store.get_poll(id).await?;
    let choices = store.get_choices(poll.id).await?;
    let total_votes = choices.iter().map(|choice| u64::from(choice.votes)).sum();
    Ok(ResultsPage { poll, choices, total_votes })
}

/// Counts one vote for `selection` if it names a choice of the poll.
pub async fn vote<S: Store>(store: &S, id: PollId, selection: Option<ChoiceId>) -> error::Result<Vote> {
    let poll = store.get_poll(id).await?;

    let choice = match selection {
        Some(choice) => match store.get_choice(poll.id, choice).await {
            Ok(choice) => Some(choice),
            Err(db::error::Error::NotFound) => None,
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    let Some(choice) = choice else {
        log::debug!("rejected vote on poll {} without a valid choice", poll.id);
        let choices = store.get_choices(poll.id).await?;
        return Ok(Vote::Rejected(DetailPage { poll, choices, error_message: Some(NO_CHOICE_MESSAGE) }));
    };

    let votes = store.increment_vote(choice.id).await?;
    log::debug!("choice {} of poll {} now has {votes} votes", choice.id, poll.id);
    Ok(Vote::Counted { poll: poll.id, votes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::{Memory, TimeDelta};

    async fn create_poll(store: &Memory, question: &str, days: i64) -> PollId {
        store.create_poll(question, Utc::now() + TimeDelta::days(days)).await.unwrap()
    }

    fn questions(page: &IndexPage) -> Vec<&str> {
        page.latest_poll_list.iter().map(|listing| listing.poll.question.as_str()).collect()
    }

    async fn tallies(store: &Memory, poll: PollId) -> Vec<(ChoiceId, u32)> {
        store.get_choices(poll).await.unwrap().into_iter().map(|choice| (choice.id, choice.votes)).collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_with_no_polls() {
        let store = Memory::default();
        let page = index(&store, Utc::now()).await.unwrap();
        assert!(page.latest_poll_list.is_empty());
        assert_eq!(page.message, Some(NO_POLLS_MESSAGE));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_with_a_past_poll() {
        let store = Memory::default();
        create_poll(&store, "Past poll.", -30).await;
        let page = index(&store, Utc::now()).await.unwrap();
        assert_eq!(questions(&page), ["Past poll."]);
        assert_eq!(page.message, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_with_a_future_poll() {
        let store = Memory::default();
        let future = create_poll(&store, "Future poll.", 30).await;
        let now = Utc::now();
        let page = index(&store, now).await.unwrap();
        assert!(page.latest_poll_list.is_empty());
        assert_eq!(page.message, Some(NO_POLLS_MESSAGE));
        assert_eq!(detail(&store, future, now).await.unwrap_err(), error::Error::NotFound);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_with_future_poll_and_past_poll() {
        let store = Memory::default();
        create_poll(&store, "Past poll.", -30).await;
        create_poll(&store, "Future poll.", 30).await;
        let page = index(&store, Utc::now()).await.unwrap();
        assert_eq!(questions(&page), ["Past poll."]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_with_two_past_polls() {
        let store = Memory::default();
        create_poll(&store, "Past poll 1.", -30).await;
        create_poll(&store, "Past poll 2.", -5).await;
        let page = index(&store, Utc::now()).await.unwrap();
        assert_eq!(questions(&page), ["Past poll 2.", "Past poll 1."]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_shows_at_most_five_polls() {
        let store = Memory::default();
        for days in 1..=8 {
            create_poll(&store, "Past poll.", -days).await;
        }
        let page = index(&store, Utc::now()).await.unwrap();
        assert_eq!(page.latest_poll_list.len(), 5);
        assert!(page.latest_poll_list.windows(2).all(|pair| pair[0].poll.publish_at >= pair[1].poll.publish_at));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn index_flags_recent_polls() {
        let store = Memory::default();
        let now = Utc::now();
        store.create_poll("Recent poll.", now - TimeDelta::hours(1)).await.unwrap();
        store.create_poll("Old poll.", now - TimeDelta::days(30)).await.unwrap();
        let page = index(&store, now).await.unwrap();
        let flags: Vec<_> = page.latest_poll_list.iter().map(|listing| listing.published_recently).collect();
        assert_eq!(flags, [true, false]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn detail_with_a_future_poll() {
        let store = Memory::default();
        let future = create_poll(&store, "Future poll.", 5).await;
        let now = Utc::now();
        let missing = PollId::new(future.get() + 1).unwrap();
        assert_eq!(detail(&store, future, now).await.unwrap_err(), error::Error::NotFound);
        assert_eq!(detail(&store, missing, now).await.unwrap_err(), error::Error::NotFound);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn detail_with_a_past_poll() {
        let store = Memory::default();
        let past = create_poll(&store, "Past Poll.", -5).await;
        let choice = store.add_choice(past, "Sure.").await.unwrap();
        let page = detail(&store, past, Utc::now()).await.unwrap();
        assert_eq!(page.poll.question, "Past Poll.");
        assert_eq!(page.choices.iter().map(|choice| choice.id).collect::<Vec<_>>(), [choice]);
        assert_eq!(page.error_message, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn results_ignore_publication_date() {
        let store = Memory::default();
        let future = create_poll(&store, "Future poll.", 30).await;
        store.add_choice(future, "Maybe.").await.unwrap();
        let page = results(&store, future).await.unwrap();
        assert_eq!(page.poll.question, "Future poll.");
        assert_eq!(page.total_votes, 0);

        let missing = PollId::new(future.get() + 1).unwrap();
        assert_eq!(results(&store, missing).await.unwrap_err(), error::Error::NotFound);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn vote_for_a_valid_choice() {
        let store = Memory::default();
        let poll = create_poll(&store, "Past poll.", -30).await;
        let first = store.add_choice(poll, "First").await.unwrap();
        let second = store.add_choice(poll, "Second").await.unwrap();

        let Vote::Counted { poll: counted, votes } = vote(&store, poll, Some(first)).await.unwrap() else {
            panic!("vote was not counted");
        };
        assert_eq!(counted, poll);
        assert_eq!(votes, 1);
        assert_eq!(tallies(&store, poll).await, [(first, 1), (second, 0)]);

        let page = results(&store, poll).await.unwrap();
        assert_eq!(page.total_votes, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn vote_without_a_choice() {
        let store = Memory::default();
        let poll = create_poll(&store, "Past poll.", -30).await;
        let choice = store.add_choice(poll, "Only").await.unwrap();

        let Vote::Rejected(page) = vote(&store, poll, None).await.unwrap() else {
            panic!("vote without a choice was counted");
        };
        assert_eq!(page.error_message, Some(NO_CHOICE_MESSAGE));
        assert_eq!(page.poll.id, poll);
        assert_eq!(tallies(&store, poll).await, [(choice, 0)]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn vote_for_a_choice_of_another_poll() {
        let store = Memory::default();
        let poll = create_poll(&store, "Mine?", -1).await;
        let other = create_poll(&store, "Theirs?", -1).await;
        let mine = store.add_choice(poll, "Mine").await.unwrap();
        let theirs = store.add_choice(other, "Theirs").await.unwrap();

        let outcome = vote(&store, poll, Some(theirs)).await.unwrap();
        assert!(matches!(outcome, Vote::Rejected(DetailPage { error_message: Some(NO_CHOICE_MESSAGE), .. })));
        assert_eq!(tallies(&store, poll).await, [(mine, 0)]);
        assert_eq!(tallies(&store, other).await, [(theirs, 0)]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn vote_on_a_missing_poll() {
        let store = Memory::default();
        let missing = PollId::new(1).unwrap();
        let choice = ChoiceId::new(1).unwrap();
        assert_eq!(vote(&store, missing, Some(choice)).await.unwrap_err(), error::Error::NotFound);
    }
}
