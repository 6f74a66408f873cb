#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod views;

use alloc::string::String;
use db::{ChoiceId, DateTime, PollId, Store, Utc};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{
    body::{Body, Bytes},
    header::{HeaderValue, CONTENT_TYPE, LOCATION},
    Method, Request, Response, StatusCode,
};
use serde::{Deserialize, Serialize};

/// Largest request body we are willing to buffer.
pub const BODY_LIMIT: usize = 64 * 1024;

enum Route {
    Root,
    Index,
    Detail(PollId),
    Results(PollId),
    Vote(PollId),
}

/// Resolves the path into a route. Trailing slashes are optional. Malformed poll IDs resolve
/// to no route at all.
fn parse_route(path: &str) -> Option<Route> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let route = match (segments.next(), segments.next(), segments.next()) {
        (None, _, _) => Route::Root,
        (Some("polls"), None, _) => Route::Index,
        (Some("polls"), Some(id), None) => Route::Detail(id.parse().ok()?),
        (Some("polls"), Some(id), Some("results")) => Route::Results(id.parse().ok()?),
        (Some("polls"), Some(id), Some("vote")) => Route::Vote(id.parse().ok()?),
        _ => return None,
    };
    segments.next().is_none().then_some(route)
}

#[derive(Deserialize)]
struct VoteForm {
    choice: Option<String>,
}

/// Extracts the selected choice from an URL-encoded form. Anything malformed counts as no selection.
fn parse_selection(body: &[u8]) -> Option<ChoiceId> {
    let VoteForm { choice } = serde_urlencoded::from_bytes(body).ok()?;
    choice?.trim().parse().ok()
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Full<Bytes>>, StatusCode> {
    let bytes = serde_json::to_vec(value).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut res = Response::new(Full::new(Bytes::from(bytes)));
    *res.status_mut() = status;
    assert!(res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json")).is_none());
    Ok(res)
}

fn redirect(location: &str) -> Result<Response<Full<Bytes>>, StatusCode> {
    let location = HeaderValue::from_str(location).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut res = Response::new(Full::default());
    *res.status_mut() = StatusCode::FOUND;
    assert!(res.headers_mut().insert(LOCATION, location).is_none());
    Ok(res)
}

fn reject(err: error::Error) -> StatusCode {
    if err == error::Error::Fatal {
        log::error!("{err}");
    }
    err.status()
}

fn require(method: &Method, expected: Method) -> Result<(), StatusCode> {
    if *method == expected {
        Ok(())
    } else {
        Err(StatusCode::METHOD_NOT_ALLOWED)
    }
}

/// Dispatches the request to its handler and renders the outcome. Only the vote route ever
/// mutates the store, and only on `POST`.
pub async fn try_respond<S, B>(
    req: Request<B>,
    store: &S,
    now: DateTime<Utc>,
) -> Result<Response<Full<Bytes>>, StatusCode>
where
    S: Store,
    B: Body,
    B::Error: Into<alloc::boxed::Box<dyn core::error::Error + Send + Sync>>,
{
    let route = parse_route(req.uri().path()).ok_or(StatusCode::NOT_FOUND)?;
    let method = req.method().clone();
    match route {
        Route::Root => {
            require(&method, Method::GET)?;
            redirect("/polls/")
        }
        Route::Index => {
            require(&method, Method::GET)?;
            let page = views::index(store, now).await.map_err(reject)?;
            json(StatusCode::OK, &page)
        }
        Route::Detail(id) => {
            require(&method, Method::GET)?;
            let page = views::detail(store, id, now).await.map_err(reject)?;
            json(StatusCode::OK, &page)
        }
        Route::Results(id) => {
            require(&method, Method::GET)?;
            let page = views::results(store, id).await.map_err(reject)?;
            json(StatusCode::OK, &page)
        }
        Route::Vote(id) => {
            require(&method, Method::POST)?;
            let body = Limited::new(req.into_body(), BODY_LIMIT)
                .collect()
                .await
                .map_err(|err| {
                    if err.is::<LengthLimitError>() {
                        StatusCode::PAYLOAD_TOO_LARGE
                    } else {
                        StatusCode::BAD_REQUEST
                    }
                })?
                .to_bytes();
            match views::vote(store, id, parse_selection(&body)).await.map_err(reject)? {
                views::Vote::Counted { poll, .. } => redirect(&alloc::format!("/polls/{poll}/results/")),
                views::Vote::Rejected(page) => json(StatusCode::OK, &page),
            }
        }
    }
}
