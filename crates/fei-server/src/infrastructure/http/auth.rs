//! Session-cookie login gate.
//!
//! When a password is configured, every content route sits behind
//! [`require_session`].  A browser without a valid `fei_session` cookie is
//! redirected (`303 See Other`) to `/login`.  Posting the right password
//! issues a fresh random token, stores it in the [`SessionStore`] and sets it
//! as the cookie.  Without a configured password the gate admits everyone.
//!
//! Sessions live only as long as the listener: a restart forgets them.  At
//! most [`MAX_SESSIONS`] tokens are remembered; issuing one more forgets the
//! oldest, whose browser is sent back to the login form.

use std::collections::{HashSet, VecDeque};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::HttpState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "fei_session";

/// Tokens remembered per listener before the oldest is evicted.
pub const MAX_SESSIONS: usize = 256;

#[derive(Debug, Default)]
struct Tokens {
    valid: HashSet<String>,
    order: VecDeque<String>,
}

/// Valid session tokens for one listener.
#[derive(Debug)]
pub struct SessionStore {
    password: Option<String>,
    capacity: usize,
    tokens: RwLock<Tokens>,
}

impl SessionStore {
    pub fn new(password: Option<String>) -> Self {
        Self::with_capacity(password, MAX_SESSIONS)
    }

    /// Remembers at most `capacity` tokens (minimum 1).
    pub fn with_capacity(password: Option<String>, capacity: usize) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
            capacity: capacity.max(1),
            tokens: RwLock::new(Tokens::default()),
        }
    }

    /// `false` when no password is configured.
    pub fn requires_login(&self) -> bool {
        self.password.is_some()
    }

    pub fn check_password(&self, candidate: &str) -> bool {
        match &self.password {
            Some(expected) => expected == candidate,
            None => true,
        }
    }

    /// Creates and remembers a new random token, forgetting the oldest one
    /// when the store is full.
    pub async fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let mut tokens = self.tokens.write().await;
        while tokens.order.len() >= self.capacity {
            if let Some(oldest) = tokens.order.pop_front() {
                tokens.valid.remove(&oldest);
                debug!("session store full; oldest session forgotten");
            }
        }
        tokens.valid.insert(token.clone());
        tokens.order.push_back(token.clone());
        token
    }

    pub async fn is_valid(&self, token: &str) -> bool {
        self.tokens.read().await.valid.contains(token)
    }

    /// Number of tokens currently remembered.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.order.len()
    }
}

/// Extracts the session token from a `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

/// Middleware guarding the content routes.
pub async fn require_session(
    State(state): State<HttpState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.sessions.requires_login() {
        return next.run(request).await;
    }

    if let Some(token) = session_cookie(request.headers()) {
        if state.sessions.is_valid(&token).await {
            return next.run(request).await;
        }
    }

    debug!("no valid session for {}; redirecting to login", request.uri());
    Redirect::to("/login").into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

/// `GET /login`
pub async fn login_form() -> Html<String> {
    Html(render_login(None))
}

/// `POST /login`
pub async fn login_submit(State(state): State<HttpState>, Form(form): Form<LoginForm>) -> Response {
    if !state.sessions.check_password(&form.password) {
        info!("rejected login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Html(render_login(Some("Wrong password"))),
        )
            .into_response();
    }

    let token = state.sessions.issue().await;
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict");
    info!("login accepted");
    ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

fn render_login(error: Option<&str>) -> String {
    let notice = error
        .map(|e| format!("<p class=\"error\">{e}</p>"))
        .unwrap_or_default();
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>FeiShare login</title></head>\
         <body><h1>FeiShare</h1>{notice}\
         <form method=\"post\" action=\"/login\">\
         <input type=\"password\" name=\"password\" autofocus>\
         <button type=\"submit\">Enter</button></form></body></html>\n"
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
