// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Temporary HTTP endpoint for entering the pairing PIN.
//!
//! The device displays a four-digit PIN on the TV. The user opens
//! `http://<bridge host>:<port>/` in a browser and types it into four
//! one-character fields; the endpoint forwards it to the pairing subprocess.

use std::net::{Ipv4Addr, SocketAddr};

use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::PairingError;
use crate::process::ProcessInput;

/// Number of form fields that carry one PIN digit each.
pub const PIN_FIELDS: usize = 4;

/// Position of the digit inside each raw `name=value` field.
///
/// Field names are one character long, so the digit follows `x=`.
pub const PIN_CHAR_OFFSET: usize = 2;

const CONFIRMATION_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>PIN sent</title></head>\
<body><h1>PIN sent</h1><p>The PIN was forwarded to the Apple TV. You can close this page.</p></body></html>";

/// Reconstructs the PIN from a URL-encoded form body.
///
/// Takes the character at [`PIN_CHAR_OFFSET`] of each of the first
/// [`PIN_FIELDS`] fields. Returns `None` if there are fewer fields or a
/// field is too short (an empty submission).
///
/// # Examples
///
/// ```
/// use atv_bridge::pairing::extract_pin;
///
/// assert_eq!(extract_pin("a=1&b=2&c=3&d=4").as_deref(), Some("1234"));
/// assert_eq!(extract_pin("a=&b=&c=&d="), None);
/// ```
#[must_use]
pub fn extract_pin(body: &str) -> Option<String> {
    let mut pin = String::with_capacity(PIN_FIELDS);
    let mut fields = body.trim().split('&');

    for _ in 0..PIN_FIELDS {
        let field = fields.next()?;
        let field = urlencoding::decode(field).ok()?;
        let digit = field.chars().nth(PIN_CHAR_OFFSET)?;
        pin.push(digit);
    }
    Some(pin)
}

#[derive(Clone)]
struct PinState {
    input: ProcessInput,
    device_name: String,
}

/// A running PIN endpoint, bound to all interfaces.
///
/// The server stops when [`shutdown`](Self::shutdown) is called or the value
/// is dropped.
#[derive(Debug)]
pub struct PinServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PinServer {
    /// Binds `0.0.0.0:<port>` and starts serving.
    ///
    /// Submitted PINs are written, newline-terminated, to `input`.
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Bind` if the port cannot be bound.
    pub async fn start(
        port: u16,
        input: ProcessInput,
        device_name: &str,
    ) -> Result<Self, PairingError> {
        let state = PinState {
            input,
            device_name: device_name.to_string(),
        };
        let app = Router::new()
            .route("/", get(pin_page).post(submit_pin))
            .with_state(state);

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| PairingError::Bind { port, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| PairingError::Bind { port, source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "PIN endpoint failed");
            }
        });

        tracing::debug!(%addr, "PIN endpoint listening");
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the server and waits for it to close its listener.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        tracing::debug!(addr = %self.addr, "PIN endpoint closed");
    }
}

impl Drop for PinServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

async fn pin_page(State(state): State<PinState>) -> Html<String> {
    Html(entry_page(&state.device_name))
}

async fn submit_pin(State(state): State<PinState>, body: String) -> Html<String> {
    let Some(pin) = extract_pin(&body) else {
        tracing::warn!(device = %state.device_name, "ignoring empty or incomplete PIN submission");
        return Html(entry_page(&state.device_name));
    };

    tracing::info!(device = %state.device_name, "PIN received, forwarding to pairing process");
    if let Err(e) = state.input.write_line(&pin).await {
        tracing::warn!(device = %state.device_name, error = %e, "could not forward PIN");
    }
    Html(CONFIRMATION_PAGE.to_string())
}

fn entry_page(device_name: &str) -> String {
    let name = escape_html(device_name);
    let inputs: String = ["a", "b", "c", "d"]
        .iter()
        .map(|field| {
            format!(
                "<input name=\"{field}\" maxlength=\"1\" size=\"1\" inputmode=\"numeric\" pattern=\"[0-9]\" required>"
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>Pair {name}</title></head>\
<body><h1>Pair {name}</h1><p>Enter the PIN shown on the TV.</p>\
<form method=\"post\" action=\"/\">{inputs}<button type=\"submit\">Send</button></form></body></html>"
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
