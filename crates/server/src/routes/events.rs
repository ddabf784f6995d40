// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE fan-out of the project event bus.
//!
//! Frame format: `event: <type>` + `data: <flat json>`. The first frame is
//! always `event: connected`. Slow clients see gaps, never backpressure:
//! the bus drops for them.

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;

use crate::extract::Scoped;

pub async fn stream(
    Scoped(services): Scoped,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.bus.subscribe();

    let connected = stream::once(async {
        Ok(SseEvent::default().event("connected").data(r#"{"status":"connected"}"#))
    });
    let events = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().event(event.name()).data(data))
    });

    Sse::new(connected.chain(events)).keep_alive(KeepAlive::default())
}
