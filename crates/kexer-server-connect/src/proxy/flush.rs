// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Periodic flushing for streamed response bodies.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::trace;

/// Buffered bytes are released early once they reach this size.
const MAX_BUFFERED_BYTES: usize = 32 * 1024;

pin_project! {
	/// Coalesces body chunks and releases them at most once per flush
	/// interval, so chatty backends don't produce one frame per write.
	///
	/// Without an interval (or with a zero one) chunks pass straight
	/// through. Buffered bytes are always released before end of stream or
	/// an error.
	pub struct FlushIntervalStream<S, E> {
		#[pin]
		inner: S,
		period: Option<Duration>,
		ticker: Option<Interval>,
		buffer: BytesMut,
		pending_error: Option<E>,
		done: bool,
	}
}

impl<S, E> FlushIntervalStream<S, E>
where
	S: Stream<Item = Result<Bytes, E>>,
{
	pub fn new(inner: S, period: Option<Duration>) -> Self {
		Self {
			inner,
			period: period.filter(|p| !p.is_zero()),
			ticker: None,
			buffer: BytesMut::new(),
			pending_error: None,
			done: false,
		}
	}
}

impl<S, E> Stream for FlushIntervalStream<S, E>
where
	S: Stream<Item = Result<Bytes, E>>,
{
	type Item = Result<Bytes, E>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let mut this = self.project();

		if let Some(err) = this.pending_error.take() {
			return Poll::Ready(Some(Err(err)));
		}
		if *this.done {
			return Poll::Ready(None);
		}

		let Some(period) = *this.period else {
			return this.inner.poll_next(cx);
		};

		loop {
			match this.inner.as_mut().poll_next(cx) {
				Poll::Ready(Some(Ok(chunk))) => {
					this.buffer.extend_from_slice(&chunk);
					if this.buffer.len() >= MAX_BUFFERED_BYTES {
						trace!(bytes = this.buffer.len(), "flushing full buffer");
						return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
					}
				}
				Poll::Ready(Some(Err(err))) => {
					if this.buffer.is_empty() {
						return Poll::Ready(Some(Err(err)));
					}
					*this.pending_error = Some(err);
					return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
				}
				Poll::Ready(None) => {
					*this.done = true;
					if this.buffer.is_empty() {
						return Poll::Ready(None);
					}
					return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
				}
				Poll::Pending => break,
			}
		}

		if this.buffer.is_empty() {
			return Poll::Pending;
		}

		let ticker = this.ticker.get_or_insert_with(|| {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			ticker
		});

		match ticker.poll_tick(cx) {
			Poll::Ready(_) => {
				trace!(bytes = this.buffer.len(), "flush interval elapsed");
				Poll::Ready(Some(Ok(this.buffer.split().freeze())))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}
