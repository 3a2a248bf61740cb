//! Response wrapper returned by the executor.
//!
//! # Design
//! `OrcResponse` owns the transport `Response` and offers two mutually
//! exclusive ways of consuming its body:
//! - `payload()` reads everything into memory once and memoizes it;
//! - `open_streamed_response()` hands the live reader to the caller.
//!
//! Once the reader has been handed out, `payload()` refuses to run instead of
//! returning a partially consumed body.

use std::io;

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::http::{HeaderMultimap, Response, ResponseBody};

#[derive(Debug)]
enum BodyState {
    Unread,
    Buffered(Bytes),
    Streaming,
}

/// A transport response plus lazily materialized payload.
#[derive(Debug)]
pub struct OrcResponse {
    response: Response,
    body: BodyState,
}

impl OrcResponse {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            body: BodyState::Unread,
        }
    }

    pub fn status(&self) -> u16 {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMultimap {
        self.response.headers()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Read the whole body on first call; later calls return the same bytes.
    pub async fn payload(&mut self) -> io::Result<Bytes> {
        match &self.body {
            BodyState::Buffered(bytes) => return Ok(bytes.clone()),
            BodyState::Streaming => {
                return Err(io::Error::other(
                    "response body was opened as a stream and cannot be buffered",
                ))
            }
            BodyState::Unread => {}
        }

        let mut data = Vec::new();
        self.response.body_mut().read_to_end(&mut data).await?;
        let bytes = Bytes::from(data);
        self.body = BodyState::Buffered(bytes.clone());
        Ok(bytes)
    }

    /// The buffered body, if `payload()` already ran.
    pub fn buffered_payload(&self) -> Option<&Bytes> {
        match &self.body {
            BodyState::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub async fn payload_text(&mut self) -> io::Result<String> {
        let bytes = self.payload().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Hand out the live body reader. Fails if the body was already buffered.
    pub fn open_streamed_response(&mut self) -> io::Result<&mut dyn ResponseBody> {
        if let BodyState::Buffered(_) = self.body {
            return Err(io::Error::other(
                "response body was already buffered and cannot be streamed",
            ));
        }
        self.body = BodyState::Streaming;
        Ok(self.response.body_mut())
    }

    /// Release the transport resource behind a streamed response.
    pub fn close_streamed_response(&mut self) -> io::Result<()> {
        self.response.close()
    }

    pub fn is_closed(&self) -> bool {
        self.response.is_closed()
    }
}
