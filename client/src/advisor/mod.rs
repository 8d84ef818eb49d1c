pub mod stream;

use stream::{events, EventDecoder, StreamEvent};

use anyhow::{Context, Result};
use futures_util::{Stream, StreamExt};
use std::io::Write;

/// Writes each analysis delta to `out` as it arrives and returns the full
/// text. Stops at `[DONE]`; an interrupted body is an error.
pub async fn relay_analysis<S, B, E, W>(mut body: S, out: &mut W) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
    W: Write,
{
    let mut decoder = EventDecoder::default();
    let mut text = String::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("analysis stream interrupted")?;
        emit(decoder.push(chunk.as_ref()), &mut text, out)?;
        if decoder.is_done() {
            return Ok(text);
        }
    }
    emit(decoder.finish(), &mut text, out)?;
    Ok(text)
}

/// Text of an analysis body that was saved whole, e.g. with `curl -o`.
pub fn replay_analysis(body: &str) -> String {
    events(body)
        .filter_map(|event| match event {
            StreamEvent::Delta(delta) => Some(delta),
            StreamEvent::Done => None,
        })
        .collect()
}

fn emit<W: Write>(events: Vec<StreamEvent>, text: &mut String, out: &mut W) -> Result<()> {
    for event in events {
        if let StreamEvent::Delta(delta) = event {
            out.write_all(delta.as_bytes())?;
            out.flush()?;
            text.push_str(&delta);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::io;

    const BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Reduza \"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lazer.\"}}]}\n\ndata: [DONE]\n\n";

    #[tokio::test]
    async fn writes_deltas_in_order() {
        let chunks: Vec<io::Result<Vec<u8>>> = BODY
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();
        let mut out = Vec::new();
        let text = relay_analysis(stream::iter(chunks), &mut out).await.unwrap();
        assert_eq!(text, "Reduza lazer.");
        assert_eq!(out, b"Reduza lazer.");
    }

    #[test]
    fn replays_saved_body() {
        let saved = format!("{BODY}data: {{\"choices\":[{{\"delta\":{{\"content\":\"ignored\"}}}}]}}\n");
        assert_eq!(replay_analysis(&saved), "Reduza lazer.");
        assert_eq!(replay_analysis(""), "");
    }

    #[tokio::test]
    async fn interruption_keeps_partial_output() {
        let first = BODY.split("\n\n").next().unwrap().to_string() + "\n\n";
        let chunks = vec![
            Ok(first.into_bytes()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut out = Vec::new();
        let err = relay_analysis(stream::iter(chunks), &mut out).await.unwrap_err();
        assert!(err.to_string().contains("interrupted"));
        assert_eq!(out, b"Reduza ");
    }
}
