use serde::Deserialize;

const DATA_PREFIX: &str = "data: ";
const DONE: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

/// Decodes one line of the relayed body. Lines that are not `data: ` lines,
/// carry malformed JSON, or have no content yield `None`.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let payload = line.trim_end_matches('\r').strip_prefix(DATA_PREFIX)?;
    if payload.trim() == DONE {
        return Some(StreamEvent::Done);
    }
    let chunk: Chunk = serde_json::from_str(payload).ok()?;
    let content = chunk.choices.into_iter().next()?.delta.content?;
    (!content.is_empty()).then_some(StreamEvent::Delta(content))
}

/// Events of a complete body, in order, ending at the first `[DONE]`.
/// Each call starts over from the beginning of `body`.
pub fn events(body: &str) -> Events<'_> {
    Events {
        lines: body.lines(),
        done: false,
    }
}

pub struct Events<'a> {
    lines: std::str::Lines<'a>,
    done: bool,
}

impl Iterator for Events<'_> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        while !self.done {
            match parse_line(self.lines.next()?) {
                Some(StreamEvent::Done) => {
                    self.done = true;
                    return Some(StreamEvent::Done);
                }
                Some(event) => return Some(event),
                None => continue,
            }
        }
        None
    }
}

/// Incremental decoder for a body arriving in arbitrary chunks. Bytes are
/// buffered until a full line is available, so neither lines nor UTF-8
/// sequences need to line up with chunk boundaries.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl EventDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }
        self.buf.extend_from_slice(chunk);
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.take(&line[..pos], &mut out);
            if self.done {
                self.buf.clear();
                break;
            }
        }
        out
    }

    /// Flushes a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if !self.done && !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            self.take(&line, &mut out);
        }
        out
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn take(&mut self, line: &[u8], out: &mut Vec<StreamEvent>) {
        let line = String::from_utf8_lossy(line);
        if let Some(event) = parse_line(&line) {
            self.done = event == StreamEvent::Done;
            out.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n")
    }

    fn text_of(events: impl IntoIterator<Item = StreamEvent>) -> String {
        events
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Delta(s) => Some(s),
                StreamEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn parses_delta_and_done() {
        assert_eq!(
            parse_line(delta("Olá").trim_end()),
            Some(StreamEvent::Delta("Olá".into()))
        );
        assert_eq!(parse_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("data: {not json"), None);
        assert_eq!(parse_line("data: {\"choices\":[]}"), None);
        assert_eq!(parse_line("data: {\"choices\":[{\"delta\":{}}]}"), None);
    }

    #[test]
    fn events_stop_at_done_and_restart() {
        let body = format!(
            "{}data: garbage\n{}data: [DONE]\n\n{}",
            delta("a"),
            delta("b"),
            delta("late")
        );
        let first: Vec<_> = events(&body).collect();
        assert_eq!(
            first,
            vec![
                StreamEvent::Delta("a".into()),
                StreamEvent::Delta("b".into()),
                StreamEvent::Done
            ]
        );
        assert_eq!(events(&body).collect::<Vec<_>>(), first);
    }

    #[test]
    fn body_without_done_is_finite() {
        let body = delta("só isso");
        assert_eq!(text_of(events(&body)), "só isso");
    }

    #[test]
    fn decoder_reassembles_split_chunks() {
        let body = format!("{}{}data: [DONE]\n\n", delta("Gastos "), delta("de março"));
        let bytes = body.as_bytes();
        let mut decoder = EventDecoder::default();
        let mut seen = Vec::new();
        // three-byte pieces split both lines and the multi-byte "ç"
        for piece in bytes.chunks(3) {
            seen.extend(decoder.push(piece));
        }
        seen.extend(decoder.finish());
        assert_eq!(text_of(seen.clone()), "Gastos de março");
        assert_eq!(seen.last(), Some(&StreamEvent::Done));
        assert!(decoder.is_done());
    }

    #[test]
    fn decoder_ignores_everything_after_done() {
        let mut decoder = EventDecoder::default();
        let out = decoder.push(format!("data: [DONE]\n{}", delta("extra")).as_bytes());
        assert_eq!(out, vec![StreamEvent::Done]);
        assert!(decoder.push(delta("more").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn decoder_flushes_unterminated_tail() {
        let mut decoder = EventDecoder::default();
        let line = delta("fim");
        assert!(decoder.push(line.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Delta("fim".into())]);
    }
}
