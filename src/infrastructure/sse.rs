/// Incremental decoder for the agent's `text/event-stream` frames.
///
/// The agent writes one `data: <json>\n\n` frame per second. Chunks arrive at
/// arbitrary boundaries, so the decoder buffers until complete lines are
/// available and emits one payload per blank-line-terminated event.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline_at) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_at).collect();
            let mut line = &line_bytes[..line_bytes.len() - 1];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }

            // Lines that are not valid UTF-8 cannot carry a JSON payload.
            let Ok(line) = std::str::from_utf8(line) else {
                continue;
            };

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    payloads.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
                continue;
            }

            if let Some(value) = line.strip_prefix("data:") {
                self.data_lines.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Other fields (event:, id:, retry:) and comments are ignored.
        }

        payloads
    }
}
