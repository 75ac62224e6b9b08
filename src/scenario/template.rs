use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Seq,
    TimestampMs,
}

/// Text with `{{seq}}` and `{{timestamp_ms}}` placeholders, parsed once and
/// rendered per request. Unknown placeholders are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        loop {
            let Some(start) = rest.find("{{") else {
                literal.push_str(rest);
                break;
            };
            let (before, after_start) = rest.split_at(start);
            literal.push_str(before);
            let after = after_start.get(2..).unwrap_or_default();
            let Some(end) = after.find("}}") else {
                literal.push_str(after_start);
                break;
            };
            let (key_part, after_end) = after.split_at(end);
            let placeholder = match key_part.trim() {
                "seq" => Some(Segment::Seq),
                "timestamp_ms" => Some(Segment::TimestampMs),
                _ => None,
            };
            match placeholder {
                Some(segment) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                None => {
                    literal.push_str("{{");
                    literal.push_str(key_part);
                    literal.push_str("}}");
                }
            }
            rest = after_end.get(2..).unwrap_or_default();
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    /// Whether rendering depends on the request.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| !matches!(segment, Segment::Literal(_)))
    }

    #[must_use]
    pub fn render(&self, seq: u64) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Seq => output.push_str(&seq.to_string()),
                Segment::TimestampMs => {
                    output.push_str(&Utc::now().timestamp_millis().to_string());
                }
            }
        }
        output
    }
}
