//! Scanner for the fixed two-field tag spans in model output.
//!
//! A span has the shape
//!
//! ```text
//! <Outer><First>first field</First><Second>second field</Second></Outer>
//! ```
//!
//! The first field ends at the first `</First><Second>` after the opener and
//! the second at the first `</Second></Outer>` after that, so each field is
//! the shortest body that completes the span. Spans never overlap; scanning
//! resumes right after a span's closing tag. Only these exact tag names are
//! recognised, so unrelated markup inside a body is carried through as text.

/// The tag names of one span vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct SpanGrammar {
    pub outer: &'static str,
    pub first: &'static str,
    pub second: &'static str,
}

/// `<Action><ToolName>…</ToolName><Description>…</Description></Action>`
pub const ACTION: SpanGrammar = SpanGrammar {
    outer: "Action",
    first: "ToolName",
    second: "Description",
};

/// `<ActionInput><ToolName>…</ToolName><Arguments>…</Arguments></ActionInput>`
pub const ACTION_INPUT: SpanGrammar = SpanGrammar {
    outer: "ActionInput",
    first: "ToolName",
    second: "Arguments",
};

/// `<Start><SessionId>…</SessionId><Reason>…</Reason></Start>`
pub const START: SpanGrammar = SpanGrammar {
    outer: "Start",
    first: "SessionId",
    second: "Reason",
};

/// One matched span. Fields borrow the raw, untrimmed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan<'a> {
    /// Byte offset of the span's opening `<`.
    pub start: usize,
    /// Byte offset just past the span's closing `>`.
    pub end: usize,
    pub first: &'a str,
    pub second: &'a str,
}

struct Delimiters {
    open: String,
    separator: String,
    close: String,
}

impl SpanGrammar {
    fn delimiters(&self) -> Delimiters {
        Delimiters {
            open: format!("<{}><{}>", self.outer, self.first),
            separator: format!("</{}><{}>", self.first, self.second),
            close: format!("</{}></{}>", self.second, self.outer),
        }
    }

    /// All spans of this grammar in `text`, in document order.
    pub fn scan<'a>(&self, text: &'a str) -> Vec<TagSpan<'a>> {
        let d = self.delimiters();
        let mut spans = Vec::new();
        let mut cursor = 0;

        while let Some(rel) = text[cursor..].find(&d.open) {
            let start = cursor + rel;
            let first_start = start + d.open.len();

            // An opener with no separator or closer after it cannot complete,
            // and neither can any later opener.
            let Some(sep_rel) = text[first_start..].find(&d.separator) else {
                break;
            };
            let first_end = first_start + sep_rel;
            let second_start = first_end + d.separator.len();
            let Some(close_rel) = text[second_start..].find(&d.close) else {
                break;
            };
            let second_end = second_start + close_rel;
            let end = second_end + d.close.len();

            spans.push(TagSpan {
                start,
                end,
                first: &text[first_start..first_end],
                second: &text[second_start..second_end],
            });
            cursor = end;
        }

        spans
    }
}
