//! TS-dialect catalog parser.
//!
//! Decodes one serialized catalog document into a [`Catalog`]. The format is
//! the Qt Linguist TS dialect: a `<TS>` root holding `<context>` elements,
//! each with a `<name>` and a sequence of `<message>` units.
//!
//! The reader is a minimal pull lexer scoped to exactly this dialect:
//! declaration, doctype, comments, elements, attributes, character data,
//! and the five named entities plus numeric references. It is not a general
//! XML parser and does not try to be one.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Unbalanced or mismatched tags | `ParseError` with line/column |
//! | Unknown element where `<context>`/`<message>` expected | `ParseError` |
//! | `<message>` without `<source>` | `ParseError` |
//! | Malformed entity reference | `ParseError` |
//! | Non-UTF-8 input | `ParseError` |
//! | Unknown attributes or message children | recorded in `extra`, no error |

use memchr::memchr;
use smallvec::SmallVec;
use unicode_normalization::{UnicodeNormalization, is_nfc};

use crate::locale::LocaleId;
use crate::model::{Catalog, Context, Location, Message, TranslationStatus};

/// Parse failure with document position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    detail: String,
    line: u32,
    column: u32,
}

impl ParseError {
    /// 1-based line of the offending input.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based byte column within the line.
    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Human-readable description of what went wrong.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parse error at line {}, column {}: {}",
            self.line, self.column, self.detail
        )
    }
}

impl std::error::Error for ParseError {}

/// Parse a catalog document from bytes.
///
/// # Errors
///
/// Fails on non-UTF-8 input or any structural problem; see [`parse_str`].
pub fn parse_bytes(bytes: &[u8]) -> Result<Catalog, ParseError> {
    match std::str::from_utf8(bytes) {
        Ok(src) => parse_str(src),
        Err(e) => {
            let (line, column) = position_of(
                std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
                e.valid_up_to(),
            );
            Err(ParseError {
                detail: "catalog is not valid UTF-8".to_string(),
                line,
                column,
            })
        }
    }
}

/// Parse a catalog document.
///
/// # Errors
///
/// Returns [`ParseError`] with line/column on unbalanced markup, unexpected
/// elements, a message lacking `<source>`, malformed entities, or an
/// unparsable `language` attribute.
pub fn parse_str(src: &str) -> Result<Catalog, ParseError> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    let catalog = DocumentParser {
        lexer: Lexer { src, pos: 0 },
    }
    .parse()?;
    tracing::debug!(
        locale = ?catalog.locale,
        contexts = catalog.contexts.len(),
        messages = catalog.message_count(),
        "parsed catalog"
    );
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Tag<'a> {
    Open {
        name: &'a str,
        attrs: Vec<(&'a str, String)>,
        self_closing: bool,
    },
    Close(&'a str),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn error(&self, detail: impl Into<String>) -> ParseError {
        self.error_at(self.pos, detail)
    }

    fn error_at(&self, offset: usize, detail: impl Into<String>) -> ParseError {
        let (line, column) = position_of(self.src, offset.min(self.src.len()));
        ParseError {
            detail: detail.into(),
            line,
            column,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Collect character data up to (not including) the next tag, unescaping
    /// entities. Comments embedded in the run are skipped.
    fn text(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let rest = self.rest();
            let stop = memchr(b'<', rest.as_bytes()).unwrap_or(rest.len());
            self.unescape_into(&rest[..stop], &mut out)?;
            self.pos += stop;
            if self.rest().starts_with("<!--") {
                self.skip_comment()?;
                continue;
            }
            return Ok(out);
        }
    }

    /// Read the tag at the cursor. Skips comments, the XML declaration, and
    /// a doctype. Errors at end of input.
    fn tag(&mut self) -> Result<Tag<'a>, ParseError> {
        loop {
            if self.at_eof() {
                return Err(self.error("unexpected end of document"));
            }
            let rest = self.rest();
            debug_assert!(rest.starts_with('<'));
            if rest.starts_with("<!--") {
                self.skip_comment()?;
                self.skip_interelement_text()?;
                continue;
            }
            if rest.starts_with("<?") {
                self.skip_until(b'>', "unterminated processing instruction")?;
                self.skip_interelement_text()?;
                continue;
            }
            if rest.starts_with("<!") {
                let body = rest[2..].trim_start();
                if body.get(..7).is_some_and(|s| s.eq_ignore_ascii_case("DOCTYPE")) {
                    self.skip_until(b'>', "unterminated doctype")?;
                    self.skip_interelement_text()?;
                    continue;
                }
                return Err(self.error("unsupported markup"));
            }
            break;
        }

        let start = self.pos;
        self.pos += 1; // '<'
        if self.rest().starts_with('/') {
            self.pos += 1;
            let name = self.name()?;
            self.skip_ws();
            if !self.rest().starts_with('>') {
                return Err(self.error_at(start, format!("malformed closing tag </{name}")));
            }
            self.pos += 1;
            return Ok(Tag::Close(name));
        }

        let name = self.name()?;
        let mut attrs = Vec::new();
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(Tag::Open {
                    name,
                    attrs,
                    self_closing: true,
                });
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok(Tag::Open {
                    name,
                    attrs,
                    self_closing: false,
                });
            }
            if rest.is_empty() {
                return Err(self.error_at(start, format!("unterminated tag <{name}")));
            }
            let key = self.name()?;
            self.skip_ws();
            if !self.rest().starts_with('=') {
                return Err(self.error(format!("attribute {key} has no value")));
            }
            self.pos += 1;
            self.skip_ws();
            let value = self.quoted_value()?;
            attrs.push((key, value));
        }
    }

    fn name(&mut self) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        let end = rest
            .bytes()
            .position(|b| !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b':'))
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    fn quoted_value(&mut self) -> Result<String, ParseError> {
        let quote = match self.rest().bytes().next() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error("attribute value must be quoted")),
        };
        self.pos += 1;
        let rest = self.rest();
        let end = memchr(quote, rest.as_bytes())
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        let mut out = String::new();
        self.unescape_into(&rest[..end], &mut out)?;
        self.pos += end + 1;
        Ok(out)
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let n = rest.len() - rest.trim_start().len();
        self.pos += n;
    }

    /// Between structural elements only whitespace is allowed.
    fn skip_interelement_text(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        let stop = memchr(b'<', rest.as_bytes()).unwrap_or(rest.len());
        let run = &rest[..stop];
        if let Some(i) = run.find(|c: char| !c.is_whitespace()) {
            return Err(self.error_at(self.pos + i, "unexpected text between elements"));
        }
        self.pos += stop;
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        let end = rest
            .find("-->")
            .ok_or_else(|| self.error("unterminated comment"))?;
        self.pos += end + 3;
        Ok(())
    }

    fn skip_until(&mut self, byte: u8, msg: &str) -> Result<(), ParseError> {
        let rest = self.rest();
        let end = memchr(byte, rest.as_bytes()).ok_or_else(|| self.error(msg))?;
        self.pos += end + 1;
        Ok(())
    }

    /// Unescape a run of character data. Whitespace and newlines are
    /// preserved verbatim; translators embed them deliberately.
    fn unescape_into(&self, run: &str, out: &mut String) -> Result<(), ParseError> {
        let mut remaining = run;
        loop {
            match memchr(b'&', remaining.as_bytes()) {
                None => {
                    out.push_str(remaining);
                    return Ok(());
                }
                Some(amp) => {
                    out.push_str(&remaining[..amp]);
                    let entity = &remaining[amp..];
                    let semi = memchr(b';', entity.as_bytes()).filter(|&i| i <= 12).ok_or_else(
                        || {
                            let off = self.pos + (run.len() - entity.len());
                            self.error_at(off, "malformed entity reference")
                        },
                    )?;
                    let body = &entity[1..semi];
                    match body {
                        "amp" => out.push('&'),
                        "lt" => out.push('<'),
                        "gt" => out.push('>'),
                        "quot" => out.push('"'),
                        "apos" => out.push('\''),
                        _ => {
                            let code = body
                                .strip_prefix("#x")
                                .or_else(|| body.strip_prefix("#X"))
                                .map(|h| u32::from_str_radix(h, 16))
                                .or_else(|| body.strip_prefix('#').map(str::parse::<u32>));
                            let ch = code
                                .and_then(Result::ok)
                                .and_then(char::from_u32)
                                .ok_or_else(|| {
                                    let off = self.pos + (run.len() - entity.len());
                                    self.error_at(
                                        off,
                                        format!("unknown entity reference &{body};"),
                                    )
                                })?;
                            out.push(ch);
                        }
                    }
                    remaining = &entity[semi + 1..];
                }
            }
        }
    }
}

fn position_of(src: &str, offset: usize) -> (u32, u32) {
    let prefix = &src.as_bytes()[..offset.min(src.len())];
    let line = memchr::memchr_iter(b'\n', prefix).count() as u32 + 1;
    let column = match memchr::memrchr(b'\n', prefix) {
        Some(nl) => (offset - nl) as u32,
        None => offset as u32 + 1,
    };
    (line, column)
}

/// Canonical (NFC) form, allocation-free when already canonical.
fn canonical(s: String) -> String {
    if is_nfc(&s) { s } else { s.nfc().collect() }
}

// ---------------------------------------------------------------------------
// Document grammar
// ---------------------------------------------------------------------------

struct DocumentParser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> DocumentParser<'a> {
    fn parse(mut self) -> Result<Catalog, ParseError> {
        self.lexer.skip_interelement_text()?;
        let (attrs, self_closing) = match self.lexer.tag()? {
            Tag::Open {
                name: "TS",
                attrs,
                self_closing,
            } => (attrs, self_closing),
            Tag::Open { name, .. } => {
                return Err(self.lexer.error(format!("expected <TS>, found <{name}>")));
            }
            Tag::Close(name) => {
                return Err(self.lexer.error(format!("expected <TS>, found </{name}>")));
            }
        };

        let mut catalog = Catalog::new(None);
        for (key, value) in attrs {
            if key == "language" {
                let id = LocaleId::parse(&value)
                    .map_err(|e| self.lexer.error(e.to_string()))?;
                catalog.locale = Some(id);
            } else {
                catalog.extra.push((format!("@{key}"), value));
            }
        }
        if self_closing {
            return Ok(catalog);
        }

        loop {
            self.lexer.skip_interelement_text()?;
            match self.lexer.tag()? {
                Tag::Close("TS") => break,
                Tag::Open {
                    name: "context",
                    self_closing,
                    ..
                } => {
                    if self_closing {
                        return Err(self.lexer.error("context has no name"));
                    }
                    catalog.contexts.push(self.context()?);
                }
                Tag::Open { name, .. } => {
                    return Err(self
                        .lexer
                        .error(format!("expected <context>, found <{name}>")));
                }
                Tag::Close(name) => {
                    return Err(self.lexer.error(format!("unbalanced closing tag </{name}>")));
                }
            }
        }
        self.lexer.skip_interelement_text()?;
        if !self.lexer.at_eof() {
            return Err(self.lexer.error("trailing content after </TS>"));
        }
        Ok(catalog)
    }

    fn context(&mut self) -> Result<Context, ParseError> {
        let start = self.lexer.pos;
        let mut context = Context::default();
        loop {
            self.lexer.skip_interelement_text()?;
            match self.lexer.tag()? {
                Tag::Close("context") => break,
                Tag::Open {
                    name: "name",
                    self_closing,
                    ..
                } => {
                    context.name = if self_closing {
                        String::new()
                    } else {
                        canonical(self.element_text("name")?)
                    };
                }
                Tag::Open {
                    name: "message",
                    self_closing: true,
                    ..
                } => {
                    return Err(self.lexer.error("message has no <source>"));
                }
                Tag::Open {
                    name: "message",
                    attrs,
                    ..
                } => context.messages.push(self.message(attrs)?),
                Tag::Open { name, .. } => {
                    return Err(self
                        .lexer
                        .error(format!("expected <message>, found <{name}>")));
                }
                Tag::Close(name) => {
                    return Err(self.lexer.error(format!("unbalanced closing tag </{name}>")));
                }
            }
        }
        if context.name.is_empty() {
            return Err(self.lexer.error_at(start, "context has no name"));
        }
        Ok(context)
    }

    fn message(&mut self, attrs: Vec<(&'a str, String)>) -> Result<Message, ParseError> {
        let start = self.lexer.pos;
        let mut message = Message::new(String::new());
        let mut source = None;
        let mut saw_translation = false;

        for (key, value) in attrs {
            if key == "numerus" {
                message.plural = value == "yes";
            } else {
                message.extra.push((format!("@{key}"), value));
            }
        }

        loop {
            self.lexer.skip_interelement_text()?;
            match self.lexer.tag()? {
                Tag::Close("message") => break,
                Tag::Open {
                    name: "location",
                    attrs,
                    self_closing,
                } => {
                    let mut location = Location {
                        origin: String::new(),
                        line: 0,
                    };
                    for (key, value) in attrs {
                        match key {
                            "filename" => location.origin = value,
                            "line" => location.line = value.parse().unwrap_or(0),
                            _ => {}
                        }
                    }
                    if !self_closing {
                        self.element_text("location")?;
                    }
                    message.locations.push(location);
                }
                Tag::Open {
                    name: "source",
                    self_closing,
                    ..
                } => {
                    let text = if self_closing {
                        String::new()
                    } else {
                        self.element_text("source")?
                    };
                    source = Some(canonical(text));
                }
                Tag::Open {
                    name: "comment",
                    self_closing,
                    ..
                } => {
                    let text = if self_closing {
                        String::new()
                    } else {
                        self.element_text("comment")?
                    };
                    message.disambiguation = Some(canonical(text));
                }
                Tag::Open {
                    name: "translation",
                    attrs,
                    self_closing,
                } => {
                    saw_translation = true;
                    self.translation(attrs, self_closing, &mut message)?;
                }
                Tag::Open {
                    name,
                    self_closing,
                    ..
                } => {
                    // Forward compatibility: unknown children (e.g.
                    // translatorcomment, oldsource) are recorded, not errors.
                    let text = if self_closing {
                        String::new()
                    } else {
                        self.element_text_named(name)?
                    };
                    message.extra.push((name.to_string(), text));
                }
                Tag::Close(name) => {
                    return Err(self.lexer.error(format!("unbalanced closing tag </{name}>")));
                }
            }
        }

        message.source = source
            .ok_or_else(|| self.lexer.error_at(start, "message has no <source>"))?;
        if !saw_translation {
            message.status = TranslationStatus::Unfinished;
        }
        Ok(message)
    }

    fn translation(
        &mut self,
        attrs: Vec<(&'a str, String)>,
        self_closing: bool,
        message: &mut Message,
    ) -> Result<(), ParseError> {
        message.status = TranslationStatus::Finished;
        for (key, value) in attrs {
            if key == "type" {
                message.status = match value.as_str() {
                    "unfinished" => TranslationStatus::Unfinished,
                    "obsolete" => TranslationStatus::Obsolete,
                    "vanished" => TranslationStatus::Vanished,
                    other => {
                        return Err(self
                            .lexer
                            .error(format!("unknown translation type {other:?}")));
                    }
                };
            } else {
                message.extra.push((format!("translation@{key}"), value));
            }
        }
        if self_closing {
            message.variants = SmallVec::new();
            return Ok(());
        }

        let leading = self.lexer.text()?;
        let mut forms: SmallVec<[String; 1]> = SmallVec::new();
        loop {
            if self.lexer.at_eof() {
                return Err(self.lexer.error("unexpected end of document"));
            }
            match self.lexer.tag()? {
                Tag::Close("translation") => break,
                Tag::Open {
                    name: "numerusform",
                    self_closing,
                    ..
                } => {
                    let text = if self_closing {
                        String::new()
                    } else {
                        self.element_text("numerusform")?
                    };
                    forms.push(canonical(text));
                    // Only whitespace is allowed between numerusforms.
                    self.lexer.skip_interelement_text()?;
                }
                Tag::Open { name, .. } => {
                    return Err(self
                        .lexer
                        .error(format!("expected <numerusform>, found <{name}>")));
                }
                Tag::Close(name) => {
                    return Err(self
                        .lexer
                        .error(format!("expected </translation>, found </{name}>")));
                }
            }
        }

        if forms.is_empty() {
            // Plain text translation (possibly empty).
            let text = canonical(leading);
            // An unfinished empty body is an absent translation, not an
            // explicitly empty one.
            if text.is_empty() && message.status != TranslationStatus::Finished {
                message.variants = SmallVec::new();
            } else {
                message.variants = SmallVec::from_iter([text]);
            }
        } else {
            if !leading.trim().is_empty() {
                return Err(self
                    .lexer
                    .error("mixed text and <numerusform> content in translation"));
            }
            message.variants = forms;
        }
        Ok(())
    }

    fn element_text(&mut self, name: &'static str) -> Result<String, ParseError> {
        self.element_text_named(name)
    }

    /// Character data of a simple element, consuming its closing tag.
    fn element_text_named(&mut self, name: &str) -> Result<String, ParseError> {
        let text = self.lexer.text()?;
        match self.lexer.tag()? {
            Tag::Close(n) if n == name => Ok(text),
            Tag::Close(n) => Err(self
                .lexer
                .error(format!("expected </{name}>, found </{n}>"))),
            Tag::Open { name: n, .. } => Err(self
                .lexer
                .error(format!("expected </{name}>, found <{n}>"))),
        }
    }
}
