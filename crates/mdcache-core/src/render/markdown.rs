//! Markdown engine seam.

use std::sync::OnceLock;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Class prefix for highlighted spans, e.g. `hl-keyword`.
pub const HIGHLIGHT_CLASS_PREFIX: &str = "hl-";

/// Turns Markdown source into an HTML fragment.
pub trait MarkdownEngine: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

fn syntaxes() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// [`MarkdownEngine`] backed by `pulldown-cmark`.
///
/// Raw HTML passes through, and single newlines inside a paragraph become
/// `<br />`. Fenced code blocks tagged with a language syntect knows are
/// emitted as class-annotated spans; anything else stays plain escaped text.
#[derive(Debug, Clone)]
pub struct CmarkEngine {
    options: Options,
    hard_breaks: bool,
    highlight: bool,
}

impl Default for CmarkEngine {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self {
            options,
            hard_breaks: true,
            highlight: true,
        }
    }
}

impl CmarkEngine {
    /// Keep soft line breaks as plain newlines.
    pub fn without_hard_breaks(mut self) -> Self {
        self.hard_breaks = false;
        self
    }

    /// Leave fenced code blocks unhighlighted.
    pub fn without_highlighting(mut self) -> Self {
        self.highlight = false;
        self
    }
}

impl MarkdownEngine for CmarkEngine {
    fn render(&self, markdown: &str) -> String {
        let hard_breaks = self.hard_breaks;
        let parser = Parser::new_ext(markdown, self.options).map(move |event| match event {
            Event::SoftBreak if hard_breaks => Event::HardBreak,
            other => other,
        });
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        if self.highlight {
            html::push_html(&mut out, highlight_fenced(parser, syntaxes()).into_iter());
        } else {
            html::push_html(&mut out, parser);
        }
        out
    }
}

struct FencedBlock<'a> {
    info: CowStr<'a>,
    lang: String,
    syntax: &'a SyntaxReference,
    code: String,
}

/// Replace known-language fenced blocks with pre-rendered HTML.
fn highlight_fenced<'a>(
    events: impl Iterator<Item = Event<'a>>,
    syntaxes: &'a SyntaxSet,
) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    let mut pending: Option<FencedBlock<'a>> = None;

    for event in events {
        if let Some(block) = pending.as_mut() {
            match event {
                Event::Text(text) => block.code.push_str(&text),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(block) = pending.take() {
                        out.extend(finish_block(block, syntaxes));
                    }
                }
                other => out.push(other),
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let lang = info.split_whitespace().next().unwrap_or_default().to_string();
                match syntaxes.find_syntax_by_token(&lang).filter(|_| !lang.is_empty()) {
                    Some(syntax) => {
                        pending = Some(FencedBlock {
                            info,
                            lang,
                            syntax,
                            code: String::new(),
                        })
                    }
                    None => out.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))),
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn finish_block<'a>(block: FencedBlock<'a>, syntaxes: &SyntaxSet) -> Vec<Event<'a>> {
    match highlight_code(&block.code, block.syntax, syntaxes) {
        Some(spans) => vec![Event::Html(CowStr::from(format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape::encode_double_quoted_attribute(&block.lang),
            spans
        )))],
        // Highlighter failure falls back to the plain block.
        None => vec![
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(block.info))),
            Event::Text(CowStr::from(block.code)),
            Event::End(TagEnd::CodeBlock),
        ],
    }
}

fn highlight_code(code: &str, syntax: &SyntaxReference, syntaxes: &SyntaxSet) -> Option<String> {
    let mut generator = ClassedHTMLGenerator::new_with_class_style(
        syntax,
        syntaxes,
        ClassStyle::SpacedPrefixed {
            prefix: HIGHLIGHT_CLASS_PREFIX,
        },
    );
    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .ok()?;
    }
    Some(generator.finalize())
}
