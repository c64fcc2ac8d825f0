// dbpull/src/commands/shell.rs
use std::fmt;

const REDACTED: &str = "****";

/// Quotes a single word for a POSIX shell.
///
/// Words made only of characters that the shell never treats specially are
/// returned untouched so the common case stays readable in logs.
pub fn quote(word: &str) -> String {
    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if is_plain {
        word.to_string()
    } else {
        format!("'{}'", escape_single_quoted(word))
    }
}

/// The form a word takes between single quotes.
fn escape_single_quoted(word: &str) -> String {
    word.replace('\'', r"'\''")
}

/// Shell text ready to hand to a runner, along with a copy for display in
/// which every secret has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    script: String,
    shown: String,
}

impl CommandLine {
    /// Wraps operator-supplied shell text that must run exactly as written.
    pub fn raw(script: impl Into<String>) -> Self {
        let script = script.into();
        Self {
            shown: script.clone(),
            script,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.script
    }

    /// Text safe for logs and error messages.
    pub fn redacted(&self) -> String {
        self.shown.clone()
    }

    /// `shown` must be `script` rendered with the same words, secrets masked.
    pub(crate) fn from_parts(script: String, shown: String) -> Self {
        Self { script, shown }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shown)
    }
}

/// A shell word and the form it takes in logs.
#[derive(Debug)]
struct Word {
    text: String,
    shown: String,
}

impl Word {
    fn plain(text: String) -> Self {
        Self {
            shown: text.clone(),
            text,
        }
    }
}

/// One program invocation with optional leading environment assignments.
#[derive(Debug, Default)]
pub(crate) struct Invocation {
    env: Vec<Word>,
    words: Vec<Word>,
}

impl Invocation {
    pub(crate) fn new(program: &str) -> Self {
        Self {
            words: vec![Word::plain(quote(program))],
            ..Self::default()
        }
    }

    pub(crate) fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.words.push(Word::plain(quote(arg.as_ref())));
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Adds an argument that contains a secret, e.g. `-p<password>`.
    pub(crate) fn secret_arg(mut self, prefix: &str, secret: &str) -> Self {
        self.words.push(Word {
            text: quote(&format!("{}{}", prefix, secret)),
            shown: format!("{}{}", quote(prefix), REDACTED),
        });
        self
    }

    pub(crate) fn secret_env(mut self, name: &'static str, secret: &str) -> Self {
        self.env.push(Word {
            text: format!("{}={}", name, quote(secret)),
            shown: format!("{}={}", name, REDACTED),
        });
        self
    }

    pub(crate) fn render(&self) -> String {
        self.join(|word| &word.text)
    }

    pub(crate) fn render_redacted(&self) -> String {
        self.join(|word| &word.shown)
    }

    fn join(&self, pick: impl Fn(&Word) -> &String) -> String {
        self.env
            .iter()
            .chain(&self.words)
            .map(|word| pick(word).as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn into_command_line(self) -> CommandLine {
        CommandLine::from_parts(self.render(), self.render_redacted())
    }
}
