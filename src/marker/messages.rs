//! Learner-facing messages in French and English
//!
//! Every sentence the marker writes to the journal comes from here. Dynamic
//! parts (code, exception text, inspected values) are HTML-escaped before
//! interpolation since the report is rendered as HTML by the platform.

use crate::runtime::Value;
use serde::Deserialize;
use std::fmt;

/// Report language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl Locale {
    /// Parse a language tag; anything unknown falls back to French
    pub fn from_tag(tag: &str) -> Locale {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Locale::En,
            _ => Locale::Fr,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::Fr => "fr",
            Locale::En => "en",
        }
    }
}

impl From<String> for Locale {
    fn from(tag: String) -> Self {
        Locale::from_tag(&tag)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A message with its parameters
#[derive(Debug, Clone)]
pub enum Message<'a> {
    /// About to evaluate a piece of test code
    StartEval { code: &'a str },
    StartEvaluation,
    FinishEval,
    StopEval,
    StartTests,
    FailOwnTests,
    IsAFunction { name: &'a str },
    NotAFunction { name: &'a str },
    /// Learner code raised while loading or while a description ran
    NotSatisfying { exception: &'a str },
    Bravo,
    /// Expectation `index` got an unexpected value
    Fail { index: usize, actual: Option<&'a Value> },
    /// Expectation `index` raised
    FailException { index: usize, exception: &'a str },
    FullSuccess { successful: usize, attempted: usize },
    PartialSuccess { successful: usize, attempted: usize },
    CheckFunction { message: &'a str },
}

impl Message<'_> {
    /// The catalog key of this message
    pub fn key(&self) -> &'static str {
        match self {
            Message::StartEval { .. } => "startEval",
            Message::StartEvaluation => "startEvaluation",
            Message::FinishEval => "finishEval",
            Message::StopEval => "stopEval",
            Message::StartTests => "startTests",
            Message::FailOwnTests => "failOwnTests",
            Message::IsAFunction { .. } => "isAFunction",
            Message::NotAFunction { .. } => "notAFunction",
            Message::NotSatisfying { .. } => "notSatisfying",
            Message::Bravo => "bravo",
            Message::Fail { .. } => "fail",
            Message::FailException { .. } => "failException",
            Message::FullSuccess { .. } => "fullSuccess",
            Message::PartialSuccess { .. } => "partialSuccess",
            Message::CheckFunction { .. } => "checkFunction",
        }
    }

    /// Render in `locale`
    pub fn render(&self, locale: Locale) -> String {
        match locale {
            Locale::Fr => self.render_fr(),
            Locale::En => self.render_en(),
        }
    }

    fn render_fr(&self) -> String {
        match self {
            Message::StartEval { code } => format!("J'évalue <code>{}</code>", escape_html(code)),
            Message::StartEvaluation => "Je vais évaluer votre code.".to_string(),
            Message::FinishEval => "Votre code s'évalue bien.".to_string(),
            Message::StopEval => "Je m'arrête là!".to_string(),
            Message::StartTests => {
                "Je vais maintenant vérifier votre code avec mes tests.".to_string()
            }
            Message::FailOwnTests => "Votre code ne passe pas vos propres tests!".to_string(),
            Message::IsAFunction { name } => {
                format!("<code>{}</code> est bien une fonction", escape_html(name))
            }
            Message::NotAFunction { name } => {
                format!("<code>{}</code> n'est pas une fonction", escape_html(name))
            }
            Message::NotSatisfying { exception } => format!(
                "Votre code n'est pas entièrement satisfaisant: <code>{}</code>",
                escape_html(exception)
            ),
            Message::Bravo => "OK".to_string(),
            Message::Fail { index, actual } => format!(
                "Échec de l'assertion #{}: Je n'attendais pas votre résultat: <code>{}</code>",
                index,
                inspect_actual(*actual)
            ),
            Message::FailException { index, exception } => format!(
                "Échec de l'assertion #{}: Exception signalée: <code>{}</code>",
                index,
                escape_html(exception)
            ),
            Message::FullSuccess {
                successful,
                attempted,
            } => format!("Vous avez réussi {} de mes {} tests.", successful, attempted),
            Message::PartialSuccess {
                successful,
                attempted,
            } => format!(
                "Vous n'avez réussi que {} de mes {} tests.",
                successful, attempted
            ),
            Message::CheckFunction { message } => format!(
                "Je vais tester la fonction <code>{}</code>",
                escape_html(message)
            ),
        }
    }

    fn render_en(&self) -> String {
        match self {
            Message::StartEval { code } => format!("Evaluating <code>{}</code>", escape_html(code)),
            Message::StartEvaluation => "Let's start to evaluate your code.".to_string(),
            Message::FinishEval => "Your code has been correctly loaded.".to_string(),
            Message::StopEval => "I stop here!".to_string(),
            Message::StartTests => "I'm going to check your code with my tests.".to_string(),
            Message::FailOwnTests => "Your code does not pass your own tests!".to_string(),
            Message::IsAFunction { name } => {
                format!("<code>{}</code> exists and is a function.", escape_html(name))
            }
            Message::NotAFunction { name } => {
                format!("<code>{}</code> is not a function!", escape_html(name))
            }
            Message::NotSatisfying { exception } => format!(
                "Your code is not correct, it raises: <code>{}</code>",
                escape_html(exception)
            ),
            Message::Bravo => "OK".to_string(),
            Message::Fail { index, actual } => format!(
                "Failed expectation #{}: I was not expecting your result: <code>{}</code>",
                index,
                inspect_actual(*actual)
            ),
            Message::FailException { index, exception } => format!(
                "Failed expectation #{}: Exception is: <code>{}</code>",
                index,
                escape_html(exception)
            ),
            Message::FullSuccess {
                successful,
                attempted,
            } => format!("You pass {} of my {} tests.", successful, attempted),
            Message::PartialSuccess {
                successful,
                attempted,
            } => format!("You only pass {} of my {} tests.", successful, attempted),
            Message::CheckFunction { message } => format!(
                "I'm going to check function <code>{}</code>",
                escape_html(message)
            ),
        }
    }
}

/// An absent actual value is shown as the string `'undefined'`
fn inspect_actual(actual: Option<&Value>) -> String {
    let shown = match actual {
        Some(value) if !value.is_undefined() => value.inspect(),
        _ => Value::from("undefined").inspect(),
    };
    escape_html(&shown)
}

/// Result of a lookup by key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text(String),
    /// No message has this key
    UnknownKey(String),
}

impl Rendered {
    /// The rendered text, or the key itself when it was unknown
    pub fn into_text(self) -> String {
        match self {
            Rendered::Text(text) | Rendered::UnknownKey(text) => text,
        }
    }
}

/// Render the message named `key` with positional `args`.
///
/// Missing arguments read as `undefined`, the way a script caller would
/// pass them.
pub fn render_key(locale: Locale, key: &str, args: &[Value]) -> Rendered {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    let text = |i: usize| arg(i).to_js_string();
    let count = |i: usize| {
        let n = arg(i).to_number();
        if n.is_finite() && n >= 0.0 {
            n as usize
        } else {
            0
        }
    };

    let first = text(0);
    let second = text(1);
    let actual = arg(1);
    let message = match key {
        "startEval" => Message::StartEval { code: &first },
        "startEvaluation" => Message::StartEvaluation,
        "finishEval" => Message::FinishEval,
        "stopEval" => Message::StopEval,
        "startTests" => Message::StartTests,
        "failOwnTests" => Message::FailOwnTests,
        "isAFunction" => Message::IsAFunction { name: &first },
        "notAFunction" => Message::NotAFunction { name: &first },
        "notSatisfying" => Message::NotSatisfying { exception: &first },
        "bravo" => Message::Bravo,
        "fail" => Message::Fail {
            index: count(0),
            actual: Some(&actual),
        },
        "failException" => Message::FailException {
            index: count(0),
            exception: &second,
        },
        "fullSuccess" => Message::FullSuccess {
            successful: count(0),
            attempted: count(1),
        },
        "partialSuccess" => Message::PartialSuccess {
            successful: count(0),
            attempted: count(1),
        },
        "checkFunction" => Message::CheckFunction { message: &first },
        _ => return Rendered::UnknownKey(key.to_string()),
    };
    Rendered::Text(message.render(locale))
}

/// Escape text for embedding in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '`' => escaped.push_str("&#x60;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
