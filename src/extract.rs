//! Pattern-based recovery of the first question from text that does not parse.
//!
//! Only the first question is considered: option and hint searches are confined to the
//! span between its `"question"` key and the next one, so a truncated second question
//! never leaks into the result.

use crate::model::{AnswerOption, Question, QuestionType, generate_id};
use regex::Regex;
use std::sync::LazyLock;

// a JSON string body: no bare quotes, escapes allowed
macro_rules! json_str {
    () => {
        r#"((?:[^"\\]|\\.)*)"#
    };
}

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(r#""question"\s*:\s*""#, json_str!(), r#"""#))
        .expect("question regex is invalid")
});

static QUESTION_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""question"\s*:"#).expect("question key regex is invalid"));

static HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(r#""hint"\s*:\s*""#, json_str!(), r#"""#)).expect("hint regex is invalid")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(r#""title"\s*:\s*""#, json_str!(), r#"""#)).expect("title regex is invalid")
});

static OPTIONS_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""options"\s*:\s*\["#).expect("options regex is invalid"));

static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"\{\s*(?:"id"\s*:\s*""#,
        json_str!(),
        r#""\s*,\s*)?"text"\s*:\s*""#,
        json_str!(),
        r#""\s*,\s*"is_correct"\s*:\s*(true|false|"true"|"false")\s*(?:,\s*"explanation"\s*:\s*""#,
        json_str!(),
        r#"")?\s*\}"#,
    ))
    .expect("option regex is invalid")
});

/// Cheap check that the text holds a question prompt, an opened options array and at
/// least one complete option object. Passing does not guarantee extraction succeeds.
pub fn has_first_question(text: &str) -> bool {
    let has_prompt = QUESTION_RE
        .captures(text)
        .is_some_and(|c| c.get(1).is_some_and(|m| !m.is_empty()));
    has_prompt
        && OPTIONS_OPEN_RE.is_match(text)
        && OPTION_RE.captures_iter(text).any(|c| c.get(2).is_some_and(|m| !m.is_empty()))
}

/// Extract the first multiple-choice question with every complete option it carries.
pub fn extract_first(text: &str) -> Option<Question> {
    if !has_first_question(text) {
        return None;
    }
    let caps = QUESTION_RE.captures(text)?;
    let whole = caps.get(0)?;
    let prompt = unescape(caps.get(1)?.as_str());
    if prompt.is_empty() {
        return None;
    }

    // the enclosing object starts at the last '{' before the key
    let start = text[..whole.start()].rfind('{').unwrap_or(whole.start());
    let end = QUESTION_KEY_RE
        .find_at(text, whole.end())
        .map(|m| text[..m.start()].rfind('{').filter(|&b| b >= whole.end()).unwrap_or(m.start()))
        .unwrap_or(text.len());
    let region = &text[start..end];

    let hint = HINT_RE.captures(region).and_then(|c| c.get(1)).map(|m| unescape(m.as_str()));
    let options = extract_options(region)?;

    Some(Question {
        id: generate_id(),
        kind: QuestionType::MultipleChoice,
        prompt,
        hint,
        options: Some(options),
        items: Some(Vec::new()),
        pairs: Some(Vec::new()),
        correct_answer: Some(String::new()),
        explanation: Some(String::new()),
        card_trigger: Some(String::new()),
        examiner_id: Some(String::new()),
    })
}

fn extract_options(region: &str) -> Option<Vec<AnswerOption>> {
    let open = OPTIONS_OPEN_RE.find(region)?;
    let options: Vec<AnswerOption> = OPTION_RE
        .captures_iter(&region[open.end()..])
        .filter_map(|c| {
            let text = unescape(c.get(2)?.as_str());
            if text.is_empty() {
                return None;
            }
            let flag = c.get(3)?.as_str();
            Some(AnswerOption {
                id: c.get(1).map(|m| unescape(m.as_str())).unwrap_or_else(generate_id),
                text,
                is_correct: flag == "true" || flag == "\"true\"",
                explanation: c.get(4).map(|m| unescape(m.as_str())),
            })
        })
        .collect();
    if options.is_empty() { None } else { Some(options) }
}

/// Title of the quiz if a complete `"title"` string is present.
pub fn extract_title(text: &str) -> Option<String> {
    TITLE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
        .filter(|t| !t.is_empty())
}

/// Resolve JSON escapes in a captured string body, keeping the raw text if they are malformed.
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}
