use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A quiz as streamed by the content service.
///
/// `is_complete == false` marks a payload that is still being received. On the wire the
/// flag arrives as `is_streaming_partial` (inverted) or `is_complete`; when neither is
/// present the payload is taken as final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPayload")]
pub struct QuizPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examiner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_analysis: Option<ResultAnalysis>,
    pub is_complete: bool,
}

#[derive(Deserialize)]
struct RawPayload {
    title: String,
    examiner: Option<String>,
    level: Option<String>,
    description: Option<String>,
    questions: Vec<Question>,
    result_analysis: Option<ResultAnalysis>,
    is_streaming_partial: Option<bool>,
    is_complete: Option<bool>,
}

impl From<RawPayload> for QuizPayload {
    fn from(raw: RawPayload) -> Self {
        let partial = raw.is_streaming_partial == Some(true) || raw.is_complete == Some(false);
        Self {
            title: raw.title,
            examiner: raw.examiner,
            level: raw.level,
            description: raw.description,
            questions: raw.questions,
            result_analysis: raw.result_analysis,
            is_complete: !partial,
        }
    }
}

impl QuizPayload {
    /// Synthetic in-progress payload carrying a single recovered question.
    pub fn partial(title: impl Into<String>, question: Question) -> Self {
        Self {
            title: title.into(),
            examiner: None,
            level: None,
            description: None,
            questions: vec![question],
            result_analysis: None,
            is_complete: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    FillInBlank,
    Ordering,
    Matching,
}

impl QuestionType {
    pub fn display_name(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "Multiple Choice",
            QuestionType::FillInBlank => "Fill in the Blank",
            QuestionType::Ordering => "Put in Order",
            QuestionType::Matching => "Match the Pairs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(rename = "question")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<AnswerOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<Vec<MatchPair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(default = "generate_id")]
    pub id: String,
    pub text: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default = "generate_id")]
    pub id: String,
    pub text: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    #[serde(default = "generate_id")]
    pub id: String,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultAnalysis {
    pub strengths: Vec<AnalysisItem>,
    pub improvements: Vec<AnalysisItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisItem {
    pub category: String,
    pub description: String,
}

/// `true`, `false`, `"true"`, `"TRUE"`... anything else counts as false.
fn bool_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Str(String),
        Other(serde::de::IgnoredAny),
    }
    Ok(match BoolLike::deserialize(d)? {
        BoolLike::Bool(b) => b,
        BoolLike::Str(s) => s.eq_ignore_ascii_case("true"),
        BoolLike::Other(_) => false,
    })
}

/// A learner's response, shaped by the question type it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Id of the selected option.
    Choice(String),
    Text(String),
    /// Item ids in the order the learner arranged them.
    Order(Vec<String>),
    /// Left side to chosen right side.
    Matches(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MistakeKind {
    WrongSelection,
    SpellingError,
    OrderingError,
    MatchingError,
}

impl Question {
    /// Whether `answer` is correct for this question. An answer of the wrong shape is never
    /// correct.
    pub fn evaluate(&self, answer: &Answer) -> bool {
        match (self.kind, answer) {
            (QuestionType::MultipleChoice, Answer::Choice(id)) => self
                .options
                .as_deref()
                .and_then(|opts| opts.iter().find(|o| &o.id == id))
                .is_some_and(|o| o.is_correct),
            (QuestionType::FillInBlank, Answer::Text(text)) => self
                .correct_answer
                .as_deref()
                .is_some_and(|c| text.trim().to_lowercase() == c.to_lowercase()),
            (QuestionType::Ordering, Answer::Order(ids)) => {
                let Some(items) = self.items.as_deref() else {
                    return false;
                };
                ids.len() == items.len()
                    && ids.iter().enumerate().all(|(pos, id)| {
                        items
                            .iter()
                            .find(|it| &it.id == id)
                            .is_some_and(|it| it.order == pos as i64 + 1)
                    })
            }
            (QuestionType::Matching, Answer::Matches(map)) => self
                .pairs
                .as_deref()
                .is_some_and(|pairs| pairs.iter().all(|p| map.get(&p.left) == Some(&p.right))),
            _ => false,
        }
    }

    pub fn error_kind(&self) -> MistakeKind {
        match self.kind {
            QuestionType::MultipleChoice => MistakeKind::WrongSelection,
            QuestionType::FillInBlank => MistakeKind::SpellingError,
            QuestionType::Ordering => MistakeKind::OrderingError,
            QuestionType::Matching => MistakeKind::MatchingError,
        }
    }
}
