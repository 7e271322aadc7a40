use super::*;
use crate::extract::{extract_first, extract_title, has_first_question};

fn option_summary(q: &Question) -> Vec<(String, bool)> {
    q.options
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|o| (o.text.clone(), o.is_correct))
        .collect()
}

#[test]
fn exodus_fragment_yields_first_question() {
    let q = extract_first(EXODUS_TRUNCATED).expect("question");
    assert_eq!(q.prompt, "Who led the Exodus?");
    assert_eq!(q.kind, QuestionType::MultipleChoice);
    assert_eq!(option_summary(&q), vec![("Moses".to_string(), true), ("Aaron".to_string(), false)]);
    assert!(!q.id.is_empty());
    assert_eq!(q.items, Some(vec![]));
    assert_eq!(q.pairs, Some(vec![]));
    assert_eq!(q.correct_answer.as_deref(), Some(""));
    assert_eq!(q.card_trigger.as_deref(), Some(""));
    assert_eq!(q.examiner_id.as_deref(), Some(""));
}

#[test]
fn preconditions_require_prompt_options_and_one_option() {
    assert!(!has_first_question(r#"{"questions":[{"question":"Who"#));
    assert!(!has_first_question(r#"{"questions":[{"question":"Who?","options"#));
    assert!(!has_first_question(
        r#"{"questions":[{"question":"Who?","options":[{"text":"Moses","is_cor"#
    ));
    assert!(!has_first_question(
        r#"{"questions":[{"question":"","options":[{"text":"A","is_correct":true}"#
    ));
    assert!(has_first_question(
        r#"{"questions":[{"question":"Who?","options":[{"text":"Moses","is_correct":true}"#
    ));
}

#[test]
fn truncated_second_question_does_not_leak() {
    let text = r#"{"questions":[{"question":"First?","options":[{"text":"A","is_correct":true},{"text":"B","is_correct":false}]},{"question":"Second?","options":[{"text":"C","is_correct":true},{"text":"D","is_cor"#;
    let q = extract_first(text).expect("question");
    assert_eq!(q.prompt, "First?");
    assert_eq!(option_summary(&q), vec![("A".to_string(), true), ("B".to_string(), false)]);
}

#[test]
fn quoted_booleans_and_explanations() {
    let text = r#"{"question":"Pick","hint":"think","options":[{"text":"Yes","is_correct":"true","explanation":"Right"},{"text":"No","is_correct":"false"}"#;
    let q = extract_first(text).expect("question");
    assert_eq!(q.hint.as_deref(), Some("think"));
    let opts = q.options.unwrap();
    assert!(opts[0].is_correct);
    assert_eq!(opts[0].explanation.as_deref(), Some("Right"));
    assert!(!opts[1].is_correct);
    assert_eq!(opts[1].explanation, None);
}

#[test]
fn option_ids_are_kept_when_present() {
    let text = r#"{"question":"Pick","options":[{"id":"o1","text":"Yes","is_correct":true}"#;
    let q = extract_first(text).expect("question");
    assert_eq!(q.options.unwrap()[0].id, "o1");
}

#[test]
fn escaped_text_is_unescaped() {
    let text = r#"{"question":"Who said \"Let my people go\"?","options":[{"text":"Moses","is_correct":true}"#;
    let q = extract_first(text).expect("question");
    assert_eq!(q.prompt, "Who said \"Let my people go\"?");
}

#[test]
fn title_extraction() {
    assert_eq!(extract_title(EXODUS_TRUNCATED).as_deref(), Some("Quiz"));
    assert_eq!(extract_title(r#"{"title":"Gen"#), None);
    assert_eq!(extract_title(r#"{"title":"","questions":[]"#), None);
}
