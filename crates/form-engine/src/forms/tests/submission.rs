use serde_json::json;

use super::common::{
    calculated, number, published_with, required_number_with_default, required_text, select,
    shown_if_equals, text,
};
use crate::forms::{
    CalculationEngine, FormEvent, FormSubmission, FormTemplate, FormValidator, NewSubmission,
    SubmissionError, SubmissionStatus,
};

fn start(template: &FormTemplate) -> FormSubmission {
    FormSubmission::create(NewSubmission {
        template_id: template.id(),
        template_version: template.version(),
        context_type: template.context_type().to_string(),
        context_id: Some("orden-81".to_string()),
        submitted_by: "tech-1".to_string(),
    })
}

fn submit(
    submission: &mut FormSubmission,
    template: &FormTemplate,
) -> Result<(), SubmissionError> {
    submission.submit(template, &FormValidator::default(), &CalculationEngine)
}

#[test]
fn new_submission_starts_incomplete_and_pins_the_version() {
    let template = published_with(vec![text("notes", "Notes")]);
    let submission = start(&template);

    assert!(submission.is_incomplete());
    assert_eq!(submission.template_version(), template.version());
    assert_eq!(submission.context_id(), Some("orden-81"));
    assert!(submission.answers().is_empty());
}

#[test]
fn conditional_required_field_is_skipped_when_hidden() {
    let template = published_with(vec![
        select("trigger", "Issues found?", &["yes", "no"]),
        shown_if_equals("details", "Details", "trigger", "yes"),
    ]);
    let mut submission = start(&template);
    submission.set_answer("trigger", json!("no")).expect("answer records");

    submit(&mut submission, &template).expect("submission passes");
    assert!(submission.is_submitted());
    assert!(submission.submitted_at().is_some());
}

#[test]
fn conditional_required_field_is_enforced_when_visible() {
    let template = published_with(vec![
        select("trigger", "Issues found?", &["yes", "no"]),
        shown_if_equals("details", "Details", "trigger", "yes"),
    ]);
    let mut submission = start(&template);
    submission.set_answer("trigger", json!("yes")).expect("answer records");

    let error = submit(&mut submission, &template).unwrap_err();
    match error {
        SubmissionError::ValidationFailed { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field_id, "details");
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }

    // The failed attempt leaves the submission open with its errors stored.
    assert!(submission.is_incomplete());
    assert!(submission.has_validation_errors());
    assert_eq!(submission.validation_errors()[0].field_id, "details");
}

#[test]
fn corrected_resubmission_clears_stored_errors() {
    let template = published_with(vec![
        select("trigger", "Issues found?", &["yes", "no"]),
        shown_if_equals("details", "Details", "trigger", "yes"),
    ]);
    let mut submission = start(&template);
    submission.set_answer("trigger", json!("yes")).expect("answer records");
    let _ = submit(&mut submission, &template);

    submission
        .set_answer("details", json!("loose railing"))
        .expect("answer records");
    submit(&mut submission, &template).expect("resubmission passes");

    assert!(submission.is_submitted());
    assert!(!submission.has_validation_errors());
}

#[test]
fn defaults_backfill_unanswered_fields() {
    let template = published_with(vec![required_number_with_default("count", "Count", 10.0)]);
    let mut submission = start(&template);

    submit(&mut submission, &template).expect("submission passes");
    assert_eq!(
        submission.answer("count").and_then(|value| value.as_f64()),
        Some(10.0)
    );
}

#[test]
fn defaults_never_override_an_explicit_answer() {
    let template = published_with(vec![required_number_with_default("count", "Count", 10.0)]);
    let mut submission = start(&template);
    submission.set_answer("count", json!(3)).expect("answer records");

    submit(&mut submission, &template).expect("submission passes");
    assert_eq!(
        submission.answer("count").and_then(|value| value.as_f64()),
        Some(3.0)
    );
}

#[test]
fn defaults_are_retained_after_a_failed_attempt() {
    let template = published_with(vec![
        required_text("notes", "Notes"),
        required_number_with_default("count", "Count", 10.0),
    ]);
    let mut submission = start(&template);

    let _ = submit(&mut submission, &template);
    assert!(submission.is_incomplete());
    assert_eq!(
        submission.answer("count").and_then(|value| value.as_f64()),
        Some(10.0)
    );
}

#[test]
fn calculated_fields_are_computed_on_submit() {
    let template = published_with(vec![
        number("a", "A"),
        number("b", "B"),
        calculated("sum", "Sum", "a + b"),
    ]);
    let mut submission = start(&template);
    submission.set_answer("a", json!(2)).expect("answer records");
    submission.set_answer("b", json!(3)).expect("answer records");

    submit(&mut submission, &template).expect("submission passes");
    assert_eq!(
        submission.answer("sum").and_then(|value| value.as_f64()),
        Some(5.0)
    );
}

#[test]
fn calculated_field_stays_unset_with_incomplete_dependencies() {
    let template = published_with(vec![
        number("a", "A"),
        number("b", "B"),
        calculated("sum", "Sum", "a + b"),
    ]);
    let mut submission = start(&template);
    submission.set_answer("a", json!(2)).expect("answer records");

    submit(&mut submission, &template).expect("submission passes");
    assert!(!submission.has_answer("sum"));
}

#[test]
fn answers_lock_after_submission() {
    let template = published_with(vec![text("notes", "Notes")]);
    let mut submission = start(&template);
    submit(&mut submission, &template).expect("submission passes");

    let locked = submission.set_answer("notes", json!("late edit"));
    assert_eq!(locked, Err(SubmissionError::AnswersLocked));

    let again = submit(&mut submission, &template);
    assert_eq!(again, Err(SubmissionError::AlreadySubmitted));
}

#[test]
fn submit_rejects_the_wrong_template() {
    let template = published_with(vec![text("notes", "Notes")]);
    let other = published_with(vec![text("notes", "Notes")]);
    let mut submission = start(&template);

    let error = submit(&mut submission, &other).unwrap_err();
    assert!(matches!(error, SubmissionError::TemplateMismatch { .. }));
}

#[test]
fn review_requires_a_submitted_form() {
    let template = published_with(vec![text("notes", "Notes")]);
    let mut submission = start(&template);

    let early = submission.validate("supervisor");
    assert_eq!(early, Err(SubmissionError::NotSubmitted));

    submit(&mut submission, &template).expect("submission passes");
    submission.validate("supervisor").expect("review passes");

    assert_eq!(submission.status(), SubmissionStatus::Validated);
    assert_eq!(submission.validated_by(), Some("supervisor"));
    assert!(submission.validated_at().is_some());

    let twice = submission.validate("supervisor");
    assert_eq!(twice, Err(SubmissionError::NotSubmitted));
}

#[test]
fn lifecycle_events_accumulate_until_drained() {
    let template = published_with(vec![text("notes", "Notes")]);
    let mut submission = start(&template);
    submit(&mut submission, &template).expect("submission passes");
    submission.validate("supervisor").expect("review passes");

    let events = submission.take_events();
    assert!(matches!(events[0], FormEvent::SubmissionReceived { .. }));
    assert!(matches!(events[1], FormEvent::SubmissionValidated { .. }));
    assert!(submission.pending_events().is_empty());
}

#[test]
fn snapshot_round_trip_preserves_state_and_clears_events() {
    let template = published_with(vec![
        number("a", "A"),
        number("b", "B"),
        calculated("sum", "Sum", "a + b"),
    ]);
    let mut submission = start(&template);
    submission.set_answer("a", json!(2)).expect("answer records");
    submission.set_answer("b", json!(3)).expect("answer records");
    submit(&mut submission, &template).expect("submission passes");

    let restored = FormSubmission::from_snapshot(submission.snapshot());
    assert_eq!(restored.id(), submission.id());
    assert_eq!(restored.template_id(), submission.template_id());
    assert_eq!(restored.status(), submission.status());
    assert_eq!(restored.answers(), submission.answers());
    assert!(restored.pending_events().is_empty());
}
