use std::io::Cursor;
use std::time::Duration;

use cfebill_core::{BillField, BillForm, Confidence};
use cfebill_ocr::{
    BillPipeline, ErrorCode, MockRecognizer, UploadedArtifact, DEFAULT_TIMEOUT, MAX_UPLOAD_BYTES,
};
use cfebill_review::{ReviewEvent, ReviewMachine, ReviewState, StateKind};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

const BILL_TEXT: &str = "\
CFE SUMINISTRADOR DE SERVICIOS BASICOS
TARIFA 1C
PERIODO FACTURADO 01/DIC/2024 - 31/ENE/2025
LECTURA ACTUAL 12500
Consumo 280 kWh
TOTAL A PAGAR $1,234.56
";

fn photo() -> UploadedArtifact {
    let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, y| Luma([((x + y) * 8) as u8]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    UploadedArtifact::new(buf, "image/jpeg")
}

fn error_code(m: &ReviewMachine) -> ErrorCode {
    match m.state() {
        ReviewState::Error { error } => error.code,
        other => panic!("expected error state, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_review_edit_apply() {
    let pipeline = BillPipeline::new(MockRecognizer::new(BILL_TEXT));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();
    form.set(BillField::ReadingPrevious, "12220");

    let state = machine
        .submit(&pipeline, Some(photo()), DEFAULT_TIMEOUT, &mut form)
        .await
        .unwrap();
    assert_eq!(state, StateKind::Validation);
    assert_eq!(
        machine.trail(),
        [StateKind::Uploading, StateKind::Processing, StateKind::Validation]
    );

    let session = machine.session().unwrap();
    assert_eq!(session.candidate(BillField::Tariff).unwrap().confidence, Confidence::High);
    assert_eq!(session.candidate(BillField::ConsumptionKwh).unwrap().confidence, Confidence::High);
    assert_eq!(session.candidate(BillField::ReadingCurrent).unwrap().confidence, Confidence::Low);
    assert!(session.outcome().warnings.contains(&BillField::ReadingPrevious));

    machine
        .handle(ReviewEvent::Edit { field: BillField::Tariff, value: "DAC".into() }, &mut form)
        .unwrap();
    assert_eq!(form.get(BillField::Tariff), "", "edits stay in the session");

    machine.handle(ReviewEvent::Apply, &mut form).unwrap();
    assert_eq!(machine.state().kind(), StateKind::Applied);
    assert_eq!(form.get(BillField::Tariff), "DAC");
    assert_eq!(form.get(BillField::ConsumptionKwh), "280");
    assert_eq!(form.get(BillField::TotalMxn), "1234.56");
    assert_eq!(form.get(BillField::Period), "01/DIC/2024 - 31/ENE/2025");
    assert_eq!(form.billing_period().unwrap().days(), 61);
    // Not found on the bill, so the manual value survives.
    assert_eq!(form.get(BillField::ReadingPrevious), "12220");
    assert!(!form.is_modified(BillField::ReadingPrevious));
    assert!(form.is_modified(BillField::ReadingCurrent));

    // The form stays editable after apply.
    form.set(BillField::TotalMxn, "1200.00");
    assert_eq!(form.get(BillField::TotalMxn), "1200.00");
}

#[tokio::test]
async fn user_clearing_a_value_keeps_form_value() {
    let pipeline = BillPipeline::new(MockRecognizer::new("LECTURA ANTERIOR 100\nTARIFA 1C"));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();
    form.set(BillField::ReadingPrevious, "95");

    machine.submit(&pipeline, Some(photo()), DEFAULT_TIMEOUT, &mut form).await.unwrap();
    machine
        .handle(ReviewEvent::Edit { field: BillField::ReadingPrevious, value: String::new() }, &mut form)
        .unwrap();
    machine.handle(ReviewEvent::Apply, &mut form).unwrap();

    assert_eq!(form.get(BillField::ReadingPrevious), "95");
    assert_eq!(form.get(BillField::Tariff), "1C");
}

#[tokio::test]
async fn discard_returns_to_idle_with_form_untouched() {
    let pipeline = BillPipeline::new(MockRecognizer::new(BILL_TEXT));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();

    machine.submit(&pipeline, Some(photo()), DEFAULT_TIMEOUT, &mut form).await.unwrap();
    machine.handle(ReviewEvent::Discard, &mut form).unwrap();

    assert_eq!(machine.state(), &ReviewState::Idle);
    assert_eq!(form, BillForm::new());
}

#[tokio::test]
async fn oversized_upload_fails_before_ocr() {
    let pipeline = BillPipeline::new(MockRecognizer::new(BILL_TEXT));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();
    let big = UploadedArtifact::new(vec![0u8; MAX_UPLOAD_BYTES as usize + 1], "recibo.pdf");

    let state = machine.submit(&pipeline, Some(big), DEFAULT_TIMEOUT, &mut form).await.unwrap();
    assert_eq!(state, StateKind::Error);
    assert_eq!(error_code(&machine), ErrorCode::FileTooLarge);
    assert_eq!(machine.trail(), [StateKind::Uploading, StateKind::Error]);
    assert_eq!(pipeline.recognizer().calls(), 0);
}

#[tokio::test]
async fn unsupported_type_never_reaches_processing() {
    let pipeline = BillPipeline::new(MockRecognizer::new(BILL_TEXT));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();
    let gif = UploadedArtifact::new(b"GIF89a".to_vec(), "image/gif");

    let state = machine.submit(&pipeline, Some(gif), DEFAULT_TIMEOUT, &mut form).await.unwrap();
    assert_eq!(state, StateKind::Error);
    assert_eq!(error_code(&machine), ErrorCode::UnsupportedType);
    assert_eq!(machine.trail(), [StateKind::Uploading, StateKind::Error]);
    assert_eq!(pipeline.recognizer().calls(), 0);
}

#[tokio::test]
async fn missing_file_needs_a_new_upload() {
    let pipeline = BillPipeline::new(MockRecognizer::new(BILL_TEXT));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();

    machine.submit(&pipeline, None, DEFAULT_TIMEOUT, &mut form).await.unwrap();
    assert_eq!(error_code(&machine), ErrorCode::NoFile);
    assert_eq!(machine.trail(), [StateKind::Uploading, StateKind::Error]);
    assert!(machine.handle(ReviewEvent::Retry, &mut form).is_err());

    let state = machine.submit(&pipeline, Some(photo()), DEFAULT_TIMEOUT, &mut form).await.unwrap();
    assert_eq!(state, StateKind::Validation);
}

#[tokio::test]
async fn timeout_then_retry() {
    let slow = BillPipeline::new(
        MockRecognizer::new(BILL_TEXT).with_delay(Duration::from_millis(400)),
    );
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();

    let state = machine
        .submit(&slow, Some(photo()), Duration::from_millis(40), &mut form)
        .await
        .unwrap();
    assert_eq!(state, StateKind::Error);
    assert_eq!(error_code(&machine), ErrorCode::Timeout);
    assert_eq!(machine.trail(), [StateKind::Uploading, StateKind::Processing, StateKind::Error]);

    assert_eq!(machine.handle(ReviewEvent::Retry, &mut form).unwrap(), StateKind::Idle);
    assert_eq!(form, BillForm::new());
}

#[tokio::test]
async fn non_cfe_document_reports_no_cfe_data() {
    let pipeline = BillPipeline::new(MockRecognizer::new("Estado de cuenta bancario"));
    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();

    let state = machine.submit(&pipeline, Some(photo()), DEFAULT_TIMEOUT, &mut form).await.unwrap();
    assert_eq!(state, StateKind::Error);
    assert_eq!(error_code(&machine), ErrorCode::NoCfeData);
}
