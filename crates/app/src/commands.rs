use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use cfebill_core::{BillField, BillForm, BillingPeriod};
use cfebill_ocr::{BillPipeline, TesseractCli, UploadedArtifact};
use cfebill_review::{ReviewEvent, ReviewMachine, ReviewState};

use crate::config::AppConfig;

#[derive(Serialize)]
struct AppliedReport<'a> {
    form: &'a BillForm,
    written: &'a BTreeSet<BillField>,
    billing_period: Option<PeriodReport>,
}

#[derive(Serialize)]
struct PeriodReport {
    #[serde(flatten)]
    period: BillingPeriod,
    days: i64,
}

impl<'a> AppliedReport<'a> {
    fn new(form: &'a BillForm, written: &'a BTreeSet<BillField>) -> Self {
        let billing_period = form
            .billing_period()
            .map(|period| PeriodReport { period, days: period.days() });
        AppliedReport { form, written, billing_period }
    }
}

fn pipeline(config: &AppConfig) -> BillPipeline<TesseractCli> {
    let recognizer = config.recognizer();
    if !recognizer.is_available() {
        tracing::warn!("OCR engine not found at {}", config.tesseract_path.display());
    }
    BillPipeline::new(recognizer).with_normalizer(config.normalizer())
}

/// Run extraction only. Returns whether usable bill data came back.
pub async fn extract(file: Option<&Path>, config: &AppConfig) -> Result<bool> {
    let artifact = read_artifact(file).await?;
    match pipeline(config).submit(artifact, config.timeout()).await {
        Ok(outcome) => {
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        Err(error) => {
            print_json(&error)?;
            Ok(false)
        }
    }
}

/// Extract, apply `--set` corrections, write the form and print it.
pub async fn apply(file: Option<&Path>, sets: &[String], config: &AppConfig) -> Result<bool> {
    let edits = sets
        .iter()
        .map(|s| parse_assignment(s))
        .collect::<Result<Vec<_>>>()?;
    let artifact = read_artifact(file).await?;

    let mut machine = ReviewMachine::new();
    let mut form = BillForm::new();
    machine
        .submit(&pipeline(config), artifact, config.timeout(), &mut form)
        .await?;

    if let ReviewState::Error { error } = machine.state() {
        print_json(error)?;
        return Ok(false);
    }

    for (field, value) in edits {
        machine.handle(ReviewEvent::Edit { field, value }, &mut form)?;
    }
    machine.handle(ReviewEvent::Apply, &mut form)?;

    let ReviewState::Applied { written } = machine.state() else {
        return Err(anyhow!("review did not reach the applied state"));
    };
    print_json(&AppliedReport::new(&form, written))?;
    Ok(true)
}

/// `None` in, `None` out: the pipeline reports that as `no_file`.
async fn read_artifact(file: Option<&Path>) -> Result<Option<UploadedArtifact>> {
    let Some(path) = file else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Some(UploadedArtifact::new(bytes, name)))
}

fn parse_assignment(raw: &str) -> Result<(BillField, String)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim().parse::<BillField>().map_err(|e| anyhow!(e))?;
    Ok((field, value.to_string()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
