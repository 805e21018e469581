pub mod domain;

pub use domain::{
    CommandFailure, CommandOutcome, PolicyOutput, PolicyPayload, PredictPayload, PreviewPayload,
    ValidateBonusPayload,
};

use crate::dataset::DatasetSource;
use domain::parse_payload;
use passline_engine::{
    BonusCheck, CompetitorPage, Policy, PredictionResult, PredictionService, PreviewResult,
    ThresholdCalculator,
};
use passline_protocol::{
    CommandAction, CommandRequest, CommandResponse, HintKind, ResponseMeta,
    COMMAND_SCHEMA_VERSION,
};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;

/// Where the cohort data for dataset-backed actions lives.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub include_suspicious: bool,
}

pub struct CommandHandler {
    policy: Policy,
    dataset: Option<DatasetConfig>,
}

impl CommandHandler {
    pub fn new(policy: Policy, dataset: Option<DatasetConfig>) -> Self {
        Self { policy, dataset }
    }

    pub fn execute(&self, request: CommandRequest) -> CommandResponse {
        let started = Instant::now();
        let CommandRequest { action, payload } = request;
        log::debug!("Executing action {}", action.as_str());

        let outcome = self.route(action, payload);
        let meta = ResponseMeta {
            duration_ms: Some(started.elapsed().as_millis() as u64),
            policy: Some(self.policy.name().to_string()),
            schema_version: Some(COMMAND_SCHEMA_VERSION),
        };

        match outcome {
            Ok(outcome) => CommandResponse::ok(outcome.data, outcome.hints, meta),
            Err(failure) => {
                log::debug!(
                    "Action {} failed with {}",
                    action.as_str(),
                    failure.envelope.code
                );
                let mut response = CommandResponse::error(failure.envelope, meta);
                response.hints = failure.hints;
                response
            }
        }
    }

    fn route(&self, action: CommandAction, payload: Value) -> Result<CommandOutcome, CommandFailure> {
        match action {
            CommandAction::Predict => {
                let payload: PredictPayload = parse_payload(payload)?;
                let result = self.predict(&payload)?;
                let outcome = CommandOutcome::from_serializable(&result)?;
                Ok(match result.summary.disclaimer {
                    Some(text) => outcome.with_hint(HintKind::Warn, text),
                    None => outcome,
                })
            }
            CommandAction::Competitors => {
                let payload: PredictPayload = parse_payload(payload)?;
                CommandOutcome::from_serializable(&self.competitors(&payload)?)
            }
            CommandAction::ValidateBonus => {
                let payload: ValidateBonusPayload = parse_payload(payload)?;
                let check = self.validate_bonus(&payload)?;
                let outcome = CommandOutcome::from_serializable(&check)?;
                Ok(match check {
                    BonusCheck::Exempt { .. } => outcome.with_hint(
                        HintKind::Info,
                        "Applicants do not outnumber recruits; the bonus cap is not enforced.",
                    ),
                    BonusCheck::Skipped { .. } | BonusCheck::Within { .. } => outcome,
                })
            }
            CommandAction::Preview => {
                let payload: PreviewPayload = parse_payload(payload)?;
                CommandOutcome::from_serializable(&self.preview(&payload)?)
            }
            CommandAction::Policy => {
                let payload: PolicyPayload = parse_payload(payload)?;
                CommandOutcome::from_serializable(&self.policy_view(&payload)?)
            }
        }
    }

    pub fn predict(&self, payload: &PredictPayload) -> Result<PredictionResult, CommandFailure> {
        let lookup = payload.lookup()?;
        Ok(self.service()?.predict(&lookup, payload.page())?)
    }

    pub fn competitors(&self, payload: &PredictPayload) -> Result<CompetitorPage, CommandFailure> {
        let lookup = payload.lookup()?;
        Ok(self.service()?.competitors(&lookup, payload.page())?)
    }

    pub fn validate_bonus(
        &self,
        payload: &ValidateBonusPayload,
    ) -> Result<BonusCheck, CommandFailure> {
        Ok(self
            .service()?
            .validate_submission(&payload.key(), &payload.candidate())?)
    }

    pub fn preview(&self, payload: &PreviewPayload) -> Result<PreviewResult, CommandFailure> {
        Ok(self.service()?.preview(&payload.key(), payload.final_score)?)
    }

    pub fn policy_view(&self, payload: &PolicyPayload) -> Result<PolicyOutput, CommandFailure> {
        let boundaries = payload
            .recruit_count
            .map(|recruit| ThresholdCalculator::new(self.policy.threshold()).boundaries(recruit))
            .transpose()?;
        Ok(PolicyOutput {
            name: self.policy.name().to_string(),
            policy: self.policy.clone(),
            boundaries,
        })
    }

    /// A fresh snapshot of the dataset for one request.
    fn service(&self) -> Result<PredictionService<DatasetSource>, CommandFailure> {
        let config = self
            .dataset
            .as_ref()
            .ok_or_else(CommandFailure::dataset_missing)?;
        let source = DatasetSource::load(&config.path, config.include_suspicious)
            .map_err(|err| CommandFailure::dataset(&err))?;
        Ok(PredictionService::new(source, self.policy.clone()))
    }
}
