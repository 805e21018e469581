use passline_engine::{
    BonusCandidate, BonusType, CandidateLookup, CohortKey, EngineError, ExamType, PageRequest,
    Policy, RankBoundaries, Severity, SubmissionId,
};
use passline_protocol::{ErrorEnvelope, ErrorSeverity, Hint, HintKind};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

/// Who to rank: a stored submission, or a user's latest one.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PredictPayload {
    #[serde(default)]
    pub submission_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Narrows a `user_id` lookup to one exam.
    #[serde(default)]
    pub exam_id: Option<u64>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PredictPayload {
    pub fn lookup(&self) -> Result<CandidateLookup, CommandFailure> {
        match (self.submission_id, self.user_id) {
            (Some(id), None) => Ok(CandidateLookup::Submission(SubmissionId(id))),
            (None, Some(user_id)) => Ok(CandidateLookup::LatestForUser {
                user_id,
                exam_id: self.exam_id,
            }),
            (Some(_), Some(_)) => Err(CommandFailure::invalid_request(
                "payload.submission_id and payload.user_id are mutually exclusive",
            )),
            (None, None) => Err(CommandFailure::invalid_request(
                "payload.submission_id or payload.user_id is required",
            )),
        }
    }

    pub fn page(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }
}

fn cohort_key(exam_id: u64, region_id: u64, exam_type: ExamType) -> CohortKey {
    CohortKey {
        exam_id,
        region_id,
        exam_type,
    }
}

/// A submission about to be created (no `submission_id`) or edited.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidateBonusPayload {
    pub exam_id: u64,
    pub region_id: u64,
    #[schemars(with = "String")]
    pub exam_type: ExamType,
    #[serde(default)]
    pub submission_id: Option<u64>,
    pub raw_score: f64,
    /// Defaults to `raw_score` with the bonus applied.
    #[serde(default)]
    pub final_score: Option<f64>,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub bonus_type: BonusType,
    #[serde(default)]
    pub has_cutoff: bool,
}

impl ValidateBonusPayload {
    pub fn key(&self) -> CohortKey {
        cohort_key(self.exam_id, self.region_id, self.exam_type)
    }

    pub fn candidate(&self) -> BonusCandidate {
        BonusCandidate {
            id: self.submission_id.map(SubmissionId),
            raw_score: self.raw_score,
            final_score: self
                .final_score
                .unwrap_or_else(|| self.bonus_type.apply(self.raw_score)),
            bonus_type: self.bonus_type,
            has_cutoff: self.has_cutoff,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PreviewPayload {
    pub exam_id: u64,
    pub region_id: u64,
    #[schemars(with = "String")]
    pub exam_type: ExamType,
    pub final_score: f64,
}

impl PreviewPayload {
    pub fn key(&self) -> CohortKey {
        cohort_key(self.exam_id, self.region_id, self.exam_type)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PolicyPayload {
    /// Also report the rank boundaries for this recruit count.
    #[serde(default)]
    pub recruit_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyOutput {
    pub name: String,
    pub policy: Policy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<RankBoundaries>,
}

/// Successful route result before the envelope is attached.
#[derive(Debug)]
pub struct CommandOutcome {
    pub data: Value,
    pub hints: Vec<Hint>,
}

impl CommandOutcome {
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, CommandFailure> {
        let data = serde_json::to_value(value).map_err(|err| {
            CommandFailure::internal("serialize_failed", format!("Failed to encode result: {err}"))
        })?;
        Ok(Self {
            data,
            hints: Vec::new(),
        })
    }

    pub fn with_hint(mut self, kind: HintKind, text: impl Into<String>) -> Self {
        self.hints.push(Hint {
            kind,
            text: text.into(),
        });
        self
    }
}

/// A failed request: the error envelope plus hints for the caller.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    pub envelope: ErrorEnvelope,
    pub hints: Vec<Hint>,
}

impl CommandFailure {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            envelope: ErrorEnvelope {
                code: "invalid_request".to_string(),
                message,
                severity: ErrorSeverity::UserCorrectable,
                details: None,
                hint: Some("Run `passline schema` to see the accepted payloads.".to_string()),
            },
            hints: Vec::new(),
        }
    }

    pub fn internal(code: &str, message: impl Into<String>) -> Self {
        Self {
            envelope: ErrorEnvelope {
                code: code.to_string(),
                message: message.into(),
                severity: ErrorSeverity::Internal,
                details: None,
                hint: None,
            },
            hints: Vec::new(),
        }
    }

    pub fn dataset(err: &anyhow::Error) -> Self {
        let mut failure = Self::internal("dataset_error", format!("{err:#}"));
        failure.push_hint(
            HintKind::Action,
            "Check the --data file: it must hold exams, regions, quotas and submissions arrays.",
        );
        failure
    }

    pub fn policy(err: &anyhow::Error) -> Self {
        Self::from(EngineError::InvalidPolicy(format!("{err:#}")))
    }

    pub fn dataset_missing() -> Self {
        let mut failure = Self::invalid_request("This action needs a dataset");
        failure.envelope.code = "dataset_missing".to_string();
        failure.envelope.hint =
            Some("Pass --data <file.json> or set PASSLINE_DATA.".to_string());
        failure
    }

    fn push_hint(&mut self, kind: HintKind, text: &str) {
        self.hints.push(Hint {
            kind,
            text: text.to_string(),
        });
    }
}

impl From<EngineError> for CommandFailure {
    fn from(err: EngineError) -> Self {
        let severity = match err.severity() {
            Severity::UserCorrectable => ErrorSeverity::UserCorrectable,
            Severity::NotFound => ErrorSeverity::NotFound,
            Severity::Internal => ErrorSeverity::Internal,
        };
        let mut details = json!({ "detail": err.to_string() });
        if let EngineError::BonusCapExceeded {
            family,
            cap_count,
            cap_percent,
            beneficiaries,
        } = &err
        {
            details["family"] = json!(family);
            details["cap_count"] = json!(cap_count);
            details["cap_percent"] = json!(cap_percent);
            details["beneficiaries"] = json!(beneficiaries);
        }

        let hint = hint_for(&err);
        let hints = hint
            .map(|(kind, text)| {
                vec![Hint {
                    kind,
                    text: text.to_string(),
                }]
            })
            .unwrap_or_default();
        Self {
            envelope: ErrorEnvelope {
                code: err.code().to_string(),
                message: err.localized_message(),
                severity,
                details: Some(details),
                hint: hint.map(|(_, text)| text.to_string()),
            },
            hints,
        }
    }
}

fn hint_for(err: &EngineError) -> Option<(HintKind, &'static str)> {
    match err {
        EngineError::BonusCapExceeded { .. } | EngineError::BonusFamilyIneligible { .. } => Some((
            HintKind::Action,
            "Resubmit with bonus_type \"none\" or a bonus of another family.",
        )),
        EngineError::CandidateCutoff { .. } => Some((
            HintKind::Info,
            "Submissions that fail a subject cutoff are excluded from ranking.",
        )),
        EngineError::NoParticipants => Some((
            HintKind::Info,
            "Prediction becomes available once the cohort has scored submissions.",
        )),
        EngineError::Source(_) => Some((
            HintKind::Action,
            "Check submission_id, user_id and the quotas in the dataset.",
        )),
        EngineError::InvalidEnteredScore { .. } => Some((
            HintKind::Action,
            "Scores must be finite and not negative.",
        )),
        EngineError::InvalidPolicy(_) => Some((
            HintKind::Action,
            "Fix the policy file named by --policy or PASSLINE_POLICY.",
        )),
        EngineError::InvalidRecruitPolicy { .. }
        | EngineError::CandidateNotInCohort { .. }
        | EngineError::InvalidScore { .. } => Some((
            HintKind::Warn,
            "Server-side data problem; run with --verbose for the log trail.",
        )),
    }
}

/// Decode an action payload, reporting the offending field.
pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, CommandFailure> {
    serde_json::from_value(payload)
        .map_err(|err| CommandFailure::invalid_request(format!("Invalid payload: {err}")))
}
