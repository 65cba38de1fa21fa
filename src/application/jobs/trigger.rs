//! Starting pipeline instances, on a schedule or on demand.

use std::{collections::HashMap, sync::Arc, time::Duration};

use apalis::prelude::{Data, Error as ApalisError};
use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::domain::{
    error::DomainError,
    variant::{Profile, StylePair, VariantConfig, VariantSelection, resolve},
};

use super::{
    context::{TriggerContext, job_failed},
    engine::PipelineEngine,
    error::PipelineError,
    payloads::{ComposeJobPayload, StageRequest},
};

/// Marker job produced by the cron stream.
#[derive(Default, Debug, Clone)]
pub struct PipelineTick;

impl From<chrono::DateTime<chrono::Utc>> for PipelineTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Debug, Clone)]
pub struct TriggerDefaults {
    /// Profile used when a request names none. Random when unset.
    pub profile: Option<Profile>,
    /// Destination collection per profile.
    pub collections: HashMap<Profile, String>,
    /// Profiles this deployment can render. Random picks draw from these and
    /// requests for any other profile are refused.
    pub available: Vec<Profile>,
}

impl Default for TriggerDefaults {
    fn default() -> Self {
        Self {
            profile: None,
            collections: HashMap::new(),
            available: Profile::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub styles: Option<[String; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggeredPipeline {
    pub job_id: String,
    pub selection: VariantSelection,
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Variant(#[from] DomainError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Pick the variant for a new pipeline instance.
pub fn plan_variant<R: Rng + ?Sized>(
    request: &TriggerRequest,
    defaults: &TriggerDefaults,
    rng: &mut R,
) -> Result<VariantConfig, DomainError> {
    let profile = match request.profile.as_deref() {
        Some(selector) => Profile::from_selector(selector),
        None => match defaults.profile {
            Some(profile) => profile,
            None => *defaults
                .available
                .choose(rng)
                .ok_or_else(|| DomainError::invariant("no profile is available to render"))?,
        },
    };
    if !defaults.available.contains(&profile) {
        return Err(DomainError::validation(format!(
            "profile {} is not available in this deployment",
            profile.as_str()
        )));
    }
    let styles = request
        .styles
        .as_ref()
        .map(|[first, second]| StylePair::new(first.as_str(), second.as_str()))
        .transpose()?;
    let selection = VariantSelection::choose(profile, styles, rng)?;

    Ok(resolve(&selection).with_collection(defaults.collections.get(&profile).cloned()))
}

pub struct PipelineTrigger {
    engine: Arc<PipelineEngine>,
    defaults: TriggerDefaults,
}

impl PipelineTrigger {
    pub fn new(engine: Arc<PipelineEngine>, defaults: TriggerDefaults) -> Self {
        Self { engine, defaults }
    }

    /// Enqueue a compose job for a freshly selected variant.
    pub async fn fire(&self, request: TriggerRequest) -> Result<TriggeredPipeline, TriggerError> {
        let variant = plan_variant(&request, &self.defaults, &mut rand::rng())?;
        let selection = variant.selection.clone();
        let job_id = self
            .engine
            .enqueue(
                &StageRequest::Compose(ComposeJobPayload { variant }),
                Duration::ZERO,
            )
            .await?;

        Ok(TriggeredPipeline { job_id, selection })
    }
}

pub async fn process_pipeline_tick(
    _tick: PipelineTick,
    ctx: Data<TriggerContext>,
) -> Result<(), ApalisError> {
    match ctx.trigger.fire(TriggerRequest::default()).await {
        Ok(started) => {
            info!(
                target = "tunesmith::application::jobs::trigger",
                job_id = %started.job_id,
                profile = started.selection.profile().as_str(),
                "scheduled pipeline started"
            );
            Ok(())
        }
        Err(err) => {
            error!(
                target = "tunesmith::application::jobs::trigger",
                error = %err,
                "scheduled pipeline failed to start"
            );
            Err(job_failed(err))
        }
    }
}
