use crate::apparatus::ApparatusConfig;
use crate::design::DesignParameters;
use crate::error::EditError;
use crate::step::{DisplayStep, Positions};
use crate::stimulus::{StimulusContent, StimulusDefinition, TextContent};
use log::info;
use serde::{Deserialize, Serialize};

/// Everything a session needs: apparatus, stimuli, the per-trial procedure
/// and the block design. Order of `procedure` is playback order.
///
/// Stored as `{design, stimuli, procedure}` with the apparatus kept under
/// `design.monitor`, the layout the builder's autosave and snapshots use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentRecord", into = "DocumentRecord")]
pub struct ExperimentDocument {
    pub apparatus: ApparatusConfig,
    pub stimuli: Vec<StimulusDefinition>,
    pub procedure: Vec<DisplayStep>,
    pub design: DesignParameters,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct DocumentRecord {
    design: DesignWithMonitor,
    stimuli: Vec<StimulusDefinition>,
    procedure: Vec<DisplayStep>,
}

#[derive(Serialize, Deserialize, Default)]
struct DesignWithMonitor {
    #[serde(flatten)]
    params: DesignParameters,
    #[serde(default)]
    monitor: Option<ApparatusConfig>,
}

impl From<DocumentRecord> for ExperimentDocument {
    fn from(record: DocumentRecord) -> Self {
        Self {
            apparatus: record.design.monitor.unwrap_or_default(),
            stimuli: record.stimuli,
            procedure: record.procedure,
            design: record.design.params,
        }
    }
}

impl From<ExperimentDocument> for DocumentRecord {
    fn from(doc: ExperimentDocument) -> Self {
        Self {
            design: DesignWithMonitor {
                params: doc.design,
                monitor: Some(doc.apparatus),
            },
            stimuli: doc.stimuli,
            procedure: doc.procedure,
        }
    }
}

/// Steps touched by renaming a stimulus, handed to the confirmation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameImpact {
    pub old_name: String,
    pub new_name: String,
    pub steps: Vec<String>,
}

fn check_index(index: usize, len: usize) -> Result<(), EditError> {
    if index < len {
        Ok(())
    } else {
        Err(EditError::IndexOutOfRange { index, len })
    }
}

impl ExperimentDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the empty document with the default design.
    pub fn clear(&mut self) {
        *self = Self::default();
        info!("experiment document cleared");
    }

    pub fn set_apparatus(&mut self, apparatus: ApparatusConfig) {
        self.apparatus = apparatus;
    }

    pub fn set_design(&mut self, design: DesignParameters) {
        self.design = design;
    }

    pub fn stimulus(&self, name: &str) -> Option<&StimulusDefinition> {
        self.stimuli.iter().find(|s| s.name == name)
    }

    /// Labels of the steps that reference `name`, in procedure order.
    pub fn steps_using(&self, name: &str) -> Vec<&str> {
        self.procedure
            .iter()
            .filter(|step| step.references(name))
            .map(|step| step.label.as_str())
            .collect()
    }

    fn validate_stimulus(
        &self,
        def: &StimulusDefinition,
        skip: Option<usize>,
    ) -> Result<(), EditError> {
        if def.name.trim().is_empty() {
            return Err(EditError::EmptyName);
        }
        if !def.content.has_content() {
            return Err(EditError::EmptyContent(def.name.clone()));
        }
        let clash = self
            .stimuli
            .iter()
            .enumerate()
            .any(|(i, s)| Some(i) != skip && s.name == def.name);
        if clash {
            return Err(EditError::DuplicateStimulus(def.name.clone()));
        }
        Ok(())
    }

    pub fn add_stimulus(&mut self, def: StimulusDefinition) -> Result<(), EditError> {
        self.validate_stimulus(&def, None)?;
        self.stimuli.push(def);
        Ok(())
    }

    /// Replaces the stimulus at `index`.
    ///
    /// When the name changes and displays use the old name, `confirm` sees
    /// the affected displays; declining aborts the edit, accepting renames
    /// every reference along with the stimulus. Returns how many displays
    /// were rewritten.
    pub fn update_stimulus<F>(
        &mut self,
        index: usize,
        def: StimulusDefinition,
        confirm: F,
    ) -> Result<usize, EditError>
    where
        F: FnOnce(&RenameImpact) -> bool,
    {
        check_index(index, self.stimuli.len())?;
        self.validate_stimulus(&def, Some(index))?;

        let old_name = self.stimuli[index].name.clone();
        let mut rewritten = 0;
        if def.name != old_name {
            let steps: Vec<String> = self
                .steps_using(&old_name)
                .into_iter()
                .map(String::from)
                .collect();
            if !steps.is_empty() {
                let impact = RenameImpact {
                    old_name: old_name.clone(),
                    new_name: def.name.clone(),
                    steps,
                };
                if !confirm(&impact) {
                    return Err(EditError::RenameDeclined {
                        old: impact.old_name,
                        new: impact.new_name,
                    });
                }
                for step in &mut self.procedure {
                    if step.rename_stimulus(&old_name, &def.name) > 0 {
                        rewritten += 1;
                    }
                }
                info!(
                    "renamed stimulus {:?} to {:?} in {} display(s)",
                    old_name, def.name, rewritten
                );
            }
        }
        self.stimuli[index] = def;
        Ok(rewritten)
    }

    /// Deleting a stimulus some display still uses is refused outright.
    pub fn remove_stimulus(&mut self, index: usize) -> Result<StimulusDefinition, EditError> {
        check_index(index, self.stimuli.len())?;
        let name = &self.stimuli[index].name;
        let steps = self.steps_using(name);
        if !steps.is_empty() {
            return Err(EditError::StimulusInUse {
                name: name.clone(),
                steps: steps.into_iter().map(String::from).collect(),
            });
        }
        Ok(self.stimuli.remove(index))
    }

    fn validate_step(&self, step: &DisplayStep, skip: Option<usize>) -> Result<(), EditError> {
        if step.label.trim().is_empty() {
            return Err(EditError::EmptyName);
        }
        let clash = self
            .procedure
            .iter()
            .enumerate()
            .any(|(i, s)| Some(i) != skip && s.label == step.label);
        if clash {
            return Err(EditError::DuplicateStep(step.label.clone()));
        }
        if step.until_response {
            if step.response_keys.is_empty() {
                return Err(EditError::MissingResponseKeys(step.label.clone()));
            }
        } else if step.duration.is_none() {
            return Err(EditError::MissingDuration(step.label.clone()));
        }
        if let Some(unknown) = step.stimuli.iter().find(|s| self.stimulus(&s.name).is_none()) {
            return Err(EditError::UnknownStimulus {
                step: step.label.clone(),
                stimulus: unknown.name.clone(),
            });
        }
        Ok(())
    }

    pub fn add_step(&mut self, step: DisplayStep) -> Result<(), EditError> {
        self.validate_step(&step, None)?;
        self.procedure.push(step);
        Ok(())
    }

    pub fn update_step(&mut self, index: usize, step: DisplayStep) -> Result<(), EditError> {
        check_index(index, self.procedure.len())?;
        self.validate_step(&step, Some(index))?;
        self.procedure[index] = step;
        Ok(())
    }

    pub fn remove_step(&mut self, index: usize) -> Result<DisplayStep, EditError> {
        check_index(index, self.procedure.len())?;
        Ok(self.procedure.remove(index))
    }

    /// Swaps with the previous step. `Ok(false)` when already first.
    pub fn move_step_up(&mut self, index: usize) -> Result<bool, EditError> {
        check_index(index, self.procedure.len())?;
        if index == 0 {
            return Ok(false);
        }
        self.procedure.swap(index - 1, index);
        Ok(true)
    }

    /// Swaps with the next step. `Ok(false)` when already last.
    pub fn move_step_down(&mut self, index: usize) -> Result<bool, EditError> {
        check_index(index, self.procedure.len())?;
        if index + 1 == self.procedure.len() {
            return Ok(false);
        }
        self.procedure.swap(index, index + 1);
        Ok(true)
    }

    /// One-line listing of a stimulus, e.g. `word → text: [GO, STOP]`.
    pub fn stimulus_summary(&self, index: usize) -> Option<String> {
        let stim = self.stimuli.get(index)?;
        Some(match &stim.content {
            StimulusContent::Text(TextContent::Choices(choices)) => {
                format!("{} → text: [{}]", stim.name, choices.join(", "))
            }
            StimulusContent::Text(TextContent::Single(text)) => {
                format!("{} → text: {}", stim.name, text)
            }
            StimulusContent::Polygon(p) => {
                format!("{} → polygon: {}, {}, {}px", stim.name, p.shape, p.color, p.size)
            }
            StimulusContent::Image(file)
            | StimulusContent::Audio(file)
            | StimulusContent::Video(file) => {
                format!("{} → {}: {}", stim.name, stim.content.type_name(), file)
            }
        })
    }

    /// One-line listing of a display step.
    pub fn step_summary(&self, index: usize) -> Option<String> {
        let step = self.procedure.get(index)?;
        let stimuli: Vec<String> = step
            .stimuli
            .iter()
            .map(|s| match &s.positions {
                Some(Positions::Many(list)) => format!("{} @ [{} positions]", s.name, list.len()),
                Some(Positions::One(p)) => format!("{} @ ({}, {})", s.name, p.x, p.y),
                None => format!("{} @ (unknown)", s.name),
            })
            .collect();
        let timing = if step.until_response {
            "until response".to_string()
        } else {
            match step.duration {
                Some(ms) => format!("{ms} ms"),
                None => "? ms".to_string(),
            }
        };
        Some(format!(
            "{} – {} – key: \"{}\" – stimuli: [{}]",
            step.label,
            timing,
            step.response_keys.joined(),
            stimuli.join(", ")
        ))
    }
}
